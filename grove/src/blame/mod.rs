use std::{borrow::Cow, ops::Range};

use gix::diff::blob::{diff as imara_diff, intern::InternedInput, Algorithm, Sink};

// A contiguous run of lines in the final version of a blob, all
// introduced by the same id (a commit, for the usual caller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk<T> {
    pub lines: Range<u32>,
    pub id: T,
}

// Where blob data comes from. Generic so attribution can be driven
// by plain in-memory fixtures in tests.
pub trait Source<T> {
    type Error;

    fn load(&self, id: &T, buf: &mut Vec<u8>) -> Result<(), Self::Error>;

    fn decode_text<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, str>, Self::Error>;
}

// Takes the versions of a blob ordered oldest to newest and yields
// hunks covering every line of the newest version, each attributed
// to the version that introduced it.
//
// Works by replaying the pairwise line diffs over an owner-per-line
// table: whatever a delta adds is owned by the newer version,
// whatever it removes disappears, untouched lines keep their owner.
pub fn attribute<T, S>(ids: &[T], source: S) -> Result<Vec<Hunk<T>>, S::Error>
where
    T: Copy + std::fmt::Debug + PartialEq,
    S: Source<T>,
{
    assert!(!ids.is_empty(), "needs at least one version");

    let mut owners: Vec<T> = {
        let mut buf = Vec::new();
        source.load(&ids[0], &mut buf)?;
        let text = source.decode_text(&buf)?;
        // tokenize exactly like the differ below so line counts
        // always agree
        let input = InternedInput::new(text.as_ref(), "");
        vec![ids[0]; input.before.len()]
    };

    let mut before_buf = Vec::new();
    let mut after_buf = Vec::new();

    for pair in ids.windows(2) {
        let &[prev, cur] = pair else {
            unreachable!("windows(2) yields pairs");
        };

        before_buf.clear();
        after_buf.clear();
        source.load(&prev, &mut before_buf)?;
        source.load(&cur, &mut after_buf)?;
        let before = source.decode_text(&before_buf)?;
        let after = source.decode_text(&after_buf)?;

        let input = InternedInput::new(before.as_ref(), after.as_ref());
        let deltas = imara_diff(Algorithm::Histogram, &input, Deltas::default());

        apply(&mut owners, cur, &deltas);
        debug_assert_eq!(
            owners.len(),
            input.after.len(),
            "owner table drifted from the blob at {cur:?}"
        );
    }

    Ok(runs(&owners))
}

// Deltas arrive ordered and non-overlapping, so the `after` range
// start is already the right index into the partially-rewritten
// owner table.
fn apply<T: Copy>(owners: &mut Vec<T>, id: T, deltas: &[(Range<u32>, Range<u32>)]) {
    for (before, after) in deltas {
        let start = after.start as usize;
        owners.splice(
            start..start + before.len(),
            std::iter::repeat(id).take(after.len()),
        );
    }
}

// run-length encode the owner table back into hunks
fn runs<T>(owners: &[T]) -> Vec<Hunk<T>>
where
    T: Copy + PartialEq,
{
    let mut out: Vec<Hunk<T>> = Vec::new();
    for (lineno, &id) in owners.iter().enumerate() {
        match out.last_mut() {
            Some(hunk) if hunk.id == id => hunk.lines.end += 1,
            _ => out.push(Hunk {
                lines: (lineno as u32)..(lineno as u32 + 1),
                id,
            }),
        }
    }
    out
}

// collects the raw change ranges of one pairwise diff
#[derive(Default)]
struct Deltas {
    changes: Vec<(Range<u32>, Range<u32>)>,
}

impl Sink for Deltas {
    type Out = Vec<(Range<u32>, Range<u32>)>;

    fn process_change(&mut self, before: Range<u32>, after: Range<u32>) {
        self.changes.push((before, after));
    }

    fn finish(self) -> Self::Out {
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixtures(HashMap<u8, &'static str>);

    impl Fixtures {
        fn new(versions: &[(u8, &'static str)]) -> Self {
            Self(versions.iter().copied().collect())
        }
    }

    impl Source<u8> for &Fixtures {
        type Error = std::convert::Infallible;

        fn load(&self, id: &u8, buf: &mut Vec<u8>) -> Result<(), Self::Error> {
            buf.extend_from_slice(self.0[id].as_bytes());
            Ok(())
        }

        fn decode_text<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, str>, Self::Error> {
            Ok(String::from_utf8_lossy(data))
        }
    }

    fn hunk(lines: Range<u32>, id: u8) -> Hunk<u8> {
        Hunk { lines, id }
    }

    fn attributed(versions: &[(u8, &'static str)]) -> Vec<Hunk<u8>> {
        let fixtures = Fixtures::new(versions);
        let ids: Vec<u8> = versions.iter().map(|(id, _)| *id).collect();
        attribute(&ids, &fixtures).expect("fixtures never fail")
    }

    #[test]
    fn single_version_owns_every_line() {
        assert_eq!(
            vec![hunk(0..3, 1)],
            attributed(&[(1, "a\nb\nc\n")]),
            "one version, one hunk"
        );
    }

    #[test]
    fn empty_blob_has_no_hunks() {
        assert!(attributed(&[(1, "")]).is_empty());
    }

    #[test]
    fn appended_lines_belong_to_the_appender() {
        assert_eq!(
            vec![hunk(0..2, 1), hunk(2..3, 2)],
            attributed(&[(1, "a\nb\n"), (2, "a\nb\nc\n")]),
        );
    }

    #[test]
    fn edits_split_the_original_hunk() {
        assert_eq!(
            vec![hunk(0..1, 1), hunk(1..2, 2), hunk(2..3, 1)],
            attributed(&[(1, "a\nb\nc\n"), (2, "a\nX\nc\n")]),
        );
    }

    #[test]
    fn full_rewrite_takes_over() {
        assert_eq!(
            vec![hunk(0..2, 2)],
            attributed(&[(1, "a\nb\nc\n"), (2, "x\ny\n")]),
        );
    }

    #[test]
    fn revert_restores_the_original_owner() {
        // version 2 adds a line, version 3 removes it again: the
        // surviving content is all owned by version 1
        assert_eq!(
            vec![hunk(0..1, 1)],
            attributed(&[(1, "a\n"), (2, "a\nb\n"), (3, "a\n")]),
        );
    }

    #[test]
    fn growth_and_shrink_across_many_versions() {
        let versions = [
            (1, "one\ntwo\nthree\n"),
            (2, "one\ntwo\nthree\nfour\n"),
            (3, "zero\none\ntwo\nthree\nfour\n"),
            (4, "zero\ntwo\nthree\nfour\n"),
        ];
        assert_eq!(
            vec![hunk(0..1, 3), hunk(1..3, 1), hunk(3..4, 2)],
            attributed(&versions),
        );
    }
}
