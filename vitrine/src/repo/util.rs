// Scan `candidates` in order and split `input` into the first one
// whose name is a literal prefix of it, plus whatever remains. The
// char right after the matched name is consumed and discarded: it
// is expected to be the separator but never validated. Overlapping
// names (say `v1` and `v1.2`) resolve to whichever the store listed
// first, never to the longest match.
pub(crate) fn split_first_prefix<'c, 'i, T, F>(
    input: &'i str,
    candidates: &'c [T],
    name: F,
) -> Option<(&'c T, &'i str)>
where
    F: Fn(&'c T) -> &'c str,
{
    candidates.iter().find_map(|candidate| {
        let rest = input.strip_prefix(name(candidate))?;
        if rest.is_empty() {
            // consumed exactly: the tree root
            Some((candidate, rest))
        } else {
            let mut rest = rest.chars();
            rest.next();
            Some((candidate, rest.as_str()))
        }
    })
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Crumb<'a> {
    // an intermediate component and the full path up to it
    Part { name: &'a str, path: &'a str },
    Last { name: &'a str },
}

// Decompose a (sane, relative) path into breadcrumb components.
pub(crate) fn crumbs(path: &str) -> Vec<Crumb<'_>> {
    debug_assert!(!path.starts_with('/'), "path must be relative");

    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut consumed = 0;
    while let Some(idx) = path[consumed..].find('/') {
        let end = consumed + idx;
        out.push(Crumb::Part {
            name: &path[consumed..end],
            path: &path[..end],
        });
        consumed = end + 1;
    }
    out.push(Crumb::Last {
        name: &path[consumed..],
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_ref<'i, 'r>(refs: &'r [&'r str], input: &'i str) -> Option<(&'r &'r str, &'i str)> {
        split_first_prefix(input, refs, |r| r)
    }

    #[test]
    fn every_ref_matches_itself() {
        let refs = ["master", "v1", "bob/bugfix", "alice/feature"];
        for r in refs.iter() {
            let (found, rest) = match_ref(&refs[..], r).expect("exact name must match");
            assert_eq!(r, found);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn splits_ref_from_path() {
        let refs = ["master", "main2", "main", "v1", "bob/bugfix"];

        let cases = [
            ("master/src/main.go", "master", "src/main.go"),
            ("master/", "master", ""),
            ("bob/bugfix/src/hue.rs", "bob/bugfix", "src/hue.rs"),
            // main2 is safe only because the store listed it first
            ("main2/README", "main2", "README"),
            // only one char is gone after splitting
            ("main//", "main", "/"),
        ];

        for (input, wanted_ref, wanted_rest) in cases.iter() {
            let (found, rest) = match_ref(&refs[..], input).expect("matches something");
            assert_eq!(wanted_ref, found, "bad ref for input: {}", input);
            assert_eq!(*wanted_rest, rest, "bad rest for input: {}", input);
        }
    }

    #[test]
    fn listing_order_wins_over_specificity() {
        // `v1` is listed before `v1.2`: it shadows the longer name,
        // eating the dot as if it were the separator
        let refs = ["v1", "v1.2"];
        let (found, rest) = match_ref(&refs[..], "v1.2/file").expect("matches v1... sadly");
        assert_eq!(&"v1", found);
        assert_eq!("2/file", rest);

        // flipping the listing flips the winner
        let refs = ["v1.2", "v1"];
        let (found, rest) = match_ref(&refs[..], "v1.2/file").expect("matches");
        assert_eq!(&"v1.2", found);
        assert_eq!("file", rest);
    }

    #[test]
    fn resolution_is_idempotent() {
        // re-resolving the remainder against the stripped input
        // yields the identical remainder
        let refs = ["main"];
        let (_, rest) = match_ref(&refs[..], "main/src/lib.rs").expect("matches");
        let reresolve = format!("main/{rest}");
        let (_, again) = match_ref(&refs[..], &reresolve).expect("matches");
        assert_eq!(rest, again);
    }

    #[test]
    fn junk_does_not_match() {
        let refs = ["main", "alice/feature"];
        for input in ["/main", "master", "", " alice/feature"] {
            assert!(
                match_ref(&refs[..], input).is_none(),
                "must not match junk: {input:?}"
            );
        }
    }

    #[test]
    fn crumb_decomposition() {
        assert!(crumbs("").is_empty());
        assert_eq!(vec![Crumb::Last { name: "a" }], crumbs("a"));
        assert_eq!(vec![Crumb::Last { name: "a" }], crumbs("a/"));
        assert_eq!(
            vec![
                Crumb::Part {
                    name: "a",
                    path: "a"
                },
                Crumb::Part {
                    name: "b",
                    path: "a/b"
                },
                Crumb::Last { name: "c" },
            ],
            crumbs("a/b/c")
        );
    }
}
