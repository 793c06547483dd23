use std::path::{Path, PathBuf};

use chrono::TimeZone;
use grove::{Error, Grove, ObjectId, RefKind};

use crate::{config::GlobalConfig, view::render_markdown};

mod id;
mod util;

pub(crate) use id::HexId;

pub(crate) type DateTime = chrono::DateTime<chrono::FixedOffset>;

// One repository, freshly opened for a single request and dropped
// with it. Nothing in here survives across requests.
pub(crate) struct Browser {
    grove: Grove,
    name: String,
    base: String,
    // store listing order. resolution scans this as-is, so the
    // order must stay untouched
    refs: Vec<RefEntry>,
    head: RefEntry,
    description: String,
}

#[derive(Debug, Clone)]
pub(crate) struct RefEntry {
    pub kind: RefKind,
    pub name: String,
    pub target: ObjectId,
}

impl Browser {
    pub fn open(dir: PathBuf, name: String, config: &GlobalConfig) -> grove::Result<Self> {
        let grove = Grove::open(
            dir,
            config.max_file_size_bytes,
            config.repo_object_cache_size,
        )?;

        let mut refs = Vec::new();
        grove.refs(|r| {
            refs.push(RefEntry {
                kind: r.kind,
                // XXX assuming utf8 ref names
                name: String::from_utf8_lossy(r.name).into_owned(),
                target: r.target,
            });
            true
        })?;

        let head = grove.head()?;
        let head = refs
            .iter()
            .find(|r| matches!(r.kind, RefKind::Branch) && r.name == head.branch)
            .cloned()
            .unwrap_or(RefEntry {
                kind: RefKind::Branch,
                name: head.branch,
                target: head.target,
            });

        let description = read_description(grove.git_dir());

        Ok(Self {
            grove,
            name,
            base: config.base().to_string(),
            refs,
            head,
            description,
        })
    }

    pub fn head(&self) -> &RefEntry {
        &self.head
    }

    // Split a combined `<ref>/<subpath>` segment against this
    // repository's references, first match in listing order wins.
    pub fn resolve<'i>(&self, param: &'i str) -> Option<(&RefEntry, &'i str)> {
        util::split_first_prefix(param, &self.refs, |r| r.name.as_str())
    }

    pub fn tree_page(&self, refname: &str, head: ObjectId, path: &str) -> grove::Result<TreePage<'_>> {
        let mut entries = Vec::new();
        self.grove.list_dir(head, path, |entry| {
            // XXX assuming utf8
            let name = String::from_utf8_lossy(entry.name).into_owned();
            let (kind, url) = {
                if entry.mode.is_tree() {
                    (
                        EntryKind::Dir,
                        self.browse_url(UrlKind::Tree, refname, &join_path(path, &name)),
                    )
                } else if entry.mode.is_link() {
                    (EntryKind::Symlink, "#".into())
                } else if entry.mode.is_commit() {
                    (EntryKind::Submodule, "#".into())
                } else {
                    debug_assert!(
                        entry.mode.is_blob(),
                        "unhandled entry kind {}",
                        entry.mode.as_str()
                    );
                    (
                        EntryKind::File,
                        self.browse_url(UrlKind::Blob, refname, &join_path(path, &name)),
                    )
                }
            };
            entries.push(TreeEntry { name, kind, url });
        })?;
        entries.sort_unstable_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));

        let entries = self.annotate(head, path, entries)?;
        let readme = self.find_readme(head, path, &entries);

        let mut parent_url = None;
        if !path.is_empty() {
            let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
            parent_url = Some(self.tree_url(refname, parent));
        }

        Ok(TreePage {
            repo: self.info(),
            nav: self.breadcrumbs(refname, path, UrlKind::Tree),
            path: path.to_string(),
            entries,
            parent_url,
            readme,
        })
    }

    pub fn blob_page(&self, refname: &str, head: ObjectId, path: &str) -> grove::Result<BlobPage<'_>> {
        let (kind, text) = self.load_content(head, path)?;

        let mut num_lines = 0;
        if let Some(ref data) = text {
            num_lines = data.matches('\n').count();
            if !data.ends_with('\n') {
                num_lines += 1;
            }
        }

        let change = self.last_change(head, path)?;
        let content = text.unwrap_or_else(|| kind.placeholder().to_string());

        Ok(BlobPage {
            repo: self.info(),
            nav: self.breadcrumbs(refname, path, UrlKind::Blob),
            path: path.to_string(),
            kind,
            content,
            num_lines,
            change,
        })
    }

    pub fn refs_page(&self) -> grove::Result<RefsPage<'_>> {
        let mut branches = Vec::new();
        let mut tags = Vec::new();

        for r in &self.refs {
            // tags may point at any object kind (trees, blobs);
            // nothing sensible to date those with
            let time = match self.grove.commit_time(r.target) {
                Ok(time) => convert(time),
                Err(err) => {
                    tracing::trace!(?err, name = r.name, "ref skipped: target is not a commit");
                    continue;
                }
            };
            let info = RefInfo {
                name: r.name.clone(),
                browse_url: self.tree_url(&r.name, ""),
                time,
                time_relative: time.into(),
            };
            match r.kind {
                RefKind::Branch => branches.push(info),
                RefKind::Tag => tags.push(info),
            };
        }

        branches.sort_unstable_by_key(|b| std::cmp::Reverse(b.time));
        tags.sort_unstable_by_key(|t| std::cmp::Reverse(t.time));

        Ok(RefsPage {
            repo: self.info(),
            branches,
            tags,
        })
    }

    // Pair every file entry with the commit that last touched it.
    // One blame plus one commit lookup per hunk: O(files x hunks)
    // store reads for a single listing. Fine for small repositories,
    // crawls on big ones.
    fn annotate(
        &self,
        head: ObjectId,
        dir: &str,
        entries: Vec<TreeEntry>,
    ) -> grove::Result<Vec<AnnotatedEntry>> {
        entries
            .into_iter()
            .map(|entry| {
                let change = match entry.kind {
                    EntryKind::File => self.last_change(head, &join_path(dir, &entry.name))?,
                    ref _skipped => None,
                };
                Ok(AnnotatedEntry { entry, change })
            })
            .collect()
    }

    fn last_change(&self, head: ObjectId, path: &str) -> grove::Result<Option<ChangeInfo>> {
        let hunks = match self.grove.blame(head, path) {
            Ok(hunks) => hunks,
            // symlinks and submodules have no line history
            Err(Error::NotAFile(_)) => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut dated = Vec::new();
        for hunk in &hunks {
            if dated.iter().any(|&(_, id)| id == hunk.commit) {
                continue;
            }
            dated.push((convert(self.grove.commit_time(hunk.commit)?), hunk.commit));
        }

        let Some((time, id)) = newest(dated) else {
            // empty files have no hunks, hence nothing to show
            return Ok(None);
        };

        let commit = map_commit(&self.grove.find_commit(id)?)?;
        Ok(Some(ChangeInfo {
            id: id.into(),
            title: commit.message.title,
            author_name: commit.author.name,
            time,
            time_relative: time.into(),
        }))
    }

    // the first file whose name says readme, case-insensitive,
    // rendered to html. absence is not an error
    fn find_readme(&self, head: ObjectId, dir: &str, entries: &[AnnotatedEntry]) -> Option<Readme> {
        let candidate = entries
            .iter()
            .find(|e| matches!(e.entry.kind, EntryKind::File) && is_readme_name(&e.entry.name))?;

        let path = join_path(dir, &candidate.entry.name);
        let mut data = Vec::new();
        match self.grove.get_file_contents(head, &path, &mut data) {
            Ok(_mime) => Some(Readme {
                path,
                html: render_markdown(&data),
            }),
            Err(err) => {
                tracing::warn!(?err, path, "readme listed but not readable");
                None
            }
        }
    }

    fn load_content(&self, head: ObjectId, path: &str) -> grove::Result<(ContentKind, Option<String>)> {
        // guess from the name alone so obviously-binary files don't
        // get buffered at all
        let (_mime, is_text) = grove::guess_mime(path, &[]);
        if !is_text {
            return Ok((ContentKind::Binary, None));
        }

        let Some(header) = self.grove.find_header(head, path)? else {
            return Err(Error::NotFound);
        };
        if !header.kind.is_blob() {
            return Err(Error::NotFound);
        }
        if header.size > self.grove.max_bytes {
            return Ok((ContentKind::TooLarge, None));
        }

        let mut data = Vec::new();
        self.grove.read_blob(header.id, &mut data)?;
        // with bytes at hand the guess is more reliable
        let (mime, is_text) = grove::guess_mime(path, &data);

        if mime == "text/markdown" {
            Ok((ContentKind::Markdown, Some(render_markdown(&data))))
        } else if is_text {
            match String::from_utf8(data) {
                Ok(valid) => Ok((ContentKind::Text, Some(valid))),
                Err(err) => {
                    tracing::warn!(?err, path, "text-ish blob does not decode");
                    Ok((ContentKind::Binary, None))
                }
            }
        } else {
            tracing::warn!(path, mime, "mime guess mismatch: name said text, bytes disagree");
            Ok((ContentKind::Binary, None))
        }
    }

    fn breadcrumbs(&self, refname: &str, path: &str, last_kind: UrlKind) -> Breadcrumbs {
        let mut components = Vec::new();
        let mut tail = None;
        for crumb in util::crumbs(path) {
            match crumb {
                util::Crumb::Part { name, path } => components.push(Component {
                    value: name.to_string(),
                    url: self.browse_url(UrlKind::Tree, refname, path),
                }),
                util::Crumb::Last { name } => {
                    tail = Some(Component {
                        value: name.to_string(),
                        url: self.browse_url(last_kind, refname, path),
                    });
                }
            };
        }
        Breadcrumbs {
            refname: refname.to_string(),
            root_url: self.tree_url(refname, ""),
            components,
            tail,
        }
    }

    // canonical display path: /<repo>/<kind>/<ref>/<path>
    fn browse_url(&self, kind: UrlKind, refname: &str, path: &str) -> String {
        debug_assert!(!path.starts_with('/'), "bad input: {path}");
        match kind {
            UrlKind::Tree if path.is_empty() => {
                format!("{}/{}/tree/{refname}/", self.base, self.name)
            }
            UrlKind::Tree => format!("{}/{}/tree/{refname}/{path}/", self.base, self.name),
            UrlKind::Blob => format!("{}/{}/blob/{refname}/{path}", self.base, self.name),
        }
    }

    pub fn tree_url(&self, refname: &str, path: &str) -> String {
        self.browse_url(UrlKind::Tree, refname, path)
    }

    pub fn blob_url(&self, refname: &str, path: &str) -> String {
        self.browse_url(UrlKind::Blob, refname, path)
    }

    fn refs_url(&self) -> String {
        format!("{}/{}/refs", self.base, self.name)
    }

    fn info(&self) -> Info<'_> {
        Info {
            name: &self.name,
            url: format!("{}/{}/", self.base, self.name),
            refs_url: self.refs_url(),
            description: (!self.description.is_empty()).then_some(self.description.as_str()),
        }
    }
}

// the most recent timestamp wins; a tie goes to the entry examined
// last, i.e. popping from a date-ascending stable sort
fn newest<T>(mut dated: Vec<(DateTime, T)>) -> Option<(DateTime, T)> {
    dated.sort_by_key(|&(time, _)| time);
    dated.pop()
}

fn is_readme_name(name: &str) -> bool {
    name.get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("readme"))
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

pub(crate) fn read_description(git_dir: &Path) -> String {
    match std::fs::read_to_string(git_dir.join("description")) {
        Ok(text) => text.trim().to_string(),
        Err(err) => {
            tracing::trace!(?err, ?git_dir, "no readable description file");
            String::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlKind {
    Tree,
    Blob,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct Info<'a> {
    name: &'a str,
    url: String,
    refs_url: String,
    description: Option<&'a str>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct Listing<'a> {
    title: &'a str,
    header_html: &'a str,
    repos: Vec<ListEntry<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct ListEntry<'a> {
    name: &'a str,
    url: String,
    description: Option<&'a str>,
    idle: DateTime,
    idle_relative: RelativeDateTime,
}

pub(crate) fn listing<'a>(
    config: &'a GlobalConfig,
    found: &'a [crate::catalog::Discovered],
) -> Listing<'a> {
    Listing {
        title: &config.site.listing_title,
        header_html: &config.site.listing_html_header,
        repos: found
            .iter()
            .map(|repo| ListEntry {
                name: &repo.name,
                url: config.repo_url(&repo.name),
                description: (!repo.description.is_empty()).then_some(repo.description.as_str()),
                idle: repo.idle,
                idle_relative: repo.idle.into(),
            })
            .collect(),
    }
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct TreePage<'a> {
    repo: Info<'a>,
    nav: Breadcrumbs,
    path: String,
    entries: Vec<AnnotatedEntry>,
    parent_url: Option<String>,
    readme: Option<Readme>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct BlobPage<'a> {
    repo: Info<'a>,
    nav: Breadcrumbs,
    path: String,
    kind: ContentKind,
    content: String,
    num_lines: usize,
    change: Option<ChangeInfo>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct RefsPage<'a> {
    repo: Info<'a>,
    branches: Vec<RefInfo>,
    tags: Vec<RefInfo>,
}

#[derive(Debug, serde::Serialize)]
struct RefInfo {
    name: String,
    browse_url: String,
    time: DateTime,
    time_relative: RelativeDateTime,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub(crate) enum EntryKind {
    Dir,
    File,
    Symlink,
    Submodule,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct TreeEntry {
    name: String,
    kind: EntryKind,
    url: String,
}

// an entry paired with the commit that last touched it, computed
// per request rather than stored anywhere
#[derive(Debug, serde::Serialize)]
pub(crate) struct AnnotatedEntry {
    entry: TreeEntry,
    change: Option<ChangeInfo>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct ChangeInfo {
    id: HexId,
    title: String,
    author_name: String,
    time: DateTime,
    time_relative: RelativeDateTime,
}

#[derive(Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) enum ContentKind {
    Text,
    Markdown,
    Binary,
    TooLarge,
}

impl ContentKind {
    // binary and oversized blobs never leak raw bytes into a view,
    // they get a fixed placeholder instead
    fn placeholder(&self) -> &'static str {
        match self {
            ContentKind::Binary => "(binary file)",
            ContentKind::TooLarge => "(file too large to display)",
            ContentKind::Text | ContentKind::Markdown => "",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct Readme {
    path: String,
    html: String,
}

#[derive(Debug, serde::Serialize)]
struct Breadcrumbs {
    refname: String,
    // points at the start of the path, for when components and
    // tail are empty
    root_url: String,
    components: Vec<Component>,
    tail: Option<Component>,
}

#[derive(Debug, serde::Serialize)]
struct Component {
    value: String,
    url: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct CommitInfo {
    pub id: HexId,
    pub author: Signature,
    pub message: Message,
}

#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct Signature {
    pub name: String,
    pub email: String,
    pub time: DateTime,
    pub time_relative: RelativeDateTime,
}

#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct Message {
    pub title: String,
    pub body: String,
}

fn map_commit(commit: &grove::Commit<'_>) -> grove::Result<CommitInfo> {
    let id = commit.id;
    let commit = commit.decode().map_err(|_discarded| Error::Decode(id))?;

    // commits carry an optional encoding tag; when present it is
    // ignored and utf-8 assumed, same as everywhere else here
    if let Some(encoding) = commit.encoding {
        tracing::debug!(
            "commit {} declares encoding {:?}, decoded as utf-8",
            id,
            String::from_utf8_lossy(encoding)
        );
    }

    let author = map_signature(commit.author());

    let msg = commit.message();
    let body = msg
        .body
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    let message = Message {
        title: String::from_utf8_lossy(msg.title).trim_end().to_string(),
        body,
    };

    Ok(CommitInfo {
        id: id.into(),
        author,
        message,
    })
}

fn map_signature(sig: grove::SignatureRef<'_>) -> Signature {
    let time = convert(sig.time);
    Signature {
        name: String::from_utf8_lossy(sig.name).into_owned(),
        email: String::from_utf8_lossy(sig.email).into_owned(),
        time_relative: time.into(),
        time,
    }
}

pub(crate) fn convert(t: grove::Time) -> DateTime {
    let offset = if t.sign == grove::TimeSign::Plus {
        chrono::FixedOffset::east_opt(t.offset.abs())
    } else {
        chrono::FixedOffset::west_opt(t.offset.abs())
    };
    offset
        .and_then(|o| o.timestamp_opt(t.seconds, 0).earliest())
        .unwrap_or_else(|| {
            tracing::error!(time=?t, "unable to convert gix time to a chrono datetime");
            DateTime::default()
        })
}

// DateTime that becomes a relative time string when serialized.
// One way only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RelativeDateTime(DateTime);

impl From<DateTime> for RelativeDateTime {
    fn from(value: DateTime) -> Self {
        Self(value)
    }
}

impl serde::Serialize for RelativeDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let relative = format!("{}", chrono_humanize::HumanTime::from(self.0));
        serializer.serialize_str(&relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(seconds: i64) -> DateTime {
        chrono::FixedOffset::east_opt(0)
            .expect("offset zero is valid")
            .timestamp_opt(seconds, 0)
            .earliest()
            .expect("in range")
    }

    #[test]
    fn newest_picks_the_maximum_timestamp() {
        let dated = vec![(date(100), 'a'), (date(300), 'b'), (date(200), 'c')];
        assert_eq!(Some((date(300), 'b')), newest(dated));

        // single entry: trivially the maximum
        assert_eq!(Some((date(7), 'z')), newest(vec![(date(7), 'z')]));

        assert_eq!(None, newest::<char>(Vec::new()));
    }

    #[test]
    fn newest_breaks_ties_towards_the_last_examined() {
        let dated = vec![(date(100), 'a'), (date(300), 'b'), (date(300), 'c')];
        assert_eq!(Some((date(300), 'c')), newest(dated));
    }

    #[test]
    fn readme_name_matching() {
        for name in ["README.md", "readme.txt", "ReadMe", "readme", "README"] {
            assert!(is_readme_name(name), "should match: {name}");
        }
        for name in ["notreadme.md", "read", "", "md.readme"] {
            assert!(!is_readme_name(name), "should not match: {name}");
        }
    }

    #[test]
    fn placeholders_never_expose_bytes() {
        assert_eq!("(binary file)", ContentKind::Binary.placeholder());
        assert_eq!(
            "(file too large to display)",
            ContentKind::TooLarge.placeholder()
        );
        assert!(ContentKind::Text.placeholder().is_empty());
    }

    #[test]
    fn path_joining() {
        assert_eq!("a.txt", join_path("", "a.txt"));
        assert_eq!("src/a.txt", join_path("src", "a.txt"));
    }
}
