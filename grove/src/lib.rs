#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::flat_map_option,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::from_iter_instead_of_collect,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_digit_groups,
    clippy::large_stack_arrays,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wild_err_arm,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::missing_enforced_import_renames,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::needless_for_each,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::rc_mutex,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::single_match_else,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]

use error::wrap_err;
use gix::{object::tree, odb::HeaderExt, prelude::FindExt, Object, Tree};

// re-export
pub use gix::{
    actor::SignatureRef,
    date::time::Sign as TimeSign,
    date::Time,
    objs::{tree::EntryMode, CommitRef},
    Commit, ObjectId,
};

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

mod error;
pub use error::Error;

pub mod blame;

mod mime;

pub type Result<T> = std::result::Result<T, Error>;

pub fn guess_mime(path: &str, data: &[u8]) -> (&'static str, bool) {
    mime::guess(path, data)
}

// One opened repository. Cheap to open, meant to live for a single
// request and be dropped.
pub struct Grove {
    repo: gix::Repository,
    pub max_bytes: u64,
}

impl std::fmt::Debug for Grove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grove")
            .field("repo", &self.git_dir())
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

// A direct ref, already peeled down to the object it points at.
#[derive(Debug, Clone, Copy)]
pub struct RefItem<'a> {
    pub kind: RefKind,
    pub name: &'a [u8],
    pub target: ObjectId,
}

#[derive(Debug, Clone)]
pub struct Head {
    pub branch: String,
    pub target: ObjectId,
}

#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub mode: EntryMode,
    pub name: &'a [u8],
    pub id: ObjectId,
}

#[derive(Clone, Debug)]
pub struct Header {
    pub id: ObjectId,
    pub size: u64,
    pub kind: gix::object::Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHunk {
    pub lines: std::ops::Range<u32>,
    pub commit: ObjectId,
}

impl Grove {
    pub fn open(dir: PathBuf, max_bytes: u64, object_cache_size: usize) -> Result<Self> {
        let mut repo = gix::ThreadSafeRepository::open(dir)?.to_thread_local();
        repo.object_cache_size(object_cache_size);

        Ok(Self { repo, max_bytes })
    }

    pub fn git_dir(&self) -> &Path {
        self.repo.git_dir()
    }

    pub fn head(&self) -> Result<Head> {
        let Some(head) = self.repo.head_ref().ok().flatten() else {
            return Err(Error::DetachedHead);
        };
        let branch = String::from_utf8_lossy(head.name().shorten()).into_owned();
        let target = head.id().detach();
        Ok(Head { branch, target })
    }

    // Walks every local branch and tag in the order the ref store
    // yields them. Callers that need a different order sort on
    // their side; prefix matching against the listing relies on
    // this one being untouched.
    pub fn refs<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(RefItem<'_>) -> bool,
    {
        for mut r in self
            .repo
            .references()
            .map_err(|e| wrap_err("preparing to list refs".into(), e))?
            .all()
            .map_err(|e| wrap_err("iterating over refs".into(), e))?
            .flatten()
        {
            if r.try_id().is_none() {
                // symbolic, not interesting
                continue;
            }
            r.peel_to_id_in_place()
                .map_err(|e| wrap_err("peeling ref".into(), e))?;

            let Some((category, name)) = r.name().category_and_short_name() else {
                continue;
            };

            let kind = match category {
                gix::refs::Category::LocalBranch => RefKind::Branch,
                gix::refs::Category::Tag => RefKind::Tag,
                _other => continue,
            };

            if !visitor(RefItem {
                kind,
                name,
                target: r.id().detach(),
            }) {
                break;
            }
        }

        Ok(())
    }

    pub fn list_dir<V, P>(&self, head: ObjectId, dir: P, visitor: V) -> Result<()>
    where
        P: AsRef<Path>,
        V: FnMut(Entry<'_>),
    {
        let tree = self.commit_tree(head)?;

        if !dir.as_ref().is_relative() {
            return Err(Error::PathNotRelative(dir.as_ref().into()));
        }

        // empty dir == the root of the repo, nothing to find
        if dir.as_ref().as_os_str().is_empty() {
            return visit_tree(tree, visitor);
        }

        let mut buf = Vec::new();
        match find_path(&dir, &tree, &mut buf)? {
            Some(entry) if entry.mode().is_tree() => {
                visit_tree(self.find_object(entry.object_id())?.into_tree(), visitor)
            }
            Some(_not_a_tree) => Err(Error::NotADir(dir.as_ref().into())),
            None => Err(Error::NotFound),
        }
    }

    // load data into buf, yield the guessed mime and whether it can
    // be treated as text
    pub fn get_file_contents<P: AsRef<Path>>(
        &self,
        head: ObjectId,
        path: P,
        buf: &mut Vec<u8>,
    ) -> Result<(&'static str, bool)> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(Error::NotFound);
        }

        let tree = self.commit_tree(head)?;

        match find_path(&path, &tree, buf)? {
            Some(entry) if entry.mode().is_blob() => {
                buf.clear();
                self.read_blob(entry.object_id(), buf)?;
                Ok(mime::guess(path, buf))
            }
            Some(_not_a_blob) => Err(Error::NotAFile(path.as_ref().into())),
            None => Err(Error::NotFound),
        }
    }

    pub fn find_header<P: AsRef<Path>>(&self, head: ObjectId, path: P) -> Result<Option<Header>> {
        let mut tree = self.commit_tree(head)?;

        match tree.peel_to_entry_by_path(path.as_ref()) {
            Ok(Some(entry)) => {
                if entry.mode().is_commit() {
                    // submodules have no loose object to stat
                    Ok(Some(Header {
                        id: entry.object_id(),
                        size: 0,
                        kind: gix::objs::Kind::Commit,
                    }))
                } else {
                    Ok(Some(self.get_header(entry.object_id())?))
                }
            }
            Ok(None) => Ok(None),
            Err(gix::object::find::existing::Error::NotFound { oid }) => {
                Err(Error::ObjectNotFound(oid))
            }
            Err(e) => Err(wrap_err(
                format!("looking for path {:?} at tree {}", path.as_ref(), tree.id),
                e,
            )
            .into()),
        }
    }

    // Blame `path` as seen from `head`: every line of the current
    // content attributed to the commit that introduced it. Follows
    // the first parent only and stops once the path disappears from
    // the ancestry, so the worst case is still a walk to the very
    // first commit.
    pub fn blame<P: AsRef<Path>>(&self, head: ObjectId, path: P) -> Result<Vec<FileHunk>> {
        let path = path.as_ref();

        {
            let mut buf = Vec::new();
            let tree = self.commit_tree(head)?;
            match find_path(path, &tree, &mut buf)? {
                Some(entry) if entry.mode().is_blob() => {}
                Some(_not_a_blob) => return Err(Error::NotAFile(path.into())),
                None => return Err(Error::NotFound),
            }
        }

        let versions = self.file_versions(head, path)?;
        debug_assert!(!versions.is_empty(), "the blob exists at {head}");

        let hunks = blame::attribute(&versions, self)?;
        Ok(hunks
            .into_iter()
            .map(|h| FileHunk {
                lines: h.lines,
                commit: h.id.commit,
            })
            .collect())
    }

    // The versions of the blob at `path`, oldest first: one entry
    // per first-parent ancestor where the blob id changed.
    fn file_versions(&self, head: ObjectId, path: &Path) -> Result<Vec<Version>> {
        let mut versions = Vec::new();
        let mut buf = Vec::new();

        let mut cursor = Some(head);
        while let Some(id) = cursor {
            let commit = self.find_commit(id)?;
            let tree = commit_tree(&commit)?;
            let Some(current) = find_path(path, &tree, &mut buf)?.map(|e| e.object_id()) else {
                // path is gone this far back, the younger commits
                // already explain all of its lines
                break;
            };

            let parent = commit.parent_ids().next().map(|p| p.detach());
            let previous = match parent {
                Some(parent_id) => {
                    let parent_tree = self.commit_tree(parent_id)?;
                    find_path(path, &parent_tree, &mut buf)?.map(|e| e.object_id())
                }
                None => None,
            };

            if previous != Some(current) {
                versions.push(Version {
                    commit: id,
                    object: current,
                });
            }
            cursor = parent;
        }

        versions.reverse();
        Ok(versions)
    }

    pub fn find_commit(&self, id: ObjectId) -> Result<Commit<'_>> {
        self.find_object(id)?
            .try_into_commit()
            .map_err(|e| wrap_err(format!("reading object {}", id), e).into())
    }

    pub fn commit_time(&self, id: ObjectId) -> Result<Time> {
        self.find_commit(id)?
            .time()
            .map_err(|e| wrap_err(format!("reading time of commit {}", id), e).into())
    }

    pub fn read_blob(&self, id: ObjectId, buf: &mut Vec<u8>) -> Result<()> {
        self.repo
            .objects
            .find_blob(&id, buf)
            .map_err(|e| wrap_err(format!("reading blob id {}", id), e))?;

        Ok(())
    }

    fn find_object(&self, id: ObjectId) -> Result<Object<'_>> {
        self.repo
            .try_find_object(id)
            .map_err(|e| wrap_err(format!("searching for object {}", id), e))?
            .ok_or(Error::ObjectNotFound(id))
    }

    fn commit_tree(&self, id: ObjectId) -> Result<Tree<'_>> {
        commit_tree(&self.find_commit(id)?)
    }

    fn get_header(&self, id: ObjectId) -> Result<Header> {
        let h = self
            .repo
            .objects
            .header(id)
            .map_err(|_discarded| Error::ObjectNotFound(id))?;

        Ok(Header {
            id,
            size: h.size(),
            kind: h.kind(),
        })
    }

    // XXX lossy: blobs that aren't valid utf-8 still get their
    //     lines attributed, the replacement chars just aren't pretty
    #[allow(clippy::unused_self)]
    fn blob_bytes_to_string<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, str>> {
        Ok(String::from_utf8_lossy(data))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Version {
    commit: ObjectId,
    object: ObjectId,
}

impl blame::Source<Version> for &Grove {
    type Error = Error;

    fn load(&self, id: &Version, buf: &mut Vec<u8>) -> std::result::Result<(), Self::Error> {
        self.read_blob(id.object, buf)
    }

    fn decode_text<'a>(
        &self,
        data: &'a [u8],
    ) -> std::result::Result<std::borrow::Cow<'a, str>, Self::Error> {
        self.blob_bytes_to_string(data)
    }
}

fn visit_tree<V>(tree: Tree<'_>, mut visitor: V) -> Result<()>
where
    V: FnMut(Entry<'_>),
{
    for maybe_entry in tree.iter() {
        let entry =
            maybe_entry.map_err(|e| wrap_err(format!("listing items for tree {}", tree.id), e))?;
        visitor(Entry {
            mode: entry.mode(),
            name: entry.filename(),
            id: entry.object_id(),
        });
    }
    Ok(())
}

fn commit_tree<'a>(commit: &Commit<'a>) -> Result<Tree<'a>> {
    commit
        .tree()
        .map_err(|e| wrap_err(format!("reading tree for commit {}", commit.id), e).into())
}

// a single full-path lookup, not a segment-wise descent
fn find_path<'a, P: AsRef<Path>>(
    path: P,
    tree: &Tree<'a>,
    buf: &mut Vec<u8>,
) -> Result<Option<tree::Entry<'a>>> {
    match tree.lookup_entry_by_path(&path, buf) {
        Ok(found) => Ok(found),
        Err(gix::object::find::existing::Error::NotFound { oid }) => {
            Err(Error::ObjectNotFound(oid))
        }
        Err(e) => Err(wrap_err(
            format!("looking for path {:?} at tree {}", path.as_ref(), tree.id),
            e,
        )
        .into()),
    }
}
