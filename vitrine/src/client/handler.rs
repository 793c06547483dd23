use std::{path::PathBuf, sync::Arc};

use grove::Error;

use crate::{
    catalog,
    config::GlobalConfig,
    repo::{self, Browser},
    view::View,
};

use super::{workers::Command, Inner};

pub(super) async fn route(state: &Inner, uri: &axum::http::Uri) -> Output {
    // request path without the leading slash
    let path = {
        let p = uri.path();
        debug_assert!(p.starts_with('/'));
        &p[1..]
    };

    if !validate_path(path) {
        return Output::NotFound;
    }

    if path.is_empty() {
        return exec(
            state,
            Blocking::Listing {
                root: state.root.clone(),
                config: Arc::clone(&state.config),
            },
        )
        .await;
    }

    let (name, rest) = path.split_once('/').unwrap_or((path, ""));

    // naked uri to the repo, no trailing slash: <host>/repo
    if rest.is_empty() && !path.ends_with('/') {
        return Output::Redirect(format!("{}/{name}/", state.base));
    }

    // uris look like:
    //
    // <host>:<port>/<repo>/<view>/<ref>/<path>
    //
    // where `<ref>/<path>` is one opaque segment that only the
    // repository itself can split, by matching its own reference
    // names against it. keeping the ref in the path (rather than a
    // query param) means relative links inside rendered markdown
    // keep pointing at the same version of everything.
    let (view, param) = rest.split_once('/').unwrap_or((rest, ""));

    let op = match view {
        "" if param.is_empty() => RepoOp::Root,
        "tree" if !param.is_empty() => RepoOp::Tree(param.trim_end_matches('/').to_string()),
        "blob" if !param.is_empty() => RepoOp::Blob(param.to_string()),
        "refs" if param.is_empty() => RepoOp::Refs,
        _unknown => return Output::NotFound,
    };

    exec(
        state,
        Blocking::Repo {
            dir: state.root.join(name),
            name: name.to_string(),
            config: Arc::clone(&state.config),
            op,
        },
    )
    .await
}

async fn exec(state: &Inner, cmd: Blocking) -> Output {
    match state.workers.execute(cmd).await {
        Ok(output) => output,
        Err(err) => Output::Error(format!("worker pool failure: {err}")),
    }
}

#[derive(Debug)]
pub(super) enum Blocking {
    Listing {
        root: PathBuf,
        config: Arc<GlobalConfig>,
    },
    Repo {
        dir: PathBuf,
        name: String,
        config: Arc<GlobalConfig>,
        op: RepoOp,
    },
}

#[derive(Debug)]
pub(super) enum RepoOp {
    Root,
    Tree(String),
    Blob(String),
    Refs,
}

impl Command for Blocking {
    type Output = Output;

    fn exec(self) -> Output {
        match self {
            Blocking::Listing { root, config } => {
                let found = catalog::scan(&root, &config);
                Output::Template(View::index(repo::listing(&config, &found)))
            }
            Blocking::Repo {
                dir,
                name,
                config,
                op,
            } => {
                let browser = match Browser::open(dir, name, &config) {
                    Ok(browser) => browser,
                    Err(err) => {
                        tracing::debug!(%err, "request for a repository that does not open");
                        return Output::NotFound;
                    }
                };
                op.run(&browser)
            }
        }
    }
}

impl RepoOp {
    fn run(self, browser: &Browser) -> Output {
        match self {
            RepoOp::Root => {
                let head = browser.head();
                complete(
                    browser
                        .tree_page(&head.name, head.target, "")
                        .map(View::tree),
                )
            }
            RepoOp::Tree(param) => {
                let Some((matched, path)) = browser.resolve(&param) else {
                    return Output::NotFound;
                };
                match browser.tree_page(&matched.name, matched.target, path) {
                    // a file under the tree view belongs to the
                    // blob view
                    Err(Error::NotADir(_)) => Output::Redirect(browser.blob_url(&matched.name, path)),
                    result => complete(result.map(View::tree)),
                }
            }
            RepoOp::Blob(param) => {
                let Some((matched, path)) = browser.resolve(&param) else {
                    return Output::NotFound;
                };
                if path.is_empty() {
                    return Output::NotFound;
                }
                complete(
                    browser
                        .blob_page(&matched.name, matched.target, path)
                        .map(View::blob),
                )
            }
            RepoOp::Refs => complete(browser.refs_page().map(View::refs)),
        }
    }
}

fn complete(result: grove::Result<View>) -> Output {
    match result {
        Ok(view) => Output::Template(view),
        Err(Error::NotFound | Error::NotAFile(_) | Error::NotADir(_)) => Output::NotFound,
        Err(err) => {
            tracing::error!(?err, "unhandled error within worker");
            Output::Error(format!("worker error: {err}"))
        }
    }
}

#[derive(Debug)]
pub(crate) enum Output {
    Template(View),
    NotFound,
    Error(String),
    Redirect(String),
}

// only reasonable paths are valid.
// assumes an already decoded url path
pub(super) fn validate_path(mut input: &str) -> bool {
    loop {
        if let Some((comp, tail)) = input.split_once('/') {
            if tail.starts_with('/') {
                tracing::trace!(input, "bad uri: repeated slashes");
                return false;
            }
            if matches!(comp, "." | "..") {
                tracing::trace!(input, "bad uri: dot component");
                return false;
            }

            input = tail;
        } else {
            if matches!(input, "." | "..") {
                tracing::trace!(input, "bad uri: dot component");
                return false;
            }
            break;
        }
    }

    true
}

#[cfg(test)]
mod tests {

    #[test]
    fn path_validation() {
        use super::validate_path;

        for bad in [
            ".", "..", "a/.", "b/./", "/c/../", "d/..", "//", "//e", "f//",
        ] {
            assert!(!validate_path(bad), "must reject: {bad:?}");
        }

        for good in ["", "repo", "repo/", "repo/tree/main/src", "a/b.c/d"] {
            assert!(validate_path(good), "must accept: {good:?}");
        }
    }
}
