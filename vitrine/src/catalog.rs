use std::path::{Path, PathBuf};

use grove::Grove;

use crate::{
    config::GlobalConfig,
    repo::{convert, read_description, DateTime},
};

#[derive(Debug, Clone)]
pub(crate) struct Discovered {
    pub name: String,
    pub description: String,
    pub idle: DateTime,
}

// Walk the immediate children of `root` and keep every one that
// opens as a repository with a resolvable head. Anything else is
// logged and dropped: a broken candidate never breaks the listing.
// Runs on every listing request, nothing is remembered in between.
pub(crate) fn scan(root: &Path, config: &GlobalConfig) -> Vec<Discovered> {
    let mut found = Vec::new();

    let candidates = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(?err, ?root, "unable to read the scan root");
            return found;
        }
    };

    for entry in candidates.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        match probe(path, config) {
            Ok((description, idle)) => found.push(Discovered {
                name,
                description,
                idle,
            }),
            Err(err) => {
                tracing::warn!(name, %err, "candidate skipped: not a browsable repository");
            }
        };
    }

    rank_by_recency(&mut found);
    found
}

fn probe(dir: PathBuf, config: &GlobalConfig) -> grove::Result<(String, DateTime)> {
    let grove = Grove::open(
        dir,
        config.max_file_size_bytes,
        config.repo_object_cache_size,
    )?;
    let head = grove.head()?;
    let idle = convert(grove.commit_time(head.target)?);
    Ok((read_description(grove.git_dir()), idle))
}

// most recently active first; candidates sharing a timestamp may
// land in either order
fn rank_by_recency(found: &mut [Discovered]) {
    found.sort_unstable_by_key(|repo| std::cmp::Reverse(repo.idle));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn discovered(name: &str, seconds: i64) -> Discovered {
        Discovered {
            name: name.to_string(),
            description: String::new(),
            idle: chrono::FixedOffset::east_opt(0)
                .expect("offset zero is valid")
                .timestamp_opt(seconds, 0)
                .earliest()
                .expect("in range"),
        }
    }

    #[test]
    fn ranking_is_most_recent_first() {
        // 2023-01-01, 2024-06-01 and 2022-05-05
        let mut found = vec![
            discovered("middle", 1_672_531_200),
            discovered("fresh", 1_717_200_000),
            discovered("stale", 1_651_708_800),
        ];

        rank_by_recency(&mut found);

        let names: Vec<&str> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(vec!["fresh", "middle", "stale"], names);
    }
}
