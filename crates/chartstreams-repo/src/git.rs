//! Git access and the shared working view
//!
//! The source repository is cloned once into a working directory that the
//! rest of the crate treats as a single checkout surface: a commit is checked
//! out, then its tree is read through [`WorkTree`]. Exclusive access is
//! enforced by [`CheckoutController`].

use chartstreams_core::{EntryKind, PackEntry, WorkTree};
use chrono::{DateTime, Utc};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{ErrorCode, FetchOptions, ObjectType, Oid, Repository, Revwalk, Sort, Tree};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::error::{RepoError, Result};

/// The commit that introduced a chart version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRef {
    /// Full hex object id
    pub hash: String,
    /// Committer time
    pub timestamp: DateTime<Utc>,
}

impl CommitRef {
    /// First eight characters of the hash, for logs and display
    pub fn short_hash(&self) -> &str {
        let end = self.hash.len().min(8);
        &self.hash[..end]
    }

    /// Whether this commit should replace `recorded` as the introducing commit
    ///
    /// Earlier committer time wins. On a tie between two different commits
    /// the one seen later wins: history is walked children-first, so it
    /// cannot be a descendant of `recorded`.
    pub fn supersedes(&self, recorded: &CommitRef) -> bool {
        self.timestamp < recorded.timestamp
            || (self.timestamp == recorded.timestamp && self.hash != recorded.hash)
    }
}

/// A clone of the chart repository and its working tree
pub struct GitChartRepo {
    repo: Repository,
    workdir: PathBuf,
    /// Branch whose history is indexed; `None` for a repository without commits
    tip_ref: Option<String>,
    /// Keeps a temporary clone alive for the lifetime of the accessor
    _tempdir: Option<TempDir>,
}

impl std::fmt::Debug for GitChartRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitChartRepo")
            .field("workdir", &self.workdir)
            .field("tip_ref", &self.tip_ref)
            .finish()
    }
}

impl GitChartRepo {
    /// Clone `config.repo_url` into the configured working directory, or a temporary one
    pub fn clone_from(config: &StreamConfig) -> Result<Self> {
        config.validate()?;

        let (workdir, tempdir) = match &config.working_dir {
            Some(dir) => {
                if dir.exists() && std::fs::read_dir(dir)?.next().is_some() {
                    return Err(RepoError::InvalidConfig {
                        message: format!("working directory is not empty: {}", dir.display()),
                    });
                }
                (dir.clone(), None)
            }
            None => {
                let temp = tempfile::Builder::new().prefix("chartstreams-").tempdir()?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        let mut fetch = FetchOptions::new();
        if config.clone_depth > 0 {
            fetch.depth(i32::try_from(config.clone_depth).unwrap_or(i32::MAX));
        }

        info!(
            url = %config.repo_url,
            workdir = %workdir.display(),
            depth = config.clone_depth,
            "cloning chart repository"
        );

        let repo = RepoBuilder::new()
            .fetch_options(fetch)
            .clone(&config.repo_url, &workdir)
            .map_err(|e| {
                RepoError::repository(format!(
                    "failed to clone {}: {}",
                    config.repo_url,
                    e.message()
                ))
            })?;

        let tip_ref = match repo.head() {
            Ok(head) => head.name().map(str::to_string),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            repo,
            workdir,
            tip_ref,
            _tempdir: tempdir,
        })
    }

    /// Branch reference whose history is walked
    pub fn tip_ref(&self) -> Option<&str> {
        self.tip_ref.as_deref()
    }

    /// Walk every commit reachable from the branch tip
    ///
    /// Order is topological, newest first: no commit is yielded before all
    /// of its children. For a fixed repository state the order is always the
    /// same. Each call starts a new walk.
    pub fn all_commits(&self) -> Result<CommitWalk<'_>> {
        let Some(tip_ref) = &self.tip_ref else {
            return Ok(CommitWalk {
                repo: &self.repo,
                walk: None,
            });
        };

        let tip = self.repo.refname_to_id(tip_ref)?;
        let mut walk = self.repo.revwalk()?;
        walk.push(tip)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        Ok(CommitWalk {
            repo: &self.repo,
            walk: Some(walk),
        })
    }

    /// Force the working view to the tree of `hash`
    ///
    /// Files tracked at the previous commit, untracked and ignored leftovers
    /// are all removed, so the view matches the commit exactly.
    pub fn checkout(&self, hash: &str) -> Result<()> {
        let commit = self.find_commit(hash)?;
        let oid = commit.id();

        let mut opts = CheckoutBuilder::new();
        opts.force().remove_untracked(true).remove_ignored(true);

        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))
            .map_err(|e| {
                RepoError::repository(format!("checkout of {} failed: {}", hash, e.message()))
            })?;
        self.repo.set_head_detached(oid)?;

        debug!(commit = %hash, "checked out commit");
        Ok(())
    }

    /// Files and symlinks beneath `dir` as committed at `hash`
    ///
    /// Read from the object database: `.gitattributes` filters that a
    /// checkout applies (eol conversion, `ident`) never show here, and the
    /// executable bit comes from the tree entry mode. Submodules are skipped.
    pub fn tree_entries(&self, hash: &str, dir: &Path) -> Result<Vec<PackEntry<Oid>>> {
        let commit = self.find_commit(hash)?;
        let root = commit.tree()?;

        let tree = if dir.as_os_str().is_empty() {
            root
        } else {
            let entry = root.get_path(dir).map_err(|e| {
                RepoError::repository(format!(
                    "{} not found at commit {}: {}",
                    dir.display(),
                    hash,
                    e.message()
                ))
            })?;
            self.repo.find_tree(entry.id()).map_err(|e| {
                RepoError::repository(format!(
                    "{} is not a directory at commit {}: {}",
                    dir.display(),
                    hash,
                    e.message()
                ))
            })?
        };

        let mut entries = Vec::new();
        collect_tree(&self.repo, &tree, "", &mut entries)?;
        Ok(entries)
    }

    /// Raw content of a blob
    pub fn blob_content(&self, id: Oid) -> Result<Vec<u8>> {
        Ok(self.repo.find_blob(id)?.content().to_vec())
    }

    /// Commit the working view currently reflects
    pub fn head_commit(&self) -> Option<String> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .map(|oid| oid.to_string())
    }
}

impl GitChartRepo {
    fn find_commit(&self, hash: &str) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(hash).map_err(|e| {
            RepoError::repository(format!("invalid commit hash '{}': {}", hash, e.message()))
        })?;
        self.repo.find_commit(oid).map_err(|e| {
            RepoError::repository(format!("unknown commit {}: {}", hash, e.message()))
        })
    }
}

fn collect_tree(
    repo: &Repository,
    tree: &Tree<'_>,
    base: &str,
    out: &mut Vec<PackEntry<Oid>>,
) -> Result<()> {
    for entry in tree.iter() {
        let name = std::str::from_utf8(entry.name_bytes()).map_err(|_| {
            RepoError::repository(format!(
                "file name {:?} under '{}' is not valid UTF-8",
                String::from_utf8_lossy(entry.name_bytes()),
                base
            ))
        })?;
        let rel = if base.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", base, name)
        };

        match entry.kind() {
            Some(ObjectType::Tree) => {
                let subtree = repo.find_tree(entry.id())?;
                collect_tree(repo, &subtree, &rel, out)?;
            }
            Some(ObjectType::Blob) => out.push(PackEntry {
                rel,
                kind: blob_kind(entry.filemode()),
                source: entry.id(),
            }),
            _ => {}
        }
    }
    Ok(())
}

fn blob_kind(filemode: i32) -> EntryKind {
    match filemode {
        0o120000 => EntryKind::Symlink,
        0o100755 => EntryKind::File { executable: true },
        _ => EntryKind::File { executable: false },
    }
}

impl WorkTree for GitChartRepo {
    fn root(&self) -> &Path {
        &self.workdir
    }
}

/// Single-pass iterator over the commits of a [`GitChartRepo`]
pub struct CommitWalk<'repo> {
    repo: &'repo Repository,
    walk: Option<Revwalk<'repo>>,
}

impl Iterator for CommitWalk<'_> {
    type Item = Result<CommitRef>;

    fn next(&mut self) -> Option<Self::Item> {
        let oid = match self.walk.as_mut()?.next()? {
            Ok(oid) => oid,
            Err(e) => return Some(Err(e.into())),
        };

        Some(
            self.repo
                .find_commit(oid)
                .map_err(RepoError::from)
                .and_then(|commit| commit_ref(&commit)),
        )
    }
}

fn commit_ref(commit: &git2::Commit<'_>) -> Result<CommitRef> {
    let seconds = commit.committer().when().seconds();
    let timestamp = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        RepoError::repository(format!("commit {} has an invalid timestamp", commit.id()))
    })?;

    Ok(CommitRef {
        hash: commit.id().to_string(),
        timestamp,
    })
}

/// Exclusive owner of the working view
///
/// Every checkout, and every read that depends on it, happens while holding
/// the guard returned here; no two checkouts can interleave.
#[derive(Debug)]
pub struct CheckoutController {
    repo: Mutex<GitChartRepo>,
}

impl CheckoutController {
    pub fn new(repo: GitChartRepo) -> Self {
        Self {
            repo: Mutex::new(repo),
        }
    }

    /// Block until the working view is free
    pub fn lock(&self) -> MutexGuard<'_, GitChartRepo> {
        self.repo.lock()
    }

    /// Wait at most `timeout` for the working view
    pub fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, GitChartRepo>> {
        self.repo.try_lock_for(timeout)
    }
}
