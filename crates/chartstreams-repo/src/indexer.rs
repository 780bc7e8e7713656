//! History indexing
//!
//! Every commit reachable from the branch tip is checked out in turn and the
//! charts found under the base directory are recorded against the earliest
//! commit that carries them.

use chartstreams_core::{ChartMetadata, CoreError, WorkTree, load_chart_metadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{MetadataPolicy, StreamConfig};
use crate::error::{RepoError, Result};
use crate::git::{CommitRef, GitChartRepo};
use crate::index::{Catalog, CatalogEntry};

/// Identity of a chart version
///
/// Field order gives the catalog order: name, then version, byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl From<&ChartMetadata> for PackageKey {
    fn from(metadata: &ChartMetadata) -> Self {
        Self::new(metadata.name.clone(), metadata.version.clone())
    }
}

/// Where and when a chart version was found
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChart {
    /// Commit that introduced the version
    pub commit: CommitRef,
    /// Chart directory, relative to the repository root, at that commit
    pub path: PathBuf,
    /// Metadata parsed at that commit
    pub metadata: ChartMetadata,
}

/// Lookup table from chart version to its introducing commit
#[derive(Debug, Clone, Default)]
pub struct VersionIndex {
    charts: BTreeMap<PackageKey, IndexedChart>,
}

impl VersionIndex {
    /// Record a sighting; returns true when the entry was inserted or replaced
    pub fn record(&mut self, key: PackageKey, candidate: IndexedChart) -> bool {
        match self.charts.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
                true
            }
            Entry::Occupied(mut slot) => {
                if candidate.commit.supersedes(&slot.get().commit) {
                    slot.insert(candidate);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn get(&self, key: &PackageKey) -> Option<&IndexedChart> {
        self.charts.get(key)
    }

    pub fn contains(&self, key: &PackageKey) -> bool {
        self.charts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&PackageKey, &IndexedChart)> {
        self.charts.iter()
    }

    /// Derive the public catalog
    pub fn to_catalog(&self, url_prefix: &str) -> Catalog {
        Catalog::new(
            self.charts
                .values()
                .map(|chart| CatalogEntry::from_chart(&chart.metadata, &chart.commit, url_prefix))
                .collect(),
        )
    }
}

/// Result of one full history walk
#[derive(Debug, Clone)]
pub struct ChartIndex {
    pub versions: VersionIndex,
    pub catalog: Arc<Catalog>,
    /// Number of commits visited
    pub commits: usize,
}

/// Walks repository history and builds a [`ChartIndex`]
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    base: PathBuf,
    policy: MetadataPolicy,
    url_prefix: String,
}

impl IndexBuilder {
    /// Index charts found directly beneath `base`
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            policy: MetadataPolicy::default(),
            url_prefix: String::new(),
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(&config.relative_dir)
            .policy(config.metadata_policy)
            .url_prefix(&config.url_prefix)
    }

    pub fn policy(mut self, policy: MetadataPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Walk the full history of `repo`
    ///
    /// The caller must hold the checkout lock for the whole walk. Any
    /// repository error, or a malformed chart under the strict policy,
    /// aborts the build.
    pub fn build(&self, repo: &GitChartRepo) -> Result<ChartIndex> {
        let started = Instant::now();
        let mut versions = VersionIndex::default();
        let mut commits = 0;

        for commit in repo.all_commits()? {
            let commit = commit?;
            commits += 1;

            repo.checkout(&commit.hash)?;
            self.scan(repo, &commit, &mut versions)?;
        }

        let catalog = Arc::new(versions.to_catalog(&self.url_prefix));

        info!(
            commits,
            charts = catalog.names().len(),
            versions = versions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chart index built"
        );

        Ok(ChartIndex {
            versions,
            catalog,
            commits,
        })
    }

    /// Record the charts present in the current working view
    fn scan<T: WorkTree + ?Sized>(
        &self,
        tree: &T,
        commit: &CommitRef,
        versions: &mut VersionIndex,
    ) -> Result<()> {
        if !tree.is_dir(&self.base) {
            trace!(commit = %commit.short_hash(), base = %self.base.display(), "no base directory");
            return Ok(());
        }

        let candidates = tree.read_dir(&self.base).map_err(|e| {
            RepoError::repository(format!(
                "cannot list {} at commit {}: {}",
                self.base.display(),
                commit.hash,
                e
            ))
        })?;

        let mut found = 0;
        for name in candidates {
            let path = self.base.join(&name);
            let Some(metadata) = self.extract(tree, &path, commit)? else {
                continue;
            };
            found += 1;

            let key = PackageKey::from(&metadata);
            if !versions.contains(&key) && semver::Version::parse(&key.version).is_err() {
                warn!(
                    chart = %key.name,
                    version = %key.version,
                    path = %path.display(),
                    "chart version is not valid SemVer"
                );
            }

            versions.record(
                key,
                IndexedChart {
                    commit: commit.clone(),
                    path,
                    metadata,
                },
            );
        }

        debug!(commit = %commit.short_hash(), charts = found, "scanned commit");
        Ok(())
    }

    fn extract<T: WorkTree + ?Sized>(
        &self,
        tree: &T,
        path: &Path,
        commit: &CommitRef,
    ) -> Result<Option<ChartMetadata>> {
        match load_chart_metadata(tree, path) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_a_package() => Ok(None),
            Err(CoreError::InvalidChart { path, message }) if self.policy == MetadataPolicy::Skip => {
                warn!(
                    commit = %commit.short_hash(),
                    path = %path,
                    error = %message,
                    "skipping chart with invalid metadata"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
