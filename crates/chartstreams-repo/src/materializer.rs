//! On-demand chart packaging
//!
//! A requested version is resolved through the [`VersionIndex`], its
//! introducing commit is checked out under the checkout lock and the chart
//! directory is packed into a reproducible `.tgz`. Archive content comes
//! from the commit's tree objects, byte for byte as committed.

use chartstreams_core::{ChartMetadata, default_archive_name, load_chart_metadata, pack_entries};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{RepoError, Result};
use crate::git::{CheckoutController, CommitRef};
use crate::indexer::{PackageKey, VersionIndex};

/// Point in time after which a materialization gives up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.timeout
    }

    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(self.exceeded())
        } else {
            Ok(())
        }
    }

    fn exceeded(&self) -> RepoError {
        RepoError::DeadlineExceeded {
            millis: self.timeout.as_millis() as u64,
        }
    }
}

/// Archive digests computed so far, one per chart version
#[derive(Debug, Default)]
pub struct DigestCache {
    digests: Mutex<HashMap<PackageKey, String>>,
}

impl DigestCache {
    pub fn get(&self, key: &PackageKey) -> Option<String> {
        self.digests.lock().get(key).cloned()
    }

    /// Return the cached digest for `key`, hashing `archive` on first use
    pub fn get_or_compute(&self, key: &PackageKey, archive: &[u8]) -> String {
        if let Some(digest) = self.get(key) {
            return digest;
        }
        let digest = archive_digest(archive);
        self.digests.lock().insert(key.clone(), digest.clone());
        digest
    }

    pub fn len(&self) -> usize {
        self.digests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.lock().is_empty()
    }

    pub fn clear(&self) {
        self.digests.lock().clear();
    }
}

/// `sha256:<hex>` of an archive
pub fn archive_digest(archive: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(archive)))
}

/// A packaged chart version
#[derive(Debug, Clone)]
pub struct MaterializedChart {
    /// Metadata read from the checked-out tree
    pub metadata: ChartMetadata,
    /// Commit the archive was built from
    pub commit: CommitRef,
    /// gzip-compressed tar, entries prefixed with the chart name
    pub archive: Vec<u8>,
    pub digest: String,
}

impl MaterializedChart {
    /// `<name>-<version>.tgz`
    pub fn file_name(&self) -> String {
        default_archive_name(&self.metadata)
    }
}

/// Packages indexed chart versions from the shared working view
pub struct Materializer<'a> {
    controller: &'a CheckoutController,
    versions: &'a VersionIndex,
    digests: &'a DigestCache,
}

impl<'a> Materializer<'a> {
    pub fn new(
        controller: &'a CheckoutController,
        versions: &'a VersionIndex,
        digests: &'a DigestCache,
    ) -> Self {
        Self {
            controller,
            versions,
            digests,
        }
    }

    /// Package `name` at `version` from the commit that introduced it
    pub fn materialize(
        &self,
        name: &str,
        version: &str,
        deadline: Deadline,
    ) -> Result<MaterializedChart> {
        let key = PackageKey::new(name, version);
        let chart = self
            .versions
            .get(&key)
            .ok_or_else(|| RepoError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })?;

        let waiting = Instant::now();
        let repo = self
            .controller
            .try_lock_for(deadline.remaining())
            .ok_or_else(|| deadline.exceeded())?;
        debug!(
            chart = %name,
            version = %version,
            waited_ms = waiting.elapsed().as_millis() as u64,
            "acquired working view"
        );

        repo.checkout(&chart.commit.hash)?;
        deadline.check()?;

        let metadata = load_chart_metadata(&*repo, &chart.path)?;
        if PackageKey::from(&metadata) != key {
            return Err(RepoError::repository(format!(
                "index out of sync: {} at commit {} declares {}@{}",
                chart.path.display(),
                chart.commit.hash,
                metadata.name,
                metadata.version
            )));
        }

        let entries = repo.tree_entries(&chart.commit.hash, &chart.path)?;
        let archive = pack_entries(
            entries,
            &metadata.name,
            |entry| repo.blob_content(entry.source),
            |_| deadline.check(),
        )?;
        drop(repo);

        let digest = self.digests.get_or_compute(&key, &archive);
        debug!(
            chart = %name,
            version = %version,
            commit = %chart.commit.short_hash(),
            bytes = archive.len(),
            "materialized chart"
        );

        Ok(MaterializedChart {
            metadata,
            commit: chart.commit.clone(),
            archive,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::git::GitChartRepo;
    use crate::indexer::{IndexBuilder, IndexedChart};
    use crate::test_support::FixtureRepo;
    use chartstreams_core::{ChartMetadata, list_archive, read_file_from_archive};
    use std::path::PathBuf;

    struct Setup {
        _fixture: FixtureRepo,
        controller: CheckoutController,
        versions: VersionIndex,
        digests: DigestCache,
    }

    fn setup() -> Setup {
        let mut fixture = FixtureRepo::new();
        fixture.chart("nginx", "nginx", "1.0.0");
        fixture.commit("nginx 1.0.0");
        fixture.chart("nginx", "nginx", "1.1.0");
        fixture.write("stable/nginx/values.yaml", "replicas: 2\n");
        fixture.commit("nginx 1.1.0");

        let repo = GitChartRepo::clone_from(&StreamConfig::new(fixture.url())).unwrap();
        let index = IndexBuilder::new("stable").build(&repo).unwrap();

        Setup {
            _fixture: fixture,
            controller: CheckoutController::new(repo),
            versions: index.versions,
            digests: DigestCache::default(),
        }
    }

    fn long() -> Deadline {
        Deadline::after(Duration::from_secs(30))
    }

    #[test]
    fn test_materialize_older_version() {
        let s = setup();
        let materializer = Materializer::new(&s.controller, &s.versions, &s.digests);

        let chart = materializer.materialize("nginx", "1.0.0", long()).unwrap();
        assert_eq!(chart.metadata.version, "1.0.0");
        assert_eq!(chart.file_name(), "nginx-1.0.0.tgz");

        let content = read_file_from_archive(&chart.archive, "nginx/Chart.yaml").unwrap();
        let parsed = ChartMetadata::from_slice(&content, "nginx/Chart.yaml").unwrap();
        assert_eq!(parsed.version, "1.0.0");

        let paths: Vec<String> = list_archive(&chart.archive)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert!(!paths.contains(&"nginx/values.yaml".to_string()));
    }

    #[test]
    fn test_materialize_is_reproducible() {
        let s = setup();
        let materializer = Materializer::new(&s.controller, &s.versions, &s.digests);

        let first = materializer.materialize("nginx", "1.1.0", long()).unwrap();
        materializer.materialize("nginx", "1.0.0", long()).unwrap();
        let again = materializer.materialize("nginx", "1.1.0", long()).unwrap();

        assert_eq!(first.archive, again.archive);
        assert_eq!(first.digest, again.digest);
        assert_eq!(first.digest, archive_digest(&first.archive));
        assert!(first.digest.starts_with("sha256:"));
        assert_eq!(s.digests.len(), 2);
    }

    #[test]
    fn test_archive_ignores_checkout_filters() {
        let mut fixture = FixtureRepo::new();
        fixture.write(".gitattributes", "* text eol=crlf\n");
        fixture.chart("app", "app", "1.0.0");
        fixture.commit("app 1.0.0");

        let repo = GitChartRepo::clone_from(&StreamConfig::new(fixture.url())).unwrap();
        let index = IndexBuilder::new("stable").build(&repo).unwrap();
        let controller = CheckoutController::new(repo);
        let digests = DigestCache::default();

        let chart = Materializer::new(&controller, &index.versions, &digests)
            .materialize("app", "1.0.0", long())
            .unwrap();

        let template =
            read_file_from_archive(&chart.archive, "app/templates/configmap.yaml").unwrap();
        assert_eq!(template, b"# app 1.0.0\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_archive_keeps_executable_bit() {
        let mut fixture = FixtureRepo::new();
        fixture.chart("app", "app", "1.0.0");
        fixture.write_executable("stable/app/hook.sh", "#!/bin/sh\n");
        fixture.commit("app 1.0.0 with hook");

        let repo = GitChartRepo::clone_from(&StreamConfig::new(fixture.url())).unwrap();
        let index = IndexBuilder::new("stable").build(&repo).unwrap();
        let controller = CheckoutController::new(repo);
        let digests = DigestCache::default();

        let chart = Materializer::new(&controller, &index.versions, &digests)
            .materialize("app", "1.0.0", long())
            .unwrap();

        let modes: Vec<(String, u32)> = list_archive(&chart.archive)
            .unwrap()
            .into_iter()
            .map(|e| (e.path, e.mode))
            .collect();
        assert_eq!(
            modes,
            vec![
                ("app/Chart.yaml".to_string(), 0o644),
                ("app/hook.sh".to_string(), 0o755),
                ("app/templates/configmap.yaml".to_string(), 0o644),
            ]
        );
    }

    #[test]
    fn test_unknown_version() {
        let s = setup();
        let materializer = Materializer::new(&s.controller, &s.versions, &s.digests);

        let err = materializer.materialize("nginx", "9.9.9", long()).unwrap_err();
        assert!(err.is_not_found());
        let err = materializer.materialize("absent", "1.0.0", long()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_deadline_while_lock_is_held() {
        let s = setup();
        let materializer = Materializer::new(&s.controller, &s.versions, &s.digests);

        let _busy = s.controller.lock();
        let err = materializer
            .materialize("nginx", "1.0.0", Deadline::after(Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(err, RepoError::DeadlineExceeded { millis: 50 }));
    }

    #[test]
    fn test_expired_deadline() {
        let s = setup();
        let materializer = Materializer::new(&s.controller, &s.versions, &s.digests);

        let err = materializer
            .materialize("nginx", "1.0.0", Deadline::after(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, RepoError::DeadlineExceeded { .. }));

        // The view is left usable for the next request
        assert!(materializer.materialize("nginx", "1.0.0", long()).is_ok());
    }

    #[test]
    fn test_index_tree_mismatch() {
        let s = setup();
        let real = s.versions.get(&PackageKey::new("nginx", "1.0.0")).unwrap();

        let mut versions = VersionIndex::default();
        versions.record(
            PackageKey::new("nginx", "2.0.0"),
            IndexedChart {
                commit: real.commit.clone(),
                path: PathBuf::from("stable/nginx"),
                metadata: ChartMetadata {
                    name: "nginx".to_string(),
                    version: "2.0.0".to_string(),
                    ..Default::default()
                },
            },
        );

        let materializer = Materializer::new(&s.controller, &versions, &s.digests);
        let err = materializer.materialize("nginx", "2.0.0", long()).unwrap_err();
        assert!(matches!(err, RepoError::Repository { .. }));
    }

    #[test]
    fn test_deadline_remaining() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() <= Duration::from_secs(60));
        assert!(deadline.check().is_ok());
    }
}
