//! Chart provider facade
//!
//! [`ChartProvider`] is what transports (the HTTP server, the CLI) talk to.
//! [`GitChartProvider`] serves charts out of a Git repository's history.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::StreamConfig;
use crate::error::{RepoError, Result};
use crate::git::{CheckoutController, GitChartRepo};
use crate::index::Catalog;
use crate::indexer::{ChartIndex, IndexBuilder};
use crate::materializer::{Deadline, DigestCache, MaterializedChart, Materializer};

/// A source of chart versions
#[async_trait]
pub trait ChartProvider: Send + Sync {
    /// Build (or rebuild) the chart index
    async fn initialize(&self) -> Result<()>;

    /// Current catalog; [`RepoError::NotInitialized`] before the first build
    fn index_file(&self) -> Result<Arc<Catalog>>;

    /// Package one chart version
    async fn get_chart(&self, name: &str, version: &str) -> Result<MaterializedChart>;
}

/// Provider backed by the full history of a Git repository
#[derive(Debug, Clone)]
pub struct GitChartProvider {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: StreamConfig,
    controller: CheckoutController,
    state: RwLock<Option<Arc<ChartIndex>>>,
    digests: DigestCache,
}

impl GitChartProvider {
    /// Clone the configured repository; the index is built by [`ChartProvider::initialize`]
    pub async fn open(config: StreamConfig) -> Result<Self> {
        let repo = {
            let config = config.clone();
            tokio::task::spawn_blocking(move || GitChartRepo::clone_from(&config)).await??
        };
        Ok(Self::from_repo(repo, config))
    }

    /// Serve from an existing clone
    pub fn from_repo(repo: GitChartRepo, config: StreamConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                controller: CheckoutController::new(repo),
                state: RwLock::new(None),
                digests: DigestCache::default(),
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    /// Whether an index has been built
    pub fn is_initialized(&self) -> bool {
        self.inner.state.read().is_some()
    }

    /// The index snapshot currently served
    pub fn snapshot(&self) -> Result<Arc<ChartIndex>> {
        self.inner
            .state
            .read()
            .clone()
            .ok_or(RepoError::NotInitialized)
    }
}

#[async_trait]
impl ChartProvider for GitChartProvider {
    async fn initialize(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let index = tokio::task::spawn_blocking(move || {
            let repo = inner.controller.lock();
            IndexBuilder::from_config(&inner.config).build(&repo)
        })
        .await??;

        *self.inner.state.write() = Some(Arc::new(index));
        Ok(())
    }

    fn index_file(&self) -> Result<Arc<Catalog>> {
        Ok(Arc::clone(&self.snapshot()?.catalog))
    }

    async fn get_chart(&self, name: &str, version: &str) -> Result<MaterializedChart> {
        let deadline = Deadline::after(self.inner.config.materialize_timeout);
        let index = self.snapshot()?;
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        let version = version.to_string();

        tokio::task::spawn_blocking(move || {
            Materializer::new(&inner.controller, &index.versions, &inner.digests)
                .materialize(&name, &version, deadline)
        })
        .await?
    }
}
