//! chartstreams Repository - a Helm chart repository served from Git history
//!
//! Every chart version that ever existed in a Git repository is published,
//! pinned to the earliest commit that carried it, and packaged on request:
//!
//! - **Indexing**: walk all commits, record each (name, version) once
//! - **Catalog**: a sorted, Helm-compatible `index.yaml`
//! - **Materialization**: check out the introducing commit and build a
//!   reproducible `.tgz` of the chart directory
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartstreams_repo::{ChartProvider, GitChartProvider, StreamConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = GitChartProvider::open(StreamConfig::new("https://github.com/helm/charts.git")).await?;
//! provider.initialize().await?;
//!
//! let index = provider.index_file()?.to_yaml()?;
//! let chart = provider.get_chart("nginx-ingress", "1.0.0").await?;
//! println!("{} bytes, {}", chart.archive.len(), chart.digest);
//! # Ok(())
//! # }
//! ```
//!
//! All checkouts share one working tree, so materializations are serialized.

pub mod config;
pub mod error;
pub mod git;
pub mod index;
pub mod indexer;
pub mod materializer;
pub mod provider;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
mod test_support;

// Re-exports for convenience
pub use config::{MetadataPolicy, StreamConfig};
pub use error::{RepoError, Result};
pub use git::{CheckoutController, CommitRef, CommitWalk, GitChartRepo};
pub use index::{Catalog, CatalogEntry, DIGEST_PLACEHOLDER, IndexFile};
pub use indexer::{ChartIndex, IndexBuilder, IndexedChart, PackageKey, VersionIndex};
pub use materializer::{
    Deadline, DigestCache, MaterializedChart, Materializer, archive_digest,
};
pub use provider::{ChartProvider, GitChartProvider};
