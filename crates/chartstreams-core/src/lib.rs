//! chartstreams Core - chart types shared by the indexer, the materializer and the CLI
//!
//! This crate provides the foundational pieces used throughout chartstreams:
//! - `ChartMetadata`: The declared identity of a chart (`Chart.yaml`)
//! - `WorkTree`: Read-only access to a directory tree on disk
//! - `archive`: Reproducible `.tgz` packaging of a chart directory

pub mod archive;
pub mod chart;
pub mod error;
pub mod tree;

pub use archive::{
    ArchiveEntry, EntryKind, PackEntry, create_archive, default_archive_name, list_archive,
    pack_directory, pack_entries, read_file_from_archive,
};
pub use chart::{CHART_FILE, ChartMetadata, Maintainer, load_chart_metadata};
pub use error::{CoreError, Result};
pub use tree::{LocalTree, WorkTree};
