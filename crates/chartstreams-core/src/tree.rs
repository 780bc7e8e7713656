//! Read-only views over a directory tree on disk
//!
//! Both the Git working view and plain local directories expose their
//! content through [`WorkTree`], so chart detection and packaging do not
//! care where the files came from.

use std::io;
use std::path::{Path, PathBuf};

/// Directory name that is never listed as a tree entry
pub const GIT_DIR: &str = ".git";

/// A directory tree addressed by paths relative to its root
pub trait WorkTree {
    /// Absolute root of the tree
    fn root(&self) -> &Path;

    /// Resolve a relative path against the root
    fn resolve(&self, rel: &Path) -> PathBuf {
        self.root().join(rel)
    }

    /// Whether `rel` is a directory (symlinks are not followed)
    fn is_dir(&self, rel: &Path) -> bool {
        std::fs::symlink_metadata(self.resolve(rel))
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Whether `rel` is a regular file (symlinks are not followed)
    fn is_file(&self, rel: &Path) -> bool {
        std::fs::symlink_metadata(self.resolve(rel))
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// List entry names directly beneath `rel`, sorted byte-wise
    ///
    /// A name that is not valid UTF-8 fails the listing with
    /// [`io::ErrorKind::InvalidData`].
    fn read_dir(&self, rel: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.resolve(rel))? {
            let name = entry?.file_name().into_string().map_err(|raw| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry name {:?} in {} is not valid UTF-8", raw, rel.display()),
                )
            })?;
            if name != GIT_DIR {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read the full content of a file
    fn read_file(&self, rel: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(rel))
    }
}

/// A plain directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
}

impl LocalTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkTree for LocalTree {
    fn root(&self) -> &Path {
        &self.root
    }
}
