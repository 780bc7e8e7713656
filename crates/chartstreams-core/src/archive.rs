//! Reproducible chart archives
//!
//! Packages a chart directory into a `.tgz` whose bytes depend only on the
//! file contents, relative paths and executable bits. Entries are written in
//! byte-wise order of their relative path; timestamps and owners are fixed.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};

use crate::chart::ChartMetadata;
use crate::error::{CoreError, Result};
use crate::tree::WorkTree;

/// How an entry is written to the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file; executable files are stored with mode 0755, others 0644
    File { executable: bool },
    /// Symbolic link; the loaded content is the link target
    Symlink,
}

/// A file or symlink to pack, with the handle its content is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry<S> {
    /// `/`-separated path relative to the packed directory
    pub rel: String,
    pub kind: EntryKind,
    pub source: S,
}

/// Write `entries` into an in-memory `.tgz`
///
/// Entries are sorted byte-wise by relative path before writing. Entry paths
/// are `{prefix}/{rel}` (or just `rel` when `prefix` is empty). `load`
/// returns the bytes of a file or the target of a symlink. `before_entry`
/// runs before each entry and can abort packaging by returning an error.
pub fn pack_entries<S, L, F, E>(
    mut entries: Vec<PackEntry<S>>,
    prefix: &str,
    mut load: L,
    mut before_entry: F,
) -> std::result::Result<Vec<u8>, E>
where
    L: FnMut(&PackEntry<S>) -> std::result::Result<Vec<u8>, E>,
    F: FnMut(&str) -> std::result::Result<(), E>,
    E: From<CoreError>,
{
    entries.sort_by(|a, b| a.rel.cmp(&b.rel));

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in &entries {
        before_entry(&entry.rel)?;

        let archive_path = if prefix.is_empty() {
            entry.rel.clone()
        } else {
            format!("{}/{}", prefix, entry.rel)
        };
        let content = load(entry)?;

        match entry.kind {
            EntryKind::File { executable } => {
                let mode = if executable { 0o755 } else { 0o644 };
                add_bytes_to_archive(&mut builder, &archive_path, &content, mode)
                    .map_err(E::from)?;
            }
            EntryKind::Symlink => {
                let target = std::str::from_utf8(&content)
                    .map_err(|e| E::from(archive_error(&entry.rel, e)))?;
                add_link_to_archive(&mut builder, &archive_path, Path::new(target))
                    .map_err(E::from)?;
            }
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| E::from(archive_error("finish tar", e)))?;
    let bytes = encoder
        .finish()
        .map_err(|e| E::from(archive_error("finish gzip", e)))?;

    Ok(bytes)
}

/// Package the subtree at `dir` of a [`WorkTree`]
///
/// Content is read from disk as it is, so whatever wrote the tree (a Git
/// checkout with filters, for instance) shows in the archive.
pub fn pack_directory<T, F, E>(
    tree: &T,
    dir: &Path,
    prefix: &str,
    before_entry: F,
) -> std::result::Result<Vec<u8>, E>
where
    T: WorkTree + ?Sized,
    F: FnMut(&str) -> std::result::Result<(), E>,
    E: From<CoreError>,
{
    let entries = collect_entries(&tree.resolve(dir)).map_err(E::from)?;
    pack_entries(entries, prefix, |entry| load_from_disk(entry).map_err(E::from), before_entry)
}

/// Package the subtree at `dir` with no per-entry hook
pub fn create_archive<T: WorkTree + ?Sized>(tree: &T, dir: &Path, prefix: &str) -> Result<Vec<u8>> {
    pack_directory(tree, dir, prefix, |_| Ok::<(), CoreError>(()))
}

/// Walk `root` and return its files and symlinks
fn collect_entries(root: &Path) -> Result<Vec<PackEntry<PathBuf>>> {
    let mut entries = Vec::new();

    for entry in walkdir::WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| archive_error(root.display(), e))?;
        let file_type = entry.file_type();

        let kind = if file_type.is_file() {
            let metadata = entry
                .metadata()
                .map_err(|e| archive_error(entry.path().display(), e))?;
            EntryKind::File {
                executable: is_executable(&metadata),
            }
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            continue;
        };

        let mut parts = Vec::new();
        for component in entry
            .path()
            .strip_prefix(root)
            .map_err(|e| archive_error(entry.path().display(), e))?
            .components()
        {
            let part = component.as_os_str().to_str().ok_or_else(|| {
                archive_error(entry.path().display(), "file name is not valid UTF-8")
            })?;
            parts.push(part);
        }

        entries.push(PackEntry {
            rel: parts.join("/"),
            kind,
            source: entry.path().to_path_buf(),
        });
    }

    Ok(entries)
}

fn load_from_disk(entry: &PackEntry<PathBuf>) -> Result<Vec<u8>> {
    match entry.kind {
        EntryKind::File { .. } => {
            std::fs::read(&entry.source).map_err(|e| archive_error(&entry.rel, e))
        }
        EntryKind::Symlink => {
            let target = std::fs::read_link(&entry.source)
                .map_err(|e| archive_error(&entry.rel, e))?;
            target
                .into_os_string()
                .into_string()
                .map(String::into_bytes)
                .map_err(|_| archive_error(&entry.rel, "link target is not valid UTF-8"))
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

fn archive_error(context: impl Display, err: impl Display) -> CoreError {
    CoreError::Archive {
        message: format!("{}: {}", context, err),
    }
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
    mode: u32,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_cksum();

    builder
        .append_data(&mut header, archive_path, content)
        .map_err(|e| archive_error(archive_path, e))
}

fn add_link_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    target: &Path,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);

    builder
        .append_link(&mut header, archive_path, target)
        .map_err(|e| archive_error(archive_path, e))
}

/// Information about a file in an archive
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    /// Path within the archive
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Whether this is a symbolic link
    pub is_symlink: bool,
}

/// List the entries of an in-memory `.tgz`, in archive order
pub fn list_archive(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = Archive::new(GzDecoder::new(data));
    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        let size = entry.header().size()?;
        let mode = entry.header().mode()?;
        let is_symlink = entry.header().entry_type().is_symlink();

        entries.push(ArchiveEntry {
            path,
            size,
            mode,
            is_symlink,
        });
    }

    Ok(entries)
}

/// Read a specific file from an in-memory `.tgz`
pub fn read_file_from_archive(data: &[u8], file_path: &str) -> Result<Vec<u8>> {
    let mut archive = Archive::new(GzDecoder::new(data));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        if path == file_path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(CoreError::Archive {
        message: format!("File not found in archive: {}", file_path),
    })
}

/// Generate the default archive filename for a chart
#[must_use]
pub fn default_archive_name(metadata: &ChartMetadata) -> String {
    format!("{}-{}.tgz", metadata.name, metadata.version)
}
