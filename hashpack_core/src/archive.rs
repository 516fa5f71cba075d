//! Packaging a finished store into a single `.tar.zst` archive.

use crate::error::{Error, Result};
use crate::walk::walk_files;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Default modification time stamped on every entry (2024-01-01 00:00:00 UTC).
pub const DEFAULT_MTIME: u64 = 1704067200;

/// Conventional extension for archives produced here.
pub const ARCHIVE_EXTENSION: &str = "tar.zst";

/// Knobs for archive creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Modification time written to every entry header.
    pub mtime: u64,
    /// zstd compression level.
    pub level: i32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            mtime: DEFAULT_MTIME,
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Counters for a written archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Number of file entries.
    pub entries: usize,
    /// Uncompressed bytes of file content.
    pub bytes: u64,
}

/// Archive every regular file under `root` into `writer`.
///
/// Entries are named by their `/`-separated path relative to `root`, sorted,
/// with normalized mode and mtime, so the same tree always produces the same
/// bytes. Directories get no entries of their own. Returns the writer once the
/// compressed stream is finished.
pub fn archive_to_writer<W: Write>(
    root: &Path,
    writer: W,
    options: &ArchiveOptions,
) -> Result<(W, ArchiveStats)> {
    let files = walk_files(root)?;

    let encoder = zstd::Encoder::new(writer, options.level)?;
    let mut archive = tar::Builder::new(encoder);
    let mut stats = ArchiveStats::default();

    for file in files {
        let input = fs::File::open(&file.path)?;
        let size = input.metadata()?.len();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(size);
        header.set_mtime(options.mtime);
        header.set_cksum();

        archive.append_data(&mut header, &file.relative, input)?;
        debug!(entry = %file.relative, bytes = size, "archived");

        stats.entries += 1;
        stats.bytes += size;
    }

    let encoder = archive.into_inner()?;
    let writer = encoder.finish()?;

    Ok((writer, stats))
}

/// Archive `root` into an in-memory buffer with default options.
pub fn archive(root: &Path) -> Result<Vec<u8>> {
    let (bytes, _) = archive_to_writer(root, Vec::new(), &ArchiveOptions::default())?;
    Ok(bytes)
}

/// Archive `root` into the file at `dest`, replacing it if present.
///
/// `dest` must lie outside `root`. On failure the partially written file is
/// left behind.
pub fn archive_to_file(root: &Path, dest: &Path, options: &ArchiveOptions) -> Result<ArchiveStats> {
    if is_inside(root, dest)? {
        return Err(Error::invalid_path(
            dest,
            format!("archive must not be written inside {}", root.display()),
        ));
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = fs::File::create(dest)?;
    let (mut writer, stats) = archive_to_writer(root, BufWriter::new(file), options)?;
    writer.flush()?;

    info!(
        path = %dest.display(),
        entries = stats.entries,
        bytes = stats.bytes,
        "archive written"
    );
    Ok(stats)
}

/// Whether `dest` would end up under `root` once both are resolved.
fn is_inside(root: &Path, dest: &Path) -> Result<bool> {
    let root = fs::canonicalize(root)?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    // The parent may not exist yet; resolve the deepest existing ancestor.
    let mut existing = parent.as_path();
    while !existing.exists() {
        match existing.parent() {
            Some(up) => existing = up,
            None => return Ok(false),
        }
    }
    let resolved = fs::canonicalize(existing)?;
    Ok(resolved.starts_with(&root))
}
