//! Zip archive listing and extraction.
//!
//! Every entry name is resolved lexically and must land strictly inside the
//! destination root. Entries are written as they are read, so
//! a failure partway through leaves a partially populated destination unless
//! [`ExtractOptions::staging`] is set, in which case the archive is expanded
//! into a sibling directory and swapped into place only after every entry
//! succeeded.
//!
//! Extraction is blocking I/O; async callers run it on
//! `tokio::task::spawn_blocking`.

mod error;
mod path;

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

pub use error::ExtractError;

use crate::cancel::CancelFlag;
use crate::remove::{RemovePolicy, remove_best_effort, remove_tree};

/// Default extraction buffer: the most bytes of an entry held in memory at once.
pub const DEFAULT_EXTRACT_BUFFER_SIZE: usize = 8192;

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Read-only view of one record in the archive's central directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    /// Entry name as stored in the archive.
    pub path: String,
    /// True when the name ends with a separator.
    pub is_dir: bool,
    /// Decompressed size in bytes.
    pub uncompressed_size: u64,
    /// Stored size in bytes.
    pub compressed_size: u64,
    /// Unix mode bits, when the archive recorded them.
    pub unix_mode: Option<u32>,
}

impl ArchiveEntry {
    fn from_zip(file: &zip::read::ZipFile<'_>) -> Self {
        let path = file.name().to_owned();
        let is_dir = path.ends_with('/') || path.ends_with('\\');
        Self {
            path,
            is_dir,
            uncompressed_size: file.size(),
            compressed_size: file.compressed_size(),
            unix_mode: file.unix_mode(),
        }
    }

    /// Returns true when the entry records a symbolic link.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.unix_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK)
    }
}

/// Extraction tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Copy buffer size in bytes.
    pub buffer_size: usize,
    /// Expand into a sibling directory and swap it in on success.
    pub staging: bool,
    /// Remove the destination tree before a non-staged extraction.
    pub clean_target: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_EXTRACT_BUFFER_SIZE,
            staging: false,
            clean_target: false,
        }
    }
}

/// Totals for a completed extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExtractSummary {
    /// Regular files written.
    pub files: usize,
    /// Directory entries created.
    pub directories: usize,
    /// Decompressed bytes written.
    pub bytes: u64,
}

/// Lists every entry in the archive's central directory without extracting.
///
/// # Errors
///
/// Returns [`ExtractError::Open`] or [`ExtractError::Malformed`] when the
/// archive cannot be read.
#[instrument(fields(archive = %archive.display()))]
pub fn list_entries(archive: &Path) -> Result<Vec<ArchiveEntry>, ExtractError> {
    let mut zip = open_archive(archive)?;
    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let file = zip
            .by_index_raw(index)
            .map_err(|e| ExtractError::malformed(archive, e))?;
        entries.push(ArchiveEntry::from_zip(&file));
    }
    Ok(entries)
}

/// Extracts `archive` into `destination` with default options.
///
/// # Errors
///
/// See [`extract_with`].
pub fn extract(archive: &Path, destination: &Path) -> Result<ExtractSummary, ExtractError> {
    extract_with(archive, destination, &ExtractOptions::default(), &CancelFlag::new())
}

/// Extracts `archive` into `destination`.
///
/// # Errors
///
/// - [`ExtractError::Open`] / [`ExtractError::Malformed`] for unreadable archives
/// - [`ExtractError::UnsafePath`] / [`ExtractError::SymlinkEntry`] for entries
///   that could write outside `destination`; nothing is written for them
/// - [`ExtractError::EntryRead`] when entry data cannot be decompressed
/// - [`ExtractError::Io`] when the destination cannot be written
/// - [`ExtractError::CleanTarget`] when `clean_target` could not clear it
/// - [`ExtractError::UnnamedDestination`] when staging into `.`, `/` or `foo/..`
/// - [`ExtractError::Cancelled`] when `cancel` is observed between entries
#[instrument(skip(options, cancel), fields(archive = %archive.display(), destination = %destination.display()))]
pub fn extract_with(
    archive: &Path,
    destination: &Path,
    options: &ExtractOptions,
    cancel: &CancelFlag,
) -> Result<ExtractSummary, ExtractError> {
    let summary = if options.staging {
        extract_staged(archive, destination, options, cancel)?
    } else {
        if options.clean_target {
            clean_destination(destination)?;
        }
        extract_into(archive, destination, options, cancel)?
    };

    info!(
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        "extraction complete"
    );
    Ok(summary)
}

fn open_archive(archive: &Path) -> Result<zip::ZipArchive<BufReader<File>>, ExtractError> {
    let file = File::open(archive).map_err(|source| ExtractError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    zip::ZipArchive::new(BufReader::new(file)).map_err(|e| ExtractError::malformed(archive, e))
}

fn clean_destination(destination: &Path) -> Result<(), ExtractError> {
    let report = remove_tree(destination, RemovePolicy::StopOnFirstError);
    if report.is_success() {
        Ok(())
    } else {
        Err(ExtractError::CleanTarget {
            path: destination.to_path_buf(),
            failed: report.failures.len(),
        })
    }
}

fn extract_into(
    archive: &Path,
    root: &Path,
    options: &ExtractOptions,
    cancel: &CancelFlag,
) -> Result<ExtractSummary, ExtractError> {
    let mut zip = open_archive(archive)?;
    fs::create_dir_all(root).map_err(|e| ExtractError::io(root, e))?;

    let mut summary = ExtractSummary::default();
    let mut buffer = vec![0u8; options.buffer_size.max(1)];

    for index in 0..zip.len() {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled {
                entries_done: index,
            });
        }

        let mut file = zip
            .by_index(index)
            .map_err(|e| ExtractError::malformed(archive, e))?;
        let entry = ArchiveEntry::from_zip(&file);
        debug!(
            name = %entry.path,
            size = entry.uncompressed_size,
            compressed_size = entry.compressed_size,
            "entry"
        );

        if entry.is_symlink() {
            return Err(ExtractError::SymlinkEntry { entry: entry.path });
        }
        let relative = path::resolve_entry_path(&entry.path)?;
        path::ensure_no_symlink_ancestors(root, &relative, &entry.path)?;
        let target = root.join(&relative);

        if entry.is_dir {
            fs::create_dir_all(&target).map_err(|e| ExtractError::io(&target, e))?;
            summary.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| ExtractError::io(&target, e))?;
        let written = copy_entry(&mut file, &mut out, &mut buffer, &entry.path, &target)?;
        restore_permissions(&target, entry.unix_mode)?;

        summary.files += 1;
        summary.bytes += written;
    }

    Ok(summary)
}

fn copy_entry<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut [u8],
    entry: &str,
    target: &Path,
) -> Result<u64, ExtractError> {
    let mut written = 0u64;
    loop {
        let read = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(ExtractError::EntryRead {
                    entry: entry.to_owned(),
                    source,
                });
            }
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|e| ExtractError::io(target, e))?;
        written += read as u64;
    }
    writer.flush().map_err(|e| ExtractError::io(target, e))?;
    Ok(written)
}

#[cfg(unix)]
fn restore_permissions(target: &Path, mode: Option<u32>) -> Result<(), ExtractError> {
    use std::os::unix::fs::PermissionsExt;

    let Some(bits) = mode.map(|m| m & 0o7777).filter(|bits| *bits != 0) else {
        return Ok(());
    };
    fs::set_permissions(target, fs::Permissions::from_mode(bits))
        .map_err(|e| ExtractError::io(target, e))
}

#[cfg(not(unix))]
fn restore_permissions(_target: &Path, _mode: Option<u32>) -> Result<(), ExtractError> {
    Ok(())
}

/// `None` for destinations without a final name, such as `.`, `/` or `foo/..`.
fn sibling_path(destination: &Path, suffix: &str) -> Option<PathBuf> {
    let mut name = destination.file_name()?.to_owned();
    name.push(suffix);
    Some(destination.with_file_name(name))
}

fn extract_staged(
    archive: &Path,
    destination: &Path,
    options: &ExtractOptions,
    cancel: &CancelFlag,
) -> Result<ExtractSummary, ExtractError> {
    let (Some(staging), Some(previous)) = (
        sibling_path(destination, ".staging"),
        sibling_path(destination, ".previous"),
    ) else {
        return Err(ExtractError::UnnamedDestination {
            path: destination.to_path_buf(),
        });
    };
    discard(&staging);

    let summary = match extract_into(archive, &staging, options, cancel) {
        Ok(summary) => summary,
        Err(e) => {
            discard(&staging);
            return Err(e);
        }
    };

    let had_destination = fs::symlink_metadata(destination).is_ok();
    if had_destination {
        discard(&previous);
        if let Err(e) = fs::rename(destination, &previous) {
            discard(&staging);
            return Err(ExtractError::io(destination, e));
        }
    }
    if let Err(e) = fs::rename(&staging, destination) {
        if had_destination && let Err(restore) = fs::rename(&previous, destination) {
            warn!(error = %restore, "could not restore previous destination");
        }
        discard(&staging);
        return Err(ExtractError::io(destination, e));
    }
    if had_destination {
        discard(&previous);
    }
    debug!(staging = %staging.display(), "staged extraction swapped into place");
    Ok(summary)
}

fn discard(path: &Path) {
    let report = remove_best_effort(path);
    for failure in &report.failures {
        warn!(path = %failure.path.display(), error = %failure.source, "cleanup failed");
    }
}
