//! Recursive removal of directory trees.
//!
//! Removal walks depth-first and unlinks children before their parent.
//! Already-removed descendants stay removed when a later step fails; there is
//! no rollback. Symbolic links are never followed: a link is unlinked as a
//! link, so a link pointing outside the tree cannot cause removal there.

use std::fs::{self, Metadata};
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

/// What to do after the first failed unlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovePolicy {
    /// Stop immediately and report failure.
    #[default]
    StopOnFirstError,
    /// Keep removing everything that can be removed, then report failure.
    Continue,
}

/// A path that could not be removed.
#[derive(Debug, Error)]
#[error("failed to remove {path}: {source}")]
pub struct RemoveError {
    /// Path whose removal failed.
    pub path: PathBuf,
    /// Underlying filesystem error.
    #[source]
    pub source: io::Error,
}

impl RemoveError {
    fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Outcome of a tree removal.
#[derive(Debug, Default)]
pub struct RemoveReport {
    /// Number of files, links and directories unlinked.
    pub removed: usize,
    /// Every failure encountered (at most one under `StopOnFirstError`).
    pub failures: Vec<RemoveError>,
}

impl RemoveReport {
    /// Returns true when nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Failure while copying one file over another.
#[derive(Debug, Error)]
#[error("failed to copy {from} to {to}: {source}")]
pub struct CopyError {
    /// Source file.
    pub from: PathBuf,
    /// Destination file.
    pub to: PathBuf,
    /// Underlying filesystem error.
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

/// Removes `path` and everything below it, stopping at the first failure.
///
/// Returns `true` when the tree is gone. A path that does not exist counts
/// as removed.
#[instrument(fields(path = %path.display()))]
pub fn remove_recursive(path: &Path) -> bool {
    remove_tree(path, RemovePolicy::StopOnFirstError).is_success()
}

/// Removes as much of `path` as possible, continuing past failures.
#[instrument(fields(path = %path.display()))]
pub fn remove_best_effort(path: &Path) -> RemoveReport {
    remove_tree(path, RemovePolicy::Continue)
}

/// Removes `path` (file, link or directory tree) under the given policy.
pub fn remove_tree(path: &Path, policy: RemovePolicy) -> RemoveReport {
    remove_tree_with(path, policy, &mut unlink)
}

fn unlink(path: &Path, kind: EntryKind) -> io::Result<()> {
    match kind {
        EntryKind::File => fs::remove_file(path),
        EntryKind::Dir => fs::remove_dir(path),
    }
}

fn remove_tree_with<F>(root: &Path, policy: RemovePolicy, unlink: &mut F) -> RemoveReport
where
    F: FnMut(&Path, EntryKind) -> io::Result<()>,
{
    let mut report = RemoveReport::default();
    match fs::symlink_metadata(root) {
        Ok(metadata) => {
            let _ = visit(root, &metadata, policy, unlink, &mut report);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %root.display(), "nothing to remove");
        }
        Err(e) => report.failures.push(RemoveError::new(root, e)),
    }
    debug!(
        path = %root.display(),
        removed = report.removed,
        failures = report.failures.len(),
        "removal finished"
    );
    report
}

fn visit<F>(
    path: &Path,
    metadata: &Metadata,
    policy: RemovePolicy,
    unlink: &mut F,
    report: &mut RemoveReport,
) -> ControlFlow<()>
where
    F: FnMut(&Path, EntryKind) -> io::Result<()>,
{
    // symlink_metadata: a link to a directory reports as a link, not a dir.
    if !metadata.is_dir() {
        return unlink_one(path, EntryKind::File, policy, unlink, report);
    }

    let failures_before = report.failures.len();
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => return record(path, e, policy, report),
    };
    for entry in entries {
        let child = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                record(path, e, policy, report)?;
                continue;
            }
        };
        match fs::symlink_metadata(&child) {
            Ok(child_metadata) => visit(&child, &child_metadata, policy, unlink, report)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => record(&child, e, policy, report)?,
        }
    }

    // A directory with surviving children cannot be removed; its children's
    // failures already explain why.
    if report.failures.len() > failures_before {
        return ControlFlow::Continue(());
    }
    unlink_one(path, EntryKind::Dir, policy, unlink, report)
}

fn unlink_one<F>(
    path: &Path,
    kind: EntryKind,
    policy: RemovePolicy,
    unlink: &mut F,
    report: &mut RemoveReport,
) -> ControlFlow<()>
where
    F: FnMut(&Path, EntryKind) -> io::Result<()>,
{
    match unlink(path, kind) {
        Ok(()) => {
            report.removed += 1;
            ControlFlow::Continue(())
        }
        Err(e) => record(path, e, policy, report),
    }
}

fn record(
    path: &Path,
    error: io::Error,
    policy: RemovePolicy,
    report: &mut RemoveReport,
) -> ControlFlow<()> {
    debug!(path = %path.display(), error = %error, "removal failed");
    report.failures.push(RemoveError::new(path, error));
    match policy {
        RemovePolicy::StopOnFirstError => ControlFlow::Break(()),
        RemovePolicy::Continue => ControlFlow::Continue(()),
    }
}

/// Copies `from` over `to`, replacing any existing file. Returns bytes copied.
///
/// # Errors
///
/// Returns [`CopyError`] when the source cannot be read or the target cannot
/// be written.
pub fn copy_overwrite(from: &Path, to: &Path) -> Result<u64, CopyError> {
    fs::copy(from, to).map_err(|source| CopyError {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}
