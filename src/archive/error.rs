//! Error types for archive extraction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while listing or extracting a zip archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive file could not be opened.
    #[error("cannot open archive {path}: {source}")]
    Open {
        /// Archive path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The archive's structure could not be read.
    #[error("malformed archive {path}: {source}")]
    Malformed {
        /// Archive path.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry name resolves outside the destination root.
    #[error("unsafe entry path {entry:?}: {reason}")]
    UnsafePath {
        /// Raw entry name as stored in the archive.
        entry: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// An entry is a symbolic link.
    #[error("symbolic link entry {entry:?} is not allowed")]
    SymlinkEntry {
        /// Raw entry name as stored in the archive.
        entry: String,
    },

    /// An entry's compressed data could not be decoded.
    #[error("cannot read entry {entry:?}: {source}")]
    EntryRead {
        /// Raw entry name as stored in the archive.
        entry: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A file or directory could not be written under the destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A staged extraction needs a named destination to place siblings next to.
    #[error("cannot stage extraction into {path}: destination has no directory name")]
    UnnamedDestination {
        /// Destination as given.
        path: PathBuf,
    },

    /// The destination could not be cleared before extraction.
    #[error("cannot clear destination {path}: {failed} path(s) could not be removed")]
    CleanTarget {
        /// Destination root.
        path: PathBuf,
        /// Number of removal failures.
        failed: usize,
    },

    /// Extraction stopped between entries because cancellation was requested.
    #[error("extraction cancelled after {entries_done} entries")]
    Cancelled {
        /// Entries fully processed before cancellation was observed.
        entries_done: usize,
    },
}

impl ExtractError {
    /// Creates an IO error for a destination path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a malformed-archive error.
    pub fn malformed(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Malformed {
            path: path.into(),
            source,
        }
    }

    /// Creates an unsafe-path error.
    pub fn unsafe_path(entry: impl Into<String>, reason: &'static str) -> Self {
        Self::UnsafePath {
            entry: entry.into(),
            reason,
        }
    }

    /// Returns true for path-escape and symlink rejections.
    #[must_use]
    pub fn is_unsafe_entry(&self) -> bool {
        matches!(self, Self::UnsafePath { .. } | Self::SymlinkEntry { .. })
    }
}
