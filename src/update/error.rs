//! Workflow errors and the failure taxonomy callers act on.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::ExtractError;
use crate::checksum::{ChecksumAlgorithm, ChecksumError};
use crate::download::DownloadError;

/// Failure category surfaced in [`UpdateState::Failed`](super::UpdateState::Failed).
///
/// Callers use the kind to decide whether to retry, re-download or alert
/// the user; the [`UpdateError`] carries the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// DNS, connection, timeout or HTTP failure during probe or transfer.
    Network,
    /// Local filesystem failure (disk full, permission denied).
    Io,
    /// The downloaded file's digest differs from the expected one.
    ChecksumMismatch,
    /// Malformed archive, unsafe entry path or write failure mid-extraction.
    Extraction,
    /// Cooperative cancellation was requested.
    Cancelled,
    /// Another workflow already targets the same destination.
    Busy,
}

impl ErrorKind {
    /// Stable lowercase name, as used in logs and JSON output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Io => "io",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::Extraction => "extraction",
            Self::Cancelled => "cancelled",
            Self::Busy => "busy",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end an update workflow.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The size probe failed.
    #[error("size probe failed: {source}")]
    Probe {
        /// The underlying download error.
        #[source]
        source: DownloadError,
    },

    /// The transfer failed.
    #[error("download failed: {source}")]
    Download {
        /// The underlying download error.
        #[source]
        source: DownloadError,
    },

    /// The downloaded file could not be hashed.
    #[error("checksum could not be computed: {source}")]
    Checksum {
        /// The underlying checksum error.
        #[source]
        source: ChecksumError,
    },

    /// The downloaded file's digest differs from the expected one.
    #[error("{algorithm} checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Downloaded file.
        path: PathBuf,
        /// Algorithm used for both digests.
        algorithm: ChecksumAlgorithm,
        /// Digest the caller supplied.
        expected: String,
        /// Digest of the downloaded bytes.
        actual: String,
    },

    /// The archive could not be extracted.
    #[error("extraction failed: {source}")]
    Extract {
        /// The underlying extraction error.
        #[source]
        source: ExtractError,
    },

    /// Cancellation was observed at a stage boundary.
    #[error("update cancelled while {stage}")]
    Cancelled {
        /// Stage that had just been entered.
        stage: &'static str,
    },

    /// Another workflow already targets this destination.
    #[error("an update into {target} is already in progress")]
    Busy {
        /// Destination directory.
        target: PathBuf,
    },

    /// A blocking worker task panicked or was aborted.
    #[error("worker task for {stage} failed: {source}")]
    Worker {
        /// Stage the worker was running.
        stage: &'static str,
        /// The underlying join error.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl UpdateError {
    /// Maps this error onto the failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Probe { source } | Self::Download { source } => download_kind(source),
            Self::Checksum { .. } | Self::Worker { .. } => ErrorKind::Io,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Extract { source } => match source {
                ExtractError::Cancelled { .. } => ErrorKind::Cancelled,
                _ => ErrorKind::Extraction,
            },
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Busy { .. } => ErrorKind::Busy,
        }
    }

    /// HTTP status of a failed probe or transfer, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Probe { source } | Self::Download { source } => source.status(),
            _ => None,
        }
    }
}

fn download_kind(error: &DownloadError) -> ErrorKind {
    match error {
        DownloadError::Io { .. } => ErrorKind::Io,
        DownloadError::Cancelled { .. } => ErrorKind::Cancelled,
        // A short or long body is a transport failure; a fresh attempt may succeed.
        DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::NotFound { .. }
        | DownloadError::HttpStatus { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::Integrity { .. }
        | DownloadError::ClientBuild { .. }
        | DownloadError::InvalidChunkSize { .. } => ErrorKind::Network,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_errors_map_to_network_or_io() {
        let http = UpdateError::Download {
            source: DownloadError::http_status("https://example.com/c.zip", 503),
        };
        assert_eq!(http.kind(), ErrorKind::Network);
        assert_eq!(http.http_status(), Some(503));

        let truncated = UpdateError::Download {
            source: DownloadError::integrity("/tmp/c.zip", 100, 60),
        };
        assert_eq!(truncated.kind(), ErrorKind::Network);

        let disk = UpdateError::Download {
            source: DownloadError::io(
                "/tmp/c.zip",
                std::io::Error::new(std::io::ErrorKind::StorageFull, "full"),
            ),
        };
        assert_eq!(disk.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_cancellation_maps_to_cancelled_from_every_stage() {
        let download = UpdateError::Download {
            source: DownloadError::cancelled("https://example.com/c.zip", 10),
        };
        let extract = UpdateError::Extract {
            source: ExtractError::Cancelled { entries_done: 1 },
        };
        let between = UpdateError::Cancelled { stage: "extracting" };
        for error in [download, extract, between] {
            assert_eq!(error.kind(), ErrorKind::Cancelled, "{error}");
        }
    }

    #[test]
    fn test_extraction_and_checksum_kinds() {
        let unsafe_entry = UpdateError::Extract {
            source: ExtractError::unsafe_path("../x", "escapes destination"),
        };
        assert_eq!(unsafe_entry.kind(), ErrorKind::Extraction);

        let mismatch = UpdateError::ChecksumMismatch {
            path: PathBuf::from("/tmp/c.zip"),
            algorithm: ChecksumAlgorithm::Sha512,
            expected: "deadbeef".to_string(),
            actual: "cafebabe".to_string(),
        };
        assert_eq!(mismatch.kind(), ErrorKind::ChecksumMismatch);
        assert!(mismatch.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::ChecksumMismatch.to_string(), "checksum_mismatch");
        assert_eq!(
            serde_json::to_string(&ErrorKind::ChecksumMismatch).unwrap_or_default(),
            "\"checksum_mismatch\""
        );
    }
}
