//! Error types for the download module.
//!
//! This module defines structured errors for size probes and streaming
//! transfers, each carrying the URL or path it concerns.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while probing or downloading a remote resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server reports that the resource does not exist (HTTP 404/410).
    #[error("resource not found: {url}")]
    NotFound {
        /// The URL that was not found.
        url: String,
    },

    /// HTTP error response other than not-found.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during the transfer (create file, write, flush).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or not HTTP(S).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The number of bytes received does not match the expected total.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// The transfer was cancelled between chunks.
    #[error("download of {url} cancelled after {bytes_transferred} bytes")]
    Cancelled {
        /// The URL being downloaded.
        url: String,
        /// Bytes written before cancellation was observed.
        bytes_transferred: u64,
    },

    /// The HTTP client could not be constructed from its configuration.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The configured chunk size is outside the accepted range.
    #[error("invalid chunk size {size}: must be between {min} and {max}")]
    InvalidChunkSize {
        /// Requested chunk size.
        size: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error, mapping 404/410 to [`NotFound`](Self::NotFound).
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        match status {
            404 | 410 => Self::NotFound { url: url.into() },
            _ => Self::HttpStatus {
                url: url.into(),
                status,
            },
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>, bytes_transferred: u64) -> Self {
        Self::Cancelled {
            url: url.into(),
            bytes_transferred,
        }
    }

    /// Returns true for failures on the local filesystem side of the transfer.
    #[must_use]
    pub fn is_local_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// HTTP status code carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// URL or path that the source error does not carry.
