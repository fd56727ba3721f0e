//! Constants for the download module (timeouts, buffer sizes).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large archives).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default transfer chunk size in bytes.
///
/// Each chunk is written and reported as one progress step; the optimal value
/// is platform-dependent, so callers may override it.
pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: usize = 10_000;

/// Smallest accepted transfer chunk size.
pub const MIN_CHUNK_SIZE: usize = 1;

/// Largest accepted transfer chunk size (16 MiB).
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Default capacity of a progress channel created for a workflow.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;
