//! Streaming HTTP downloads with per-chunk progress.
//!
//! This module fetches a remote resource into a local file without holding
//! the payload in memory.
//!
//! # Features
//!
//! - Metadata-only size probe (`HEAD`)
//! - Fixed-size chunking independent of network framing
//! - Non-blocking progress sinks (closure, bounded queue, latest-value)
//! - Truncation detection against the expected total
//! - Cooperative cancellation between chunks
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use updater_core::download::{DownloadTask, HttpClient, ProgressReport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let task = DownloadTask::new("https://example.com/client.zip", "./client.zip")
//!     .with_sink(Arc::new(|report: ProgressReport| {
//!         println!("{:.0}%", report.fraction * 100.0);
//!     }));
//! client.download(&task).await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod progress;

pub use client::{DownloadFileResult, DownloadTask, HttpClient};
pub use error::DownloadError;
pub use progress::{
    ChannelSink, NoProgress, ProgressReport, ProgressSink, SharedProgressSink, WatchSink,
};

pub(crate) use progress::SinkDebug;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
