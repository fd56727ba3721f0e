//! Updater Core Library
//!
//! This library provides the self-update core: fetching a release archive
//! with live progress, verifying it against a known digest, and expanding it
//! into a target directory without letting any entry escape that directory.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaf-first:
//! - [`checksum`] - SHA-2 file digests and fail-closed validation
//! - [`download`] - Streaming HTTP downloads with per-chunk progress
//! - [`archive`] - Zip listing and path-safe extraction
//! - [`remove`] - Depth-first tree removal with partial-failure reporting
//! - [`update`] - The probe → download → verify → extract workflow
//! - [`retry`] - Caller-side retry classification and backoff

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod cancel;
pub mod checksum;
pub mod download;
pub mod remove;
pub mod retry;
pub mod update;
mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use archive::{ArchiveEntry, ExtractError, ExtractOptions, ExtractSummary};
pub use cancel::CancelFlag;
pub use checksum::{ChecksumAlgorithm, ChecksumResult, ExpectedChecksum};
pub use download::{DownloadError, DownloadTask, HttpClient, ProgressReport, ProgressSink};
pub use remove::{RemovePolicy, RemoveReport, remove_recursive};
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use update::{
    ErrorKind, UpdateError, UpdateHandle, UpdateRequest, UpdateSettings, UpdateState, Updater,
    UpdateWorkflow,
};
