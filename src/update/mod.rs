//! Update orchestration: probe, download, verify, extract.
//!
//! Each request runs as its own [`UpdateWorkflow`] instance with its own
//! temporary file, state channel and progress channel. Nothing is shared
//! between workflows except the HTTP client's connection pool.
//!
//! ```text
//! Idle → Probing → Downloading → Verifying → Extracting → Done
//!            └──────────┴────────────┴────────────┴──→ Failed(kind)
//! ```
//!
//! No stage is retried here; callers decide with
//! [`classify_error`](crate::retry::classify_error) and start a new instance.

mod error;
mod request;
mod state;
mod updater;
mod workflow;

pub use error::{ErrorKind, UpdateError};
pub use request::{DOWNLOAD_SUFFIX, UpdateRequest, UpdateSettings};
pub use state::UpdateState;
pub use updater::{UpdateHandle, Updater};
pub use workflow::UpdateWorkflow;
