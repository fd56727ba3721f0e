//! CLI command handlers.

mod checksum;
mod extract;
mod probe;
mod remove;
mod update;

pub use checksum::{run_digest_command, run_verify_command};
pub use extract::run_extract_command;
pub use probe::run_probe_command;
pub use remove::run_remove_command;
pub use update::run_update_command;
