//! `updater remove`: delete a file or directory tree.

use std::path::Path;

use tracing::warn;
use updater_core::remove::{remove_best_effort, remove_recursive};

use crate::ProcessExit;

pub fn run_remove_command(path: &Path, best_effort: bool) -> ProcessExit {
    if !best_effort {
        return if remove_recursive(path) {
            println!("removed {}", path.display());
            ProcessExit::Success
        } else {
            eprintln!("Failed to remove {}", path.display());
            ProcessExit::Failure
        };
    }

    let report = remove_best_effort(path);
    for failure in &report.failures {
        warn!(path = %failure.path.display(), error = %failure.source, "Could not remove");
    }
    println!(
        "removed {} entries, {} failures",
        report.removed,
        report.failures.len()
    );
    if report.is_success() {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    }
}
