//! `updater verify` and `updater digest`.

use std::path::Path;

use anyhow::{Context, Result};
use updater_core::checksum::{digest_file, validate_with};
use updater_core::{ChecksumAlgorithm, ExpectedChecksum};

use crate::ProcessExit;

pub fn run_verify_command(
    file: &Path,
    checksum: &str,
    algorithm: Option<ChecksumAlgorithm>,
) -> ProcessExit {
    let expected = match algorithm {
        Some(algorithm) => ExpectedChecksum::new(algorithm, checksum),
        None => ExpectedChecksum::infer(checksum),
    };
    if validate_with(file, &expected) {
        println!("valid");
        ProcessExit::Success
    } else {
        println!("invalid");
        ProcessExit::Failure
    }
}

pub fn run_digest_command(file: &Path, algorithm: ChecksumAlgorithm) -> Result<ProcessExit> {
    let hex = digest_file(file, algorithm)
        .with_context(|| format!("Failed to hash '{}'", file.display()))?;
    println!("{hex}");
    Ok(ProcessExit::Success)
}
