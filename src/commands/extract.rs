//! `updater extract`: run the extractor on a local archive.

use anyhow::{Context, Result};
use updater_core::archive::{extract_with, list_entries};
use updater_core::{CancelFlag, ExtractOptions, UpdateSettings};

use crate::ProcessExit;
use crate::cli::ExtractArgs;

pub async fn run_extract_command(
    args: &ExtractArgs,
    settings: &UpdateSettings,
) -> Result<ProcessExit> {
    if args.list {
        let entries = list_entries(&args.archive)
            .with_context(|| format!("Failed to list '{}'", args.archive.display()))?;
        for entry in entries {
            let kind = if entry.is_dir { "dir " } else { "file" };
            println!("{kind} {:>12} {}", entry.uncompressed_size, entry.path);
        }
        return Ok(ProcessExit::Success);
    }

    let options = ExtractOptions {
        buffer_size: settings.extract_buffer_size,
        staging: args.staging,
        clean_target: args.clean,
    };
    let cancel = CancelFlag::new();
    let interrupt_flag = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_flag.cancel();
        }
    });

    let archive = args.archive.clone();
    let dest = args.dest.clone();
    let result =
        tokio::task::spawn_blocking(move || extract_with(&archive, &dest, &options, &cancel))
            .await
            .context("Extraction worker failed")?;
    interrupt.abort();

    let summary = result.with_context(|| {
        format!(
            "Failed to extract '{}' into '{}'",
            args.archive.display(),
            args.dest.display()
        )
    })?;

    println!(
        "extracted {} files, {} directories, {} bytes",
        summary.files, summary.directories, summary.bytes
    );
    Ok(ProcessExit::Success)
}
