//! CLI command routing: builds the core client and runs one subcommand.

use anyhow::{Context, Result};
use updater_core::{HttpClient, UpdateSettings, Updater};

use crate::ProcessExit;
use crate::cli::{Cli, Command};
use crate::commands;

pub(crate) async fn dispatch(cli: &Cli, settings: UpdateSettings) -> Result<ProcessExit> {
    match &cli.command {
        Command::Update(args) => {
            let updater = Updater::new(settings).context("Failed to build HTTP client")?;
            commands::run_update_command(&updater, args, cli.quiet).await
        }
        Command::Probe { url } => {
            let client =
                HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs)
                    .context("Failed to build HTTP client")?;
            commands::run_probe_command(&client, url).await
        }
        Command::Verify {
            file,
            checksum,
            algorithm,
        } => Ok(commands::run_verify_command(file, checksum, *algorithm)),
        Command::Digest { file, algorithm } => commands::run_digest_command(file, *algorithm),
        Command::Extract(args) => commands::run_extract_command(args, &settings).await,
        Command::Remove { path, best_effort } => {
            Ok(commands::run_remove_command(path, *best_effort))
        }
    }
}
