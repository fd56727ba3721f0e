//! CLI entry point for the updater tool.

use std::process::ExitCode;

use anyhow::Result;
use tracing::debug;

mod app;
mod app_config;
mod cli;
mod commands;

use app::{command_dispatcher, config_runtime, terminal};

pub(crate) use app::exit_handler::ProcessExit;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (cli, cli_sources) = config_runtime::parse_cli_with_sources();

    let loaded = app_config::load_default_file_config()?;
    let file_config = loaded.file_config();
    let cli = config_runtime::apply_config_defaults(cli, &cli_sources, &file_config);

    // Priority: explicit -v/-q > RUST_LOG > config verbosity > default (info)
    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(
        config_runtime::resolve_default_log_level(&cli),
        config_runtime::should_force_cli_log_level(&cli_sources),
        no_color,
    );

    debug!(
        ?cli,
        config_path = ?loaded.path,
        config_loaded = loaded.config.is_some(),
        config_verbosity = file_config.verbosity.map(app_config::VerbositySetting::as_str),
        "CLI arguments parsed"
    );

    let settings = config_runtime::resolve_settings(&cli, &file_config)?;
    let exit = command_dispatcher::dispatch(&cli, settings).await?;
    Ok(exit.into())
}
