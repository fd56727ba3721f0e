//! Merges config file defaults under command-line values.

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use updater_core::UpdateSettings;

use crate::app_config::{FileConfig, VerbositySetting};
use crate::cli::{Cli, Command};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
    pub(crate) staging: bool,
    pub(crate) max_retries: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Cli, CliValueSources) {
    let command = Cli::command();
    let matches = command.get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = value_sources(&matches);
    (cli, sources)
}

fn value_sources(matches: &ArgMatches) -> CliValueSources {
    let update = matches.subcommand_matches("update");
    CliValueSources {
        verbose: is_global_commandline_value(matches, "verbose"),
        quiet: is_global_commandline_value(matches, "quiet"),
        staging: update.is_some_and(|m| is_commandline_value(m, "staging")),
        max_retries: update.is_some_and(|m| is_commandline_value(m, "max_retries")),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

// Global flags may be given before or after the subcommand name.
fn is_global_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    is_commandline_value(matches, id)
        || matches
            .subcommand()
            .is_some_and(|(_, sub)| is_commandline_value(sub, id))
}

pub(crate) fn apply_config_defaults(
    mut cli: Cli,
    cli_sources: &CliValueSources,
    file_config: &FileConfig,
) -> Cli {
    if !cli_sources.verbose
        && !cli_sources.quiet
        && let Some(verbosity) = file_config.verbosity
    {
        apply_config_verbosity(&mut cli, verbosity);
    }

    if let Command::Update(args) = &mut cli.command {
        if !cli_sources.staging
            && !args.clean
            && let Some(staging) = file_config.staging
        {
            args.staging = staging;
        }

        if !cli_sources.max_retries
            && let Some(max_retries) = file_config.max_retries
        {
            args.max_retries = max_retries;
        }
    }

    cli
}

fn apply_config_verbosity(cli: &mut Cli, verbosity: VerbositySetting) {
    match verbosity {
        VerbositySetting::Default => {
            cli.quiet = false;
            cli.verbose = 0;
        }
        VerbositySetting::Verbose => {
            cli.quiet = false;
            cli.verbose = 1;
        }
        VerbositySetting::Quiet => {
            cli.quiet = true;
            cli.verbose = 0;
        }
        VerbositySetting::Debug => {
            cli.quiet = false;
            cli.verbose = 2;
        }
    }
}

/// Library settings: CLI chunk size, then config file, then defaults.
pub(crate) fn resolve_settings(cli: &Cli, file_config: &FileConfig) -> Result<UpdateSettings> {
    let mut settings = file_config.settings();
    if let Some(chunk_size) = cli.chunk_size {
        settings.download_chunk_size = usize::try_from(chunk_size)
            .with_context(|| format!("--chunk-size {chunk_size} does not fit this platform"))?;
    }
    Ok(settings)
}

pub(crate) fn resolve_default_log_level(cli: &Cli) -> &'static str {
    if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn should_force_cli_log_level(cli_sources: &CliValueSources) -> bool {
    cli_sources.verbose || cli_sources.quiet
}
