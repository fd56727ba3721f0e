//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use updater_core::{ChecksumAlgorithm, DEFAULT_MAX_ATTEMPTS};

use crate::app_config::MAX_RETRIES_LIMIT;

/// Default retries after the first attempt of `update`.
pub const DEFAULT_MAX_RETRIES: u32 = DEFAULT_MAX_ATTEMPTS - 1;

/// Fetch, verify and unpack client update archives.
///
/// `updater update` downloads a release archive, checks it against a known
/// digest and expands it into the client directory. The other subcommands
/// expose each step on its own.
#[derive(Parser, Debug)]
#[command(name = "updater")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Download chunk size in bytes; one progress report per chunk
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=16_777_216))]
    pub chunk_size: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download, verify and extract an update archive
    Update(UpdateArgs),

    /// Print the remote size of an archive
    Probe {
        /// Archive URL
        url: String,
    },

    /// Check a file against an expected hex digest
    Verify {
        /// File to check
        file: PathBuf,
        /// Expected digest (hex, case-insensitive)
        checksum: String,
        /// Digest algorithm; inferred from the digest length when omitted
        #[arg(short, long)]
        algorithm: Option<ChecksumAlgorithm>,
    },

    /// Print the hex digest of a file
    Digest {
        /// File to hash
        file: PathBuf,
        /// Digest algorithm
        #[arg(short, long, default_value = "sha512")]
        algorithm: ChecksumAlgorithm,
    },

    /// Extract a zip archive into a directory
    Extract(ExtractArgs),

    /// Remove a file or directory tree
    Remove {
        /// Path to remove
        path: PathBuf,
        /// Keep going after a failure and report every path that could not be removed
        #[arg(long)]
        best_effort: bool,
    },
}

/// Arguments for `updater update`.
#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Archive URL (http or https)
    pub url: String,

    /// Directory the archive is expanded into
    #[arg(short, long)]
    pub target: PathBuf,

    /// Expected digest of the archive (hex)
    #[arg(short, long)]
    pub checksum: String,

    /// Digest algorithm; inferred from the digest length when omitted
    #[arg(short, long)]
    pub algorithm: Option<ChecksumAlgorithm>,

    /// Where to download the archive (default: <TARGET>.update.zip)
    #[arg(long)]
    pub download_path: Option<PathBuf>,

    /// Known archive size in bytes; skips the size probe result
    #[arg(long)]
    pub size: Option<u64>,

    /// Extract into a staging directory and swap it in on success
    #[arg(long)]
    pub staging: bool,

    /// Remove the target's current contents before extracting
    #[arg(long, conflicts_with = "staging")]
    pub clean: bool,

    /// Retries after a transient failure (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_RETRIES_LIMIT)))]
    pub max_retries: u32,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for `updater extract`.
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Zip archive to extract
    pub archive: PathBuf,

    /// Destination directory
    pub dest: PathBuf,

    /// Extract into a staging directory and swap it in on success
    #[arg(long)]
    pub staging: bool,

    /// Remove the destination's current contents before extracting
    #[arg(long, conflicts_with = "staging")]
    pub clean: bool,

    /// List the archive's entries instead of extracting
    #[arg(long)]
    pub list: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_args(cli: Cli) -> UpdateArgs {
        match cli.command {
            Command::Update(args) => args,
            other => panic!("expected update command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_update_parses_required_arguments() {
        let cli = Cli::try_parse_from([
            "updater",
            "update",
            "https://example.com/client.zip",
            "--target",
            "/opt/client",
            "--checksum",
            "abcd",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert!(cli.chunk_size.is_none());

        let args = update_args(cli);
        assert_eq!(args.url, "https://example.com/client.zip");
        assert_eq!(args.target, PathBuf::from("/opt/client"));
        assert_eq!(args.max_retries, DEFAULT_MAX_RETRIES);
        assert!(args.algorithm.is_none());
        assert!(!args.staging);
        assert!(!args.json);
    }

    #[test]
    fn test_cli_update_requires_checksum() {
        let result = Cli::try_parse_from([
            "updater",
            "update",
            "https://example.com/client.zip",
            "--target",
            "/opt/client",
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_update_parses_algorithm() {
        let cli = Cli::try_parse_from([
            "updater",
            "update",
            "https://example.com/client.zip",
            "-t",
            "client",
            "-c",
            "abcd",
            "--algorithm",
            "sha256",
        ])
        .unwrap();
        assert_eq!(
            update_args(cli).algorithm,
            Some(ChecksumAlgorithm::Sha256)
        );
    }

    #[test]
    fn test_cli_rejects_unknown_algorithm() {
        let result = Cli::try_parse_from(["updater", "digest", "file.zip", "-a", "md5"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_max_retries_range_enforced() {
        let result = Cli::try_parse_from([
            "updater",
            "update",
            "https://example.com/client.zip",
            "-t",
            "client",
            "-c",
            "abcd",
            "-r",
            "11",
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_staging_conflicts_with_clean() {
        let result = Cli::try_parse_from([
            "updater",
            "extract",
            "a.zip",
            "out",
            "--staging",
            "--clean",
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["updater", "probe", "https://example.com/a.zip", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from([
            "updater",
            "--chunk-size",
            "4096",
            "probe",
            "https://example.com/a.zip",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size, Some(4096));
    }

    #[test]
    fn test_cli_chunk_size_zero_rejected() {
        let result = Cli::try_parse_from([
            "updater",
            "--chunk-size",
            "0",
            "probe",
            "https://example.com/a.zip",
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_digest_defaults_to_sha512() {
        let cli = Cli::try_parse_from(["updater", "digest", "file.zip"]).unwrap();
        match cli.command {
            Command::Digest { algorithm, .. } => assert_eq!(algorithm, ChecksumAlgorithm::Sha512),
            other => panic!("expected digest command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_remove_best_effort_flag() {
        let cli = Cli::try_parse_from(["updater", "remove", "old", "--best-effort"]).unwrap();
        match cli.command {
            Command::Remove { path, best_effort } => {
                assert_eq!(path, PathBuf::from("old"));
                assert!(best_effort);
            }
            other => panic!("expected remove command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_subcommand_required() {
        let result = Cli::try_parse_from(["updater"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Cli::try_parse_from(["updater", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Cli::try_parse_from(["updater", "--version"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_unknown_flag_rejected() {
        let result = Cli::try_parse_from(["updater", "probe", "x", "--bogus"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
