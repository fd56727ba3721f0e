//! `updater update`: fetch, verify and extract, retrying transient failures.

use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use updater_core::{
    CancelFlag, ExpectedChecksum, ExtractSummary, RetryDecision, RetryPolicy, UpdateError,
    UpdateRequest, Updater, classify_error,
};

use crate::ProcessExit;
use crate::app::{progress_manager, terminal};
use crate::cli::UpdateArgs;

pub async fn run_update_command(
    updater: &Updater,
    args: &UpdateArgs,
    quiet: bool,
) -> Result<ProcessExit> {
    let request = build_request(args);
    let use_bar = !args.no_progress
        && !args.json
        && terminal::should_use_progress_bar(
            io::stderr().is_terminal(),
            quiet,
            terminal::is_dumb_terminal(),
        );

    let policy = RetryPolicy::with_max_attempts(args.max_retries.saturating_add(1));
    let interrupt = Interrupt::listen();
    let outcome = run_with_retries(updater, &request, &policy, use_bar, &interrupt).await;
    interrupt.stop();

    if args.json {
        println!("{}", outcome_json(&outcome));
    }

    match outcome {
        Ok(summary) => {
            info!(
                target_dir = %request.target_dir.display(),
                files = summary.files,
                directories = summary.directories,
                bytes = summary.bytes,
                "Update installed"
            );
            Ok(ProcessExit::Success)
        }
        Err(error) => {
            if !args.json {
                eprintln!("Update failed ({}): {error}", error.kind());
            }
            Ok(ProcessExit::Failure)
        }
    }
}

fn build_request(args: &UpdateArgs) -> UpdateRequest {
    let expected = match args.algorithm {
        Some(algorithm) => ExpectedChecksum::new(algorithm, &args.checksum),
        None => ExpectedChecksum::infer(&args.checksum),
    };
    let mut request = UpdateRequest::new(&args.url, &args.target, expected)
        .with_staging(args.staging)
        .with_clean_target(args.clean);
    if let Some(path) = &args.download_path {
        request = request.with_download_path(path);
    }
    if let Some(size) = args.size {
        request = request.with_expected_size(size);
    }
    request
}

/// Ctrl-C listener held for the whole retry loop.
///
/// Every attempt shares `cancel`; `interrupted` wakes a pending backoff.
struct Interrupt {
    cancel: CancelFlag,
    interrupted: watch::Receiver<bool>,
    listener: Option<tokio::task::JoinHandle<()>>,
}

impl Interrupt {
    fn listen() -> Self {
        let (sender, interrupted) = watch::channel(false);
        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        let listener = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling update");
                flag.cancel();
                let _ = sender.send(true);
            }
        });
        Self {
            cancel,
            interrupted,
            listener: Some(listener),
        }
    }

    /// Interrupt fired through the returned sender instead of Ctrl-C.
    #[cfg(test)]
    fn manual() -> (Self, watch::Sender<bool>) {
        let (sender, interrupted) = watch::channel(false);
        let interrupt = Self {
            cancel: CancelFlag::new(),
            interrupted,
            listener: None,
        };
        (interrupt, sender)
    }

    /// Sleeps for `delay` unless interrupted first. Returns false on interrupt.
    async fn backoff(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let mut interrupted = self.interrupted.clone();
        tokio::select! {
            () = tokio::time::sleep(delay) => !self.cancel.is_cancelled(),
            Ok(_) = interrupted.wait_for(|fired| *fired) => false,
        }
    }

    fn stop(self) {
        if let Some(listener) = self.listener {
            listener.abort();
        }
    }
}

/// Starts a fresh workflow per attempt until one succeeds, the policy gives
/// up, or an interrupt arrives.
async fn run_with_retries(
    updater: &Updater,
    request: &UpdateRequest,
    policy: &RetryPolicy,
    use_bar: bool,
    interrupt: &Interrupt,
) -> Result<ExtractSummary, UpdateError> {
    let mut attempt = 1;
    loop {
        let result = run_once(updater, request.clone(), use_bar, &interrupt.cancel).await;
        let error = match result {
            Ok(summary) => return Ok(summary),
            Err(error) => error,
        };

        match policy.should_retry(classify_error(&error), attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next,
            } => {
                warn!(
                    attempt,
                    next_attempt = next,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "Update failed, retrying"
                );
                if !interrupt.backoff(delay).await {
                    return Err(UpdateError::Cancelled {
                        stage: "waiting to retry",
                    });
                }
                attempt = next;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(attempt, %reason, "Not retrying");
                return Err(error);
            }
        }
    }
}

async fn run_once(
    updater: &Updater,
    request: UpdateRequest,
    use_bar: bool,
    cancel: &CancelFlag,
) -> Result<ExtractSummary, UpdateError> {
    let handle = updater.start_with_cancel(request, cancel.clone())?;
    let progress_handle = progress_manager::spawn_progress_ui(
        use_bar,
        handle.progress_receiver(),
        handle.state_receiver(),
    );

    let result = handle.wait().await;

    if let Some(progress_handle) = progress_handle {
        let _ = progress_handle.await;
    }
    result
}

fn outcome_json(outcome: &Result<ExtractSummary, UpdateError>) -> serde_json::Value {
    match outcome {
        Ok(summary) => json!({
            "state": "done",
            "files": summary.files,
            "directories": summary.directories,
            "bytes": summary.bytes,
        }),
        Err(error) => json!({
            "state": "failed",
            "kind": error.kind(),
            "http_status": error.http_status(),
            "error": error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    use tempfile::TempDir;
    use updater_core::download::DownloadError;
    use updater_core::{ChecksumAlgorithm, ErrorKind, UpdateSettings};

    fn args() -> UpdateArgs {
        UpdateArgs {
            url: "https://example.com/client.zip".to_string(),
            target: PathBuf::from("/opt/client"),
            checksum: "ab".repeat(32),
            algorithm: None,
            download_path: None,
            size: None,
            staging: false,
            clean: false,
            max_retries: 0,
            json: false,
            no_progress: true,
        }
    }

    #[test]
    fn test_build_request_infers_algorithm_from_digest_length() {
        let request = build_request(&args());
        assert_eq!(request.expected.algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(request.download_path(), PathBuf::from("/opt/client.update.zip"));
    }

    #[test]
    fn test_build_request_applies_overrides() {
        let mut args = args();
        args.algorithm = Some(ChecksumAlgorithm::Sha512);
        args.download_path = Some(PathBuf::from("/tmp/pkg.zip"));
        args.size = Some(42);
        args.staging = true;

        let request = build_request(&args);
        assert_eq!(request.expected.algorithm, ChecksumAlgorithm::Sha512);
        assert_eq!(request.download_path(), PathBuf::from("/tmp/pkg.zip"));
        assert_eq!(request.expected_size, Some(42));
        assert!(request.extract.staging);
    }

    #[test]
    fn test_outcome_json_reports_kind_and_status() {
        let failed: Result<ExtractSummary, UpdateError> = Err(UpdateError::Download {
            source: DownloadError::http_status("https://example.com/client.zip", 503),
        });
        let value = outcome_json(&failed);
        assert_eq!(value["state"], "failed");
        assert_eq!(value["kind"], "network");
        assert_eq!(value["http_status"], 503);

        let done: Result<ExtractSummary, UpdateError> = Ok(ExtractSummary {
            files: 2,
            directories: 1,
            bytes: 16,
        });
        let value = outcome_json(&done);
        assert_eq!(value["state"], "done");
        assert_eq!(value["files"], 2);
    }

    #[tokio::test]
    async fn test_interrupt_during_backoff_ends_retries_as_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let settings = UpdateSettings {
            connect_timeout_secs: 2,
            ..UpdateSettings::default()
        };
        let updater = Updater::new(settings).unwrap();
        // Nothing listens on port 1, so every attempt fails with a transient
        // connection error.
        let request = UpdateRequest::new(
            "http://127.0.0.1:1/client.zip",
            temp_dir.path().join("client"),
            ExpectedChecksum::sha512("00".repeat(64)),
        );
        let policy = RetryPolicy::new(5, Duration::from_secs(60), Duration::from_secs(60), 2.0);
        let (interrupt, fire) = Interrupt::manual();
        let flag = interrupt.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.cancel();
            let _ = fire.send(true);
        });

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(20),
            run_with_retries(&updater, &request, &policy, false, &interrupt),
        )
        .await
        .expect("interrupt must end the backoff");

        let error = outcome.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_backoff_returns_false_once_interrupted() {
        let (interrupt, fire) = Interrupt::manual();
        assert!(interrupt.backoff(Duration::from_millis(1)).await);

        fire.send(true).unwrap();
        assert!(!interrupt.backoff(Duration::from_secs(60)).await);
    }
}
