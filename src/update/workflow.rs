//! One run of the fetch → verify → extract state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::error::UpdateError;
use super::request::UpdateRequest;
use super::state::UpdateState;
use crate::archive::{DEFAULT_EXTRACT_BUFFER_SIZE, ExtractOptions, ExtractSummary, extract_with};
use crate::cancel::CancelFlag;
use crate::checksum::checksum_file;
use crate::download::{DownloadError, DownloadTask, HttpClient, NoProgress, SharedProgressSink};
use crate::remove::remove_best_effort;

/// A single update workflow instance.
///
/// The instance owns its state channel, progress sink, cancellation flag and
/// temporary download. It is consumed by [`run`](Self::run); a retry is a
/// new instance.
pub struct UpdateWorkflow {
    client: HttpClient,
    request: UpdateRequest,
    extract_buffer_size: usize,
    state: watch::Sender<UpdateState>,
    sink: SharedProgressSink,
    cancel: CancelFlag,
}

impl std::fmt::Debug for UpdateWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateWorkflow")
            .field("request", &self.request)
            .field("state", &*self.state.borrow())
            .field("sink", &crate::download::SinkDebug)
            .finish_non_exhaustive()
    }
}

impl UpdateWorkflow {
    /// Creates an idle workflow with no progress sink.
    #[must_use]
    pub fn new(client: HttpClient, request: UpdateRequest) -> Self {
        let (state, _) = watch::channel(UpdateState::Idle);
        Self {
            client,
            request,
            extract_buffer_size: DEFAULT_EXTRACT_BUFFER_SIZE,
            state,
            sink: Arc::new(NoProgress),
            cancel: CancelFlag::new(),
        }
    }

    /// Sets the progress sink the download reports to.
    #[must_use]
    pub fn with_sink(mut self, sink: SharedProgressSink) -> Self {
        self.sink = sink;
        self
    }

    /// Shares a cancellation flag with the caller.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Overrides the extraction copy buffer.
    #[must_use]
    pub fn with_extract_buffer_size(mut self, size: usize) -> Self {
        self.extract_buffer_size = size;
        self
    }

    /// Subscribes to state transitions. The receiver always holds the latest state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.state.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> UpdateState {
        *self.state.borrow()
    }

    /// Runs the workflow to a terminal state.
    ///
    /// The temporary download is discarded on every exit path; a failure to
    /// discard it is logged and does not change the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`UpdateError`] whose [`kind`](UpdateError::kind) was
    /// published as [`UpdateState::Failed`].
    #[instrument(skip(self), fields(url = %self.request.url, target = %self.request.target_dir.display()))]
    pub async fn run(self) -> Result<ExtractSummary, UpdateError> {
        let download_path = self.request.download_path();
        let result = self.run_stages(&download_path).await;

        discard_download(&download_path);
        match &result {
            Ok(summary) => {
                self.transition(UpdateState::Done);
                info!(files = summary.files, bytes = summary.bytes, "update complete");
            }
            Err(e) => {
                self.transition(UpdateState::Failed(e.kind()));
                warn!(kind = %e.kind(), error = %e, "update failed");
            }
        }
        result
    }

    async fn run_stages(&self, download_path: &Path) -> Result<ExtractSummary, UpdateError> {
        self.enter(UpdateState::Probing, "probing")?;
        let probed = match self.client.probe_size(&self.request.url).await {
            Ok(size) => size,
            Err(e) if is_probe_unsupported(&e) => {
                debug!(error = %e, "size probe unsupported, continuing with unknown size");
                None
            }
            Err(source) => return Err(UpdateError::Probe { source }),
        };
        let total = self.request.expected_size.or(probed);

        self.enter(UpdateState::Downloading, "downloading")?;
        let task = DownloadTask::new(self.request.url.clone(), download_path)
            .with_total(total)
            .with_sink(Arc::clone(&self.sink));
        self.client
            .download_with_cancel(&task, &self.cancel)
            .await
            .map_err(|source| UpdateError::Download { source })?;

        self.enter(UpdateState::Verifying, "verifying")?;
        self.verify(download_path).await?;

        self.enter(UpdateState::Extracting, "extracting")?;
        self.extract(download_path).await
    }

    async fn verify(&self, download_path: &Path) -> Result<(), UpdateError> {
        let expected = self.request.expected.clone();
        let path = download_path.to_path_buf();
        let algorithm = expected.algorithm;
        let actual = tokio::task::spawn_blocking(move || checksum_file(&path, algorithm))
            .await
            .map_err(|source| UpdateError::Worker {
                stage: "verifying",
                source,
            })?
            .map_err(|source| UpdateError::Checksum { source })?;

        if !actual.matches(&expected.hex) {
            return Err(UpdateError::ChecksumMismatch {
                path: download_path.to_path_buf(),
                algorithm,
                expected: expected.hex.trim().to_ascii_lowercase(),
                actual: actual.hex,
            });
        }
        debug!(digest = %actual, "checksum verified");
        Ok(())
    }

    async fn extract(&self, download_path: &Path) -> Result<ExtractSummary, UpdateError> {
        let archive = download_path.to_path_buf();
        let target: PathBuf = self.request.target_dir.clone();
        let options = ExtractOptions {
            buffer_size: self.extract_buffer_size,
            ..self.request.extract
        };
        let cancel = self.cancel.clone();

        tokio::task::spawn_blocking(move || extract_with(&archive, &target, &options, &cancel))
            .await
            .map_err(|source| UpdateError::Worker {
                stage: "extracting",
                source,
            })?
            .map_err(|source| UpdateError::Extract { source })
    }

    fn enter(&self, next: UpdateState, stage: &'static str) -> Result<(), UpdateError> {
        self.transition(next);
        if self.cancel.is_cancelled() {
            return Err(UpdateError::Cancelled { stage });
        }
        Ok(())
    }

    fn transition(&self, next: UpdateState) {
        let previous = self.state.send_replace(next);
        debug_assert!(
            previous.can_transition_to(next),
            "invalid transition {previous} -> {next}"
        );
        info!(from = %previous, to = %next, "state transition");
    }
}

fn discard_download(path: &Path) {
    let report = remove_best_effort(path);
    for failure in &report.failures {
        warn!(path = %failure.path.display(), error = %failure.source, "cleanup failed");
    }
}

/// HEAD is not implemented by every server; the transfer can run without a size.
fn is_probe_unsupported(error: &DownloadError) -> bool {
    matches!(error.status(), Some(405 | 501))
}
