//! Spawns workflows on Tokio tasks, one per destination at a time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use super::error::UpdateError;
use super::request::{UpdateRequest, UpdateSettings};
use super::state::UpdateState;
use super::workflow::UpdateWorkflow;
use crate::archive::ExtractSummary;
use crate::cancel::CancelFlag;
use crate::download::{
    ChannelSink, DownloadError, HttpClient, ProgressReport, ProgressSink, SharedProgressSink,
    WatchSink,
};

type InFlightSet = Arc<Mutex<HashSet<PathBuf>>>;

/// Runs update workflows and rejects a second one for a busy destination.
///
/// The updater is designed to be created once; its HTTP client is shared by
/// every workflow it starts.
#[derive(Debug, Clone)]
pub struct Updater {
    client: HttpClient,
    settings: UpdateSettings,
    in_flight: InFlightSet,
}

impl Updater {
    /// Creates an updater whose client is built from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] or
    /// [`DownloadError::InvalidChunkSize`] when the settings are unusable.
    pub fn new(settings: UpdateSettings) -> Result<Self, DownloadError> {
        let client =
            HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs)?
                .with_chunk_size(settings.download_chunk_size)?;
        Ok(Self::with_client(client, settings))
    }

    /// Creates an updater around an existing client.
    #[must_use]
    pub fn with_client(client: HttpClient, settings: UpdateSettings) -> Self {
        Self {
            client,
            settings,
            in_flight: Arc::default(),
        }
    }

    /// Settings applied to every workflow.
    #[must_use]
    pub fn settings(&self) -> &UpdateSettings {
        &self.settings
    }

    /// Shared HTTP client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Returns true while a started workflow targets `target_dir`.
    #[must_use]
    pub fn is_busy(&self, target_dir: &Path) -> bool {
        lock(&self.in_flight).contains(&in_flight_key(target_dir))
    }

    /// Builds a workflow for direct awaiting. It is not registered as in flight.
    #[must_use]
    pub fn workflow(&self, request: UpdateRequest) -> UpdateWorkflow {
        UpdateWorkflow::new(self.client.clone(), request)
            .with_extract_buffer_size(self.settings.extract_buffer_size)
    }

    /// Starts a workflow on a new Tokio task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Busy`] when a workflow started by this updater
    /// still targets the same destination.
    #[instrument(skip(self, request), fields(url = %request.url, target = %request.target_dir.display()))]
    pub fn start(&self, request: UpdateRequest) -> Result<UpdateHandle, UpdateError> {
        self.spawn(request, CancelFlag::new(), None)
    }

    /// Like [`start`](Self::start), but the workflow observes `cancel`.
    ///
    /// A flag that is already set fails the workflow with
    /// [`UpdateError::Cancelled`] before any request is sent. One flag may be
    /// shared by successive attempts so a single interrupt stops them all.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    #[instrument(skip(self, request, cancel), fields(url = %request.url, target = %request.target_dir.display()))]
    pub fn start_with_cancel(
        &self,
        request: UpdateRequest,
        cancel: CancelFlag,
    ) -> Result<UpdateHandle, UpdateError> {
        self.spawn(request, cancel, None)
    }

    /// Like [`start`](Self::start), and also queues every progress report
    /// in a channel of `settings.progress_channel_capacity`.
    ///
    /// Reports are dropped while the queue is full; the handle's latest-value
    /// receiver is unaffected.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    #[instrument(skip(self, request), fields(url = %request.url, target = %request.target_dir.display()))]
    pub fn start_queued(
        &self,
        request: UpdateRequest,
    ) -> Result<(UpdateHandle, mpsc::Receiver<ProgressReport>), UpdateError> {
        let (queue, receiver) = ChannelSink::channel(self.settings.progress_channel_capacity);
        let handle = self.spawn(request, CancelFlag::new(), Some(queue))?;
        Ok((handle, receiver))
    }

    fn spawn(
        &self,
        request: UpdateRequest,
        cancel: CancelFlag,
        queue: Option<ChannelSink>,
    ) -> Result<UpdateHandle, UpdateError> {
        let guard = InFlightGuard::acquire(&self.in_flight, &request.target_dir)?;
        let (latest, progress) = WatchSink::channel();
        let sink: SharedProgressSink = match queue {
            Some(queue) => Arc::new(move |report: ProgressReport| {
                latest.report(report);
                queue.report(report);
            }),
            None => Arc::new(latest),
        };
        let workflow = self
            .workflow(request)
            .with_sink(sink)
            .with_cancel(cancel.clone());
        let state = workflow.subscribe();

        let join = tokio::spawn(async move {
            let _guard = guard;
            workflow.run().await
        });
        debug!("workflow spawned");

        Ok(UpdateHandle {
            state,
            progress,
            cancel,
            join,
        })
    }
}

/// Caller's view of a spawned workflow.
#[derive(Debug)]
pub struct UpdateHandle {
    state: watch::Receiver<UpdateState>,
    progress: watch::Receiver<ProgressReport>,
    cancel: CancelFlag,
    join: JoinHandle<Result<ExtractSummary, UpdateError>>,
}

impl UpdateHandle {
    /// Latest published state.
    #[must_use]
    pub fn state(&self) -> UpdateState {
        *self.state.borrow()
    }

    /// Receiver of state transitions; slow consumers see the latest state.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<UpdateState> {
        self.state.clone()
    }

    /// Receiver of download progress; slow consumers see the latest report.
    #[must_use]
    pub fn progress_receiver(&self) -> watch::Receiver<ProgressReport> {
        self.progress.clone()
    }

    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone of the workflow's cancellation flag, for signal handlers.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Waits for the workflow to reach a terminal state.
    ///
    /// # Errors
    ///
    /// Returns the workflow's [`UpdateError`], or [`UpdateError::Worker`] if
    /// the task panicked.
    pub async fn wait(self) -> Result<ExtractSummary, UpdateError> {
        self.join.await.map_err(|source| UpdateError::Worker {
            stage: "workflow",
            source,
        })?
    }
}

/// Registration of one destination in the in-flight set, released on drop.
#[derive(Debug)]
struct InFlightGuard {
    set: InFlightSet,
    key: PathBuf,
}

impl InFlightGuard {
    fn acquire(set: &InFlightSet, target_dir: &Path) -> Result<Self, UpdateError> {
        let key = in_flight_key(target_dir);
        if !lock(set).insert(key.clone()) {
            return Err(UpdateError::Busy {
                target: target_dir.to_path_buf(),
            });
        }
        Ok(Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.key);
    }
}

fn lock(set: &InFlightSet) -> MutexGuard<'_, HashSet<PathBuf>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

fn in_flight_key(target_dir: &Path) -> PathBuf {
    std::path::absolute(target_dir).unwrap_or_else(|_| target_dir.to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_rejects_same_destination() {
        let set = InFlightSet::default();
        let first = InFlightGuard::acquire(&set, Path::new("/opt/client")).unwrap();

        let second = InFlightGuard::acquire(&set, Path::new("/opt/client"));
        assert!(matches!(second, Err(UpdateError::Busy { .. })));

        let other = InFlightGuard::acquire(&set, Path::new("/opt/other"));
        assert!(other.is_ok());

        drop(first);
        assert!(InFlightGuard::acquire(&set, Path::new("/opt/client")).is_ok());
    }

    #[test]
    fn test_in_flight_key_normalizes_relative_paths() {
        let set = InFlightSet::default();
        let cwd = std::env::current_dir().unwrap();
        let _guard = InFlightGuard::acquire(&set, Path::new("client")).unwrap();

        let again = InFlightGuard::acquire(&set, &cwd.join("client"));
        assert!(matches!(again, Err(UpdateError::Busy { .. })));
    }
}
