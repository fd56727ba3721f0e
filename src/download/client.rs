//! HTTP client wrapper for probing and downloading update archives.
//!
//! This module provides the `HttpClient` struct which handles metadata-only
//! size probes and streaming downloads with fixed-size chunking, per-chunk
//! progress reports and cooperative cancellation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_DOWNLOAD_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
    READ_TIMEOUT_SECS,
};
use super::error::DownloadError;
use super::progress::{NoProgress, ProgressReport, ProgressSink, SharedProgressSink, SinkDebug};
use crate::cancel::CancelFlag;
use crate::user_agent;

/// One download request: consumed once, then discarded.
#[derive(Clone)]
pub struct DownloadTask {
    /// Source URL (HTTP or HTTPS).
    pub url: String,
    /// Destination file; parent directories are created as needed.
    pub destination: PathBuf,
    /// Expected total size in bytes. Falls back to `Content-Length` when absent.
    pub expected_total: Option<u64>,
    /// Receiver of per-chunk progress reports.
    pub sink: SharedProgressSink,
}

impl DownloadTask {
    /// Creates a task with unknown size and no progress sink.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            expected_total: None,
            sink: Arc::new(NoProgress),
        }
    }

    /// Sets the expected total size.
    #[must_use]
    pub fn with_total(mut self, total: Option<u64>) -> Self {
        self.expected_total = total;
        self
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_sink(mut self, sink: SharedProgressSink) -> Self {
        self.sink = sink;
        self
    }
}

impl fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadTask")
            .field("url", &self.url)
            .field("destination", &self.destination)
            .field("expected_total", &self.expected_total)
            .field("sink", &SinkDebug)
            .finish()
    }
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFileResult {
    /// Final output path.
    pub path: PathBuf,
    /// Bytes written to the output path.
    pub bytes_downloaded: u64,
    /// Size the transfer was checked against, when known.
    pub content_length: Option<u64>,
}

/// HTTP client for size probes and streaming downloads.
///
/// This client is designed to be created once and reused for multiple
/// downloads, taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use updater_core::download::{DownloadTask, HttpClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let url = "https://example.com/client.zip";
/// let size = client.probe_size(url).await?;
/// let task = DownloadTask::new(url, "./client.zip").with_total(size);
/// let result = client.download(&task).await?;
/// println!("Downloaded {} bytes", result.bytes_downloaded);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    chunk_size: usize,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts and chunk size.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend or system
    /// configuration prevents building the client.
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self {
            client,
            chunk_size: DEFAULT_DOWNLOAD_CHUNK_SIZE,
        })
    }

    /// Overrides the transfer chunk size.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidChunkSize`] outside
    /// `MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, DownloadError> {
        self.chunk_size = validate_chunk_size(chunk_size)?;
        Ok(self)
    }

    /// Transfer chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Learns the remote size with a metadata-only `HEAD` request.
    ///
    /// Returns `Ok(None)` when the server answers but omits `Content-Length`.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] for non-HTTP(S) or malformed URLs
    /// - [`DownloadError::NotFound`] for 404/410
    /// - [`DownloadError::HttpStatus`] for other non-success statuses
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] for transport failures
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe_size(&self, url: &str) -> Result<Option<u64>, DownloadError> {
        let parsed = parse_http_url(url)?;
        let response = self.send_request(reqwest::Method::HEAD, parsed).await?;
        let size = header_content_length(&response);
        debug!(size = ?size, "size probe complete");
        Ok(size)
    }

    /// Streams a remote resource into `task.destination`.
    ///
    /// # Errors
    ///
    /// Same as [`download_with_cancel`](Self::download_with_cancel) minus cancellation.
    pub async fn download(&self, task: &DownloadTask) -> Result<DownloadFileResult, DownloadError> {
        self.download_with_cancel(task, &CancelFlag::new()).await
    }

    /// Streams a remote resource into `task.destination`, checking `cancel`
    /// between chunks.
    ///
    /// A partially written destination is left in place on failure; the caller
    /// decides whether to discard it.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] / [`DownloadError::NotFound`] /
    ///   [`DownloadError::HttpStatus`] before any byte is written
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] mid-transfer
    /// - [`DownloadError::Io`] when the destination cannot be created or written
    /// - [`DownloadError::Integrity`] when the body length differs from the expected total
    /// - [`DownloadError::Cancelled`] once `cancel` is set
    #[must_use = "download result contains the number of bytes written"]
    #[instrument(skip(self, task, cancel), fields(url = %task.url, path = %task.destination.display()))]
    pub async fn download_with_cancel(
        &self,
        task: &DownloadTask,
        cancel: &CancelFlag,
    ) -> Result<DownloadFileResult, DownloadError> {
        debug!("starting download");
        let parsed = parse_http_url(&task.url)?;
        if cancel.is_cancelled() {
            return Err(DownloadError::cancelled(&task.url, 0));
        }

        let response = self.send_request(reqwest::Method::GET, parsed).await?;
        let total = task.expected_total.or_else(|| header_content_length(&response));

        if let Some(parent) = task
            .destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }
        let mut file = File::create(&task.destination)
            .await
            .map_err(|e| DownloadError::io(&task.destination, e))?;

        let url = task.url.clone();
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(url.as_str(), e)));

        let bytes_written = stream_to_file(
            stream,
            &mut file,
            &ChunkTarget {
                url: &task.url,
                path: &task.destination,
                chunk_size: self.chunk_size,
                total,
            },
            task.sink.as_ref(),
            cancel,
        )
        .await?;

        info!(bytes = bytes_written, total = ?total, "download complete");

        Ok(DownloadFileResult {
            path: task.destination.clone(),
            bytes_downloaded: bytes_written,
            content_length: total,
        })
    }

    async fn send_request(
        &self,
        method: reqwest::Method,
        url: Url,
    ) -> Result<reqwest::Response, DownloadError> {
        let url_text = url.to_string();
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url_text.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url_text, status.as_u16()));
        }
        Ok(response)
    }

}

/// Where and how a byte stream is written.
pub(crate) struct ChunkTarget<'a> {
    pub(crate) url: &'a str,
    pub(crate) path: &'a Path,
    pub(crate) chunk_size: usize,
    pub(crate) total: Option<u64>,
}

/// Writes a byte stream to `file` in fixed `chunk_size` blocks, publishing a
/// report after each block. Returns the number of bytes written.
///
/// Network chunks of any size are regrouped so that every block except the
/// last is exactly `chunk_size` bytes.
pub(crate) async fn stream_to_file<S, B>(
    mut stream: S,
    file: &mut File,
    target: &ChunkTarget<'_>,
    sink: &dyn ProgressSink,
    cancel: &CancelFlag,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, DownloadError>> + Unpin,
    B: AsRef<[u8]>,
{
    let chunk_size = target.chunk_size.max(MIN_CHUNK_SIZE);
    let mut buffer: Vec<u8> = Vec::with_capacity(chunk_size);
    let mut written: u64 = 0;

    while let Some(item) = stream.next().await {
        let data = item?;
        let mut remaining = data.as_ref();
        while !remaining.is_empty() {
            let take = (chunk_size - buffer.len()).min(remaining.len());
            buffer.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            if buffer.len() == chunk_size {
                written = write_chunk(file, &mut buffer, written, target, sink, cancel).await?;
            }
        }
    }
    if !buffer.is_empty() {
        written = write_chunk(file, &mut buffer, written, target, sink, cancel).await?;
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::io(target.path, e))?;

    if let Some(expected) = target.total
        && expected != written
    {
        return Err(DownloadError::integrity(target.path, expected, written));
    }

    Ok(written)
}

async fn write_chunk(
    file: &mut File,
    buffer: &mut Vec<u8>,
    written: u64,
    target: &ChunkTarget<'_>,
    sink: &dyn ProgressSink,
    cancel: &CancelFlag,
) -> Result<u64, DownloadError> {
    if cancel.is_cancelled() {
        debug!(bytes = written, "cancellation observed");
        return Err(DownloadError::cancelled(target.url, written));
    }
    let next = written + buffer.len() as u64;
    if let Some(expected) = target.total
        && next > expected
    {
        return Err(DownloadError::integrity(target.path, expected, next));
    }
    file.write_all(buffer)
        .await
        .map_err(|e| DownloadError::io(target.path, e))?;
    buffer.clear();
    sink.report(ProgressReport::new(next, target.total));
    Ok(next)
}

fn validate_chunk_size(chunk_size: usize) -> Result<usize, DownloadError> {
    if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        Ok(chunk_size)
    } else {
        Err(DownloadError::InvalidChunkSize {
            size: chunk_size,
            min: MIN_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
        })
    }
}

fn parse_http_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(DownloadError::invalid_url(url)),
    }
}

fn header_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
