//! Update requests and workflow settings.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::archive::{DEFAULT_EXTRACT_BUFFER_SIZE, ExtractOptions};
use crate::checksum::ExpectedChecksum;
use crate::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_DOWNLOAD_CHUNK_SIZE, PROGRESS_CHANNEL_CAPACITY,
    READ_TIMEOUT_SECS,
};

/// Suffix appended to the target directory name for the temporary download.
pub const DOWNLOAD_SUFFIX: &str = ".update.zip";

/// Tunables shared by every workflow an [`Updater`](super::Updater) runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    /// Download chunk size in bytes.
    pub download_chunk_size: usize,
    /// Extraction copy buffer in bytes.
    pub extract_buffer_size: usize,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Capacity of bounded progress queues.
    pub progress_channel_capacity: usize,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            download_chunk_size: DEFAULT_DOWNLOAD_CHUNK_SIZE,
            extract_buffer_size: DEFAULT_EXTRACT_BUFFER_SIZE,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            progress_channel_capacity: PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

/// One "fetch, verify, extract" request.
///
/// # Example
///
/// ```
/// use updater_core::checksum::ExpectedChecksum;
/// use updater_core::update::UpdateRequest;
///
/// let request = UpdateRequest::new(
///     "https://example.com/client.zip",
///     "/opt/client",
///     ExpectedChecksum::infer("ab".repeat(64)),
/// )
/// .with_staging(true);
/// assert!(request.download_path().ends_with("client.update.zip"));
/// ```
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Archive URL.
    pub url: String,
    /// Directory the archive is expanded into.
    pub target_dir: PathBuf,
    /// Digest the downloaded archive must match.
    pub expected: ExpectedChecksum,
    /// Where the archive is downloaded; defaults to a sibling of `target_dir`.
    pub download_path: Option<PathBuf>,
    /// Known archive size; wins over the probe result.
    pub expected_size: Option<u64>,
    /// Extraction behavior. `buffer_size` is overridden by the settings.
    pub extract: ExtractOptions,
}

impl UpdateRequest {
    /// Creates a request with default extraction options.
    pub fn new(
        url: impl Into<String>,
        target_dir: impl Into<PathBuf>,
        expected: ExpectedChecksum,
    ) -> Self {
        Self {
            url: url.into(),
            target_dir: target_dir.into(),
            expected,
            download_path: None,
            expected_size: None,
            extract: ExtractOptions::default(),
        }
    }

    /// Sets an explicit temporary download path.
    #[must_use]
    pub fn with_download_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_path = Some(path.into());
        self
    }

    /// Sets the known archive size.
    #[must_use]
    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Extracts through a staging directory.
    #[must_use]
    pub fn with_staging(mut self, staging: bool) -> Self {
        self.extract.staging = staging;
        self
    }

    /// Clears the target before extracting.
    #[must_use]
    pub fn with_clean_target(mut self, clean: bool) -> Self {
        self.extract.clean_target = clean;
        self
    }

    /// Resolved temporary download path.
    #[must_use]
    pub fn download_path(&self) -> PathBuf {
        self.download_path
            .clone()
            .unwrap_or_else(|| default_download_path(&self.target_dir))
    }
}

fn default_download_path(target_dir: &Path) -> PathBuf {
    let mut name = target_dir
        .file_name()
        .map_or_else(|| OsString::from("update"), ToOwned::to_owned);
    name.push(DOWNLOAD_SUFFIX);
    target_dir.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: &str) -> UpdateRequest {
        UpdateRequest::new(
            "https://example.com/client.zip",
            target,
            ExpectedChecksum::sha512("00"),
        )
    }

    #[test]
    fn test_default_download_path_is_sibling_of_target() {
        let request = request("/opt/game/client");
        assert_eq!(
            request.download_path(),
            PathBuf::from("/opt/game/client.update.zip")
        );
    }

    #[test]
    fn test_explicit_download_path_wins() {
        let request = request("/opt/game/client").with_download_path("/tmp/x.zip");
        assert_eq!(request.download_path(), PathBuf::from("/tmp/x.zip"));
    }

    #[test]
    fn test_builder_sets_extract_flags() {
        let request = request("/opt/client")
            .with_staging(true)
            .with_clean_target(true)
            .with_expected_size(42);
        assert!(request.extract.staging);
        assert!(request.extract.clean_target);
        assert_eq!(request.expected_size, Some(42));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = UpdateSettings::default();
        assert_eq!(settings.download_chunk_size, 10_000);
        assert_eq!(settings.extract_buffer_size, 8192);
        assert_eq!(settings.connect_timeout_secs, 30);
        assert_eq!(settings.read_timeout_secs, 300);
    }
}
