//! Caller-side retry with exponential backoff.
//!
//! Workflows never retry internally. A caller classifies a failed workflow's
//! error with [`classify_error`] and, when [`RetryPolicy::should_retry`]
//! says so, waits and starts a fresh workflow instance.
//!
//! # Example
//!
//! ```
//! use updater_core::download::DownloadError;
//! use updater_core::retry::{RetryDecision, RetryPolicy, classify_error};
//! use updater_core::update::UpdateError;
//!
//! let policy = RetryPolicy::default();
//! let error = UpdateError::Download {
//!     source: DownloadError::http_status("https://example.com/client.zip", 503),
//! };
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use crate::download::DownloadError;
use crate::update::UpdateError;

/// Default maximum attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Whether a fresh workflow could plausibly succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Network hiccup, timeout, truncated body, 5xx or 429.
    Transient,
    /// Checksum mismatch, bad archive, local I/O, 4xx, cancellation, busy.
    Permanent,
}

/// Decision on whether to retry a failed workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start a new workflow after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// With defaults, delays are approximately: 1s, 2s (before hitting max attempts).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom max_attempts, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to start another workflow.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + calculate_jitter()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn calculate_jitter() -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_ms = rng.gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}

/// Classifies a failed workflow for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network, timeout, truncated body | Transient |
/// | HTTP 408, 429, 5xx | Transient |
/// | Other HTTP 4xx, invalid URL | Permanent |
/// | Checksum mismatch, extraction | Permanent |
/// | Local I/O, cancellation, busy | Permanent |
#[must_use]
pub fn classify_error(error: &UpdateError) -> FailureType {
    match error {
        UpdateError::Probe { source } | UpdateError::Download { source } => {
            classify_download_error(source)
        }
        UpdateError::Checksum { .. }
        | UpdateError::ChecksumMismatch { .. }
        | UpdateError::Extract { .. }
        | UpdateError::Cancelled { .. }
        | UpdateError::Busy { .. }
        | UpdateError::Worker { .. } => FailureType::Permanent,
    }
}

fn classify_download_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),
        DownloadError::Timeout { .. } | DownloadError::Integrity { .. } => FailureType::Transient,
        DownloadError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        DownloadError::NotFound { .. }
        | DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::Cancelled { .. }
        | DownloadError::ClientBuild { .. }
        | DownloadError::InvalidChunkSize { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 | 429 | 500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Certificate problems do not go away on retry.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::ExtractError;
    use crate::checksum::ChecksumAlgorithm;

    fn download(error: DownloadError) -> UpdateError {
        UpdateError::Download { source: error }
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
        assert!((policy.backoff_multiplier - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::with_max_attempts(0);
        assert_eq!(policy.max_attempts(), 1);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(32), 2.0);
        let second = policy.calculate_delay(2);
        assert!(second >= Duration::from_secs(2));
        assert!(second <= Duration::from_millis(2500));
        let third = policy.calculate_delay(3);
        assert!(third >= Duration::from_secs(4));
        assert!(third <= Duration::from_millis(4500));
    }

    #[test]
    fn test_delay_respects_max_delay() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        let delay = policy.calculate_delay(6);
        assert!(delay >= Duration::from_secs(5));
        assert!(delay <= Duration::from_millis(5500));
    }

    #[test]
    fn test_jitter_within_bounds() {
        for _ in 0..100 {
            assert!(calculate_jitter() <= MAX_JITTER);
        }
    }

    #[test]
    fn test_should_retry_transient_until_exhausted() {
        let policy = RetryPolicy::with_max_attempts(3);
        match policy.should_retry(FailureType::Transient, 1) {
            RetryDecision::Retry { attempt, .. } => assert_eq!(attempt, 2),
            other => panic!("Expected Retry, got: {other:?}"),
        }
        match policy.should_retry(FailureType::Transient, 3) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("exhausted")),
            other => panic!("Expected DoNotRetry, got: {other:?}"),
        }
    }

    #[test]
    fn test_should_not_retry_permanent() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    // ==================== Error Classification Tests ====================

    #[test]
    fn test_classify_server_errors_transient() {
        for status in [408, 429, 500, 502, 503, 504] {
            let error = download(DownloadError::http_status("http://example.com", status));
            assert_eq!(classify_error(&error), FailureType::Transient, "{status}");
        }
    }

    #[test]
    fn test_classify_client_errors_permanent() {
        for status in [400, 401, 403, 404, 410, 451] {
            let error = download(DownloadError::http_status("http://example.com", status));
            assert_eq!(classify_error(&error), FailureType::Permanent, "{status}");
        }
    }

    #[test]
    fn test_classify_transport_failures() {
        assert_eq!(
            classify_error(&download(DownloadError::timeout("http://example.com"))),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&download(DownloadError::integrity("/tmp/x.zip", 100, 40))),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&download(DownloadError::invalid_url("nope"))),
            FailureType::Permanent
        );
    }

    #[test]
    fn test_classify_workflow_failures_permanent() {
        let mismatch = UpdateError::ChecksumMismatch {
            path: "/tmp/x.zip".into(),
            algorithm: ChecksumAlgorithm::Sha512,
            expected: "00".into(),
            actual: "11".into(),
        };
        let extract = UpdateError::Extract {
            source: ExtractError::unsafe_path("../x", "escapes destination"),
        };
        let busy = UpdateError::Busy {
            target: "/opt/client".into(),
        };
        for error in [mismatch, extract, busy] {
            assert_eq!(classify_error(&error), FailureType::Permanent, "{error}");
        }
    }
}
