//! Workflow states.

use std::fmt;

use serde::Serialize;

use super::error::ErrorKind;

/// Position of one workflow instance in its state machine.
///
/// `Idle → Probing → Downloading → Verifying → Extracting → Done`, with
/// `Failed` reachable from every working state. `Done` and `Failed` are
/// terminal; a new request starts a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum UpdateState {
    Idle,
    Probing,
    Downloading,
    Verifying,
    Extracting,
    Done,
    Failed(ErrorKind),
}

impl UpdateState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Returns true when `self → next` is an edge of the state machine.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use UpdateState::{Done, Downloading, Extracting, Failed, Idle, Probing, Verifying};
        matches!(
            (self, next),
            (Idle, Probing)
                | (Probing, Downloading)
                | (Downloading, Verifying)
                | (Verifying, Extracting)
                | (Extracting, Done)
                | (Probing | Downloading | Verifying | Extracting, Failed(_))
        )
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Probing => f.write_str("probing"),
            Self::Downloading => f.write_str("downloading"),
            Self::Verifying => f.write_str("verifying"),
            Self::Extracting => f.write_str("extracting"),
            Self::Done => f.write_str("done"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges() {
        let path = [
            UpdateState::Idle,
            UpdateState::Probing,
            UpdateState::Downloading,
            UpdateState::Verifying,
            UpdateState::Extracting,
            UpdateState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        let failed = UpdateState::Failed(ErrorKind::Network);
        assert!(failed.is_terminal());
        assert!(UpdateState::Done.is_terminal());
        assert!(!failed.can_transition_to(UpdateState::Probing));
        assert!(!UpdateState::Done.can_transition_to(UpdateState::Failed(ErrorKind::Io)));
        assert!(!UpdateState::Idle.can_transition_to(UpdateState::Failed(ErrorKind::Io)));
    }

    #[test]
    fn test_skipping_verification_is_not_an_edge() {
        assert!(!UpdateState::Downloading.can_transition_to(UpdateState::Extracting));
    }

    #[test]
    fn test_display_includes_failure_kind() {
        let failed = UpdateState::Failed(ErrorKind::ChecksumMismatch);
        assert_eq!(failed.to_string(), "failed(checksum_mismatch)");
    }
}
