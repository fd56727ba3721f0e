//! Cooperative cancellation shared between a workflow and its caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable cancellation flag checked between chunks and between archive entries.
///
/// Setting the flag never interrupts an in-flight read or write; the worker
/// notices it at the next chunk boundary and fails with a `Cancelled` error.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates a flag that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_visible_through_clones() {
        let flag = CancelFlag::new();
        let worker_view = flag.clone();
        assert!(!worker_view.is_cancelled());

        flag.cancel();
        assert!(worker_view.is_cancelled());

        flag.cancel();
        assert!(worker_view.is_cancelled());
    }
}
