use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag that aborts an add or delete call.
///
/// Clones observe the same flag. Cancelling stops the fallback loop
/// before its next probe and kills any in-flight `curl` child.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
