//! Cooperative cancellation.
//!
//! Cancellation is only ever polled: between documents and on every tick of
//! the post-refresh wait. An automation call already in flight is never
//! interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Something the engine can ask "should I stop?".
pub trait CancellationSource: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// A shareable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl CancellationSource for CancelToken {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Never cancelled.
impl CancellationSource for () {
    fn is_cancelled(&self) -> bool {
        false
    }
}
