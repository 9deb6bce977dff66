//! Cooperative cancellation signal for long-running operations (spec.md
//! §5): search, cross-project inference, and topic updates each accept one
//! and check it between the documented batch boundaries, returning
//! [`crate::error::SircError::Cancelled`] once it fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
