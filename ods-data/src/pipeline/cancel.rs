//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag polled by a running download at feature boundaries.
///
/// Clones observe the same flag, so one clone can be handed to another
/// thread while the pipeline owns the original.
///
/// ```
/// use ods_data::CancelFlag;
///
/// let flag = CancelFlag::new();
/// let remote = flag.clone();
/// remote.cancel();
/// assert!(flag.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear a previous request so the flag can be reused for another run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}
