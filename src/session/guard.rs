use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-flight flag: at most one frame is in processing at any time.
#[derive(Clone, Default)]
pub(crate) struct FlightFlag(Arc<AtomicBool>);

impl FlightFlag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Non-blocking acquire. `None` when another step holds the flag.
    pub(crate) fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flag: &self.0 })
    }

    pub(crate) fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the flag on drop, including when a step unwinds.
pub(crate) struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
