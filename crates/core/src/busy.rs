//! Single in-flight operation guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that is set while a load or export runs.
///
/// Clones observe the same flag, so a UI can hold one to disable its controls.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Claims the flag, or returns `None` if another operation holds it.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }
}

/// Releases the flag when dropped.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_holder_at_a_time() {
        let flag = BusyFlag::default();
        let observer = flag.clone();

        let guard = flag.try_acquire().expect("first acquire succeeds");
        assert!(observer.is_busy());
        assert!(observer.try_acquire().is_none());

        drop(guard);
        assert!(!observer.is_busy());
        assert!(observer.try_acquire().is_some());
    }
}
