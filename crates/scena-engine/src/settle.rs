//! # Settle Queue
//!
//! Deferred continuations that let a stage's terminal intent callback wait
//! for the in-flight attach/detach transition to finish. The rendering
//! collaborator reports [`SettleQueue::complete`] when its transition is
//! done; [`SettleQueue::flush`] is the fallback path for hosts without an
//! explicit completion signal (the analogue of the fixed settle delay).
//!
//! Continuations re-check their configurator's run epoch before acting, so a
//! stage restarted while a settle was pending never fires a stale terminal
//! callback.

use parking_lot::Mutex;
use scena_core::identifiers::StageId;

type Continuation = Box<dyn FnOnce() + Send>;

/// FIFO queue of per-stage deferred continuations.
#[derive(Default)]
pub struct SettleQueue {
    pending: Mutex<Vec<(StageId, Continuation)>>,
}

impl SettleQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `continuation` until `stage`'s transition settles.
    pub fn defer(&self, stage: StageId, continuation: Continuation) {
        self.pending.lock().push((stage, continuation));
    }

    /// Fire every continuation waiting on `stage`, in defer order.
    pub fn complete(&self, stage: StageId) {
        let ready = self.drain(|s| s == stage);
        for continuation in ready {
            continuation();
        }
    }

    /// Fire everything still pending, in defer order. Fallback for hosts
    /// without a transition-completion signal.
    pub fn flush(&self) {
        let ready = self.drain(|_| true);
        for continuation in ready {
            continuation();
        }
    }

    /// Number of continuations still waiting.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    // Continuations run outside the lock; they may defer again.
    fn drain(&self, mut matches: impl FnMut(StageId) -> bool) -> Vec<Continuation> {
        let mut pending = self.pending.lock();
        let mut ready = Vec::new();
        let mut keep = Vec::new();
        for (stage, continuation) in pending.drain(..) {
            if matches(stage) {
                ready.push(continuation);
            } else {
                keep.push((stage, continuation));
            }
        }
        *pending = keep;
        ready
    }
}

impl std::fmt::Debug for SettleQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettleQueue")
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_complete_fires_only_matching_stage() {
        let queue = SettleQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let a = StageId::new();
        let b = StageId::new();

        for stage in [a, b] {
            let fired = fired.clone();
            queue.defer(
                stage,
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        queue.complete(a);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending_count(), 1);

        queue.flush();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_continuation_may_defer_again() {
        let queue = Arc::new(SettleQueue::new());
        let stage = StageId::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let queue_inner = queue.clone();
        let fired_inner = fired.clone();
        queue.defer(
            stage,
            Box::new(move || {
                let fired = fired_inner.clone();
                queue_inner.defer(
                    stage,
                    Box::new(move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        queue.complete(stage);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending_count(), 1);

        queue.complete(stage);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
