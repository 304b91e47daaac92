//! Merged reconcile result and the merge rules of spec §4.1 / testable
//! property 3.

use std::time::Duration;

/// What a handler, the resource updater, or a whole chain asks the workqueue
/// to do next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Legacy unconditional-requeue flag. Only meaningful in combination
    /// with `requeue_after == 0` (spec §4.1 "Result merging rules").
    pub requeue: bool,
    pub requeue_after: Duration,
}

impl ReconcileResult {
    pub const ZERO: ReconcileResult = ReconcileResult {
        requeue: false,
        requeue_after: Duration::ZERO,
    };

    pub fn after(d: Duration) -> Self {
        ReconcileResult {
            requeue: false,
            requeue_after: d,
        }
    }

    pub fn legacy_requeue() -> Self {
        ReconcileResult {
            requeue: true,
            requeue_after: Duration::ZERO,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    fn is_legacy(&self) -> bool {
        self.requeue && self.requeue_after.is_zero()
    }
}

/// Merges `next` into `acc` per spec §4.1:
///
/// - a zero result is ignored;
/// - a legacy `requeue=true, requeueAfter=0` result short-circuits: it wins
///   outright;
/// - otherwise the earliest non-zero `requeueAfter` is kept, replaced by any
///   smaller non-zero value seen later;
/// - ties preserve the first-seen (accumulator) value.
pub fn merge(acc: ReconcileResult, next: ReconcileResult) -> ReconcileResult {
    if next.is_zero() {
        return acc;
    }
    if next.is_legacy() {
        return next;
    }
    if acc.is_legacy() {
        return acc;
    }
    if acc.is_zero() {
        return next;
    }
    let requeue_after = if acc.requeue_after.is_zero() {
        next.requeue_after
    } else if next.requeue_after.is_zero() {
        acc.requeue_after
    } else {
        acc.requeue_after.min(next.requeue_after)
    };
    ReconcileResult {
        requeue: acc.requeue || next.requeue,
        requeue_after,
    }
}

/// Folds `merge` over a sequence of results, starting from `ReconcileResult::ZERO`.
pub fn merge_all(results: impl IntoIterator<Item = ReconcileResult>) -> ReconcileResult {
    results.into_iter().fold(ReconcileResult::ZERO, merge)
}
