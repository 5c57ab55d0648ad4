//! Process-wide invocation counters.

use std::sync::atomic::{AtomicU64, Ordering};

static TOTAL_INVOCATIONS: AtomicU64 = AtomicU64::new(0);
static TOTAL_ELAPSED_MS: AtomicU64 = AtomicU64::new(0);

pub fn record(elapsed_ms: u64) {
    TOTAL_INVOCATIONS.fetch_add(1, Ordering::Relaxed);
    TOTAL_ELAPSED_MS.fetch_add(elapsed_ms, Ordering::Relaxed);
}

pub fn snapshot() -> (u64, u64) {
    (
        TOTAL_INVOCATIONS.load(Ordering::Relaxed),
        TOTAL_ELAPSED_MS.load(Ordering::Relaxed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_increments_both_counters() {
        let (before_count, before_ms) = snapshot();
        record(42);
        let (after_count, after_ms) = snapshot();
        assert_eq!(after_count, before_count + 1);
        assert_eq!(after_ms, before_ms + 42);
    }
}
