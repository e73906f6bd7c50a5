//! Filepath: src/metrics.rs
//!
//! Metrics-sink interface.
//!
//! Lookups report how many pointer traversals they performed; the sink
//! aggregates them however it likes. [`TraversalHistogram`] is the bundled
//! power-of-two-bucket implementation; deployments with their own telemetry
//! implement [`TreeMetrics`] and forward.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives one sample per successful lookup: the number of child-pointer
/// traversals the walk performed.
pub trait TreeMetrics: Send + Sync {
    /// Record a pointer-traversal count.
    fn record_pointer_traversals(&self, count: u64);
}

/// Number of histogram buckets.
const BUCKETS: usize = 16;

/// Lock-free histogram with power-of-two buckets.
///
/// Bucket `i` counts samples in `[2^(i-1), 2^i)`; bucket 0 counts zero.
/// The last bucket absorbs everything beyond the range.
#[derive(Default)]
pub struct TraversalHistogram {
    buckets: [AtomicU64; BUCKETS],
}

impl TraversalHistogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_for(count: u64) -> usize {
        if count == 0 {
            return 0;
        }
        let log2 = 64 - u64::leading_zeros(count) as usize;
        log2.min(BUCKETS - 1)
    }

    /// Per-bucket counts.
    #[must_use]
    pub fn snapshot(&self) -> [u64; BUCKETS] {
        let mut out = [0u64; BUCKETS];
        for (slot, bucket) in out.iter_mut().zip(&self.buckets) {
            *slot = bucket.load(Ordering::Relaxed);
        }
        out
    }

    /// Total number of recorded samples.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .sum()
    }
}

impl TreeMetrics for TraversalHistogram {
    fn record_pointer_traversals(&self, count: u64) {
        self.buckets[Self::bucket_for(count)].fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
//  Tests
// ============================================================================
