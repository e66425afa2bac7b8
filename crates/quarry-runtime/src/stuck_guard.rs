//! [`StuckGuard`] – detects a target that keeps failing.
//!
//! The guard counts consecutive navigation failures per target position.
//! When one position reaches the threshold, the loop is spinning on a site
//! it cannot reach and should abandon it.  A successful extraction of a
//! position clears its count.
//!
//! # Example
//!
//! ```rust
//! use quarry_runtime::stuck_guard::StuckGuard;
//! use quarry_types::BlockPos;
//!
//! let mut guard = StuckGuard::new(3);
//! let site = BlockPos::new(4, 12, -7);
//!
//! assert!(!guard.record_failure(site));
//! assert!(!guard.record_failure(site));
//! assert!(guard.record_failure(site));
//!
//! // Reporting stuck forgets the count.
//! assert!(!guard.record_failure(site));
//! guard.record_success(site);
//! ```

use std::collections::HashMap;

use quarry_types::BlockPos;

pub struct StuckGuard {
    threshold: usize,
    failures: HashMap<BlockPos, usize>,
}

impl StuckGuard {
    /// `threshold` consecutive failures on one position count as stuck.
    /// Zero is treated as one.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: HashMap::new(),
        }
    }

    /// Record a failed attempt on `target`.  Returns `true` when the target
    /// is stuck; its count is then dropped.
    pub fn record_failure(&mut self, target: BlockPos) -> bool {
        let count = self.failures.entry(target).or_default();
        *count += 1;
        if *count < self.threshold {
            return false;
        }
        self.failures.remove(&target);
        true
    }

    pub fn record_success(&mut self, target: BlockPos) {
        self.failures.remove(&target);
    }
}
