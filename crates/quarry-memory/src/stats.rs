//! Extraction statistics.
//!
//! Counters are cumulative across mining sessions; the rate is computed over
//! the time since the first session started.
//!
//! # Example
//!
//! ```rust
//! use quarry_memory::StatsTracker;
//!
//! let stats = StatsTracker::new();
//! stats.begin_session();
//! stats.record("iron_ore");
//! stats.record("iron_ore");
//! stats.record("coal_ore");
//!
//! let snap = stats.snapshot();
//! assert_eq!(snap.total_extracted, 3);
//! assert_eq!(snap.per_type["iron_ore"], 2);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default)]
struct Stats {
    started_at: Option<DateTime<Utc>>,
    total: u64,
    per_type: BTreeMap<String, u64>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Start of the first session, `None` before any start.
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_secs: f64,
    pub total_extracted: u64,
    pub per_type: BTreeMap<String, u64>,
    /// Blocks per minute over the elapsed time; zero for the first second.
    pub per_minute: f64,
}

/// Shared extraction counters.
#[derive(Clone, Default)]
pub struct StatsTracker {
    inner: Arc<RwLock<Stats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the start time on the first session.  Counters carry over
    /// from earlier sessions.
    pub fn begin_session(&self) {
        self.begin_session_at(Utc::now());
    }

    pub fn begin_session_at(&self, at: DateTime<Utc>) {
        let mut stats = self.inner.write().unwrap_or_else(|e| e.into_inner());
        stats.started_at.get_or_insert(at);
    }

    /// Count one extracted block of `block_type`.
    pub fn record(&self, block_type: &str) {
        let mut stats = self.inner.write().unwrap_or_else(|e| e.into_inner());
        stats.total += 1;
        *stats.per_type.entry(block_type.to_string()).or_default() += 1;
        debug!(block_type, total = stats.total, "extraction recorded");
    }

    pub fn total(&self) -> u64 {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).total
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> StatsSnapshot {
        let stats = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let elapsed_secs = stats
            .started_at
            .map(|start| (now - start).num_milliseconds().max(0) as f64 / 1000.0)
            .unwrap_or(0.0);
        let per_minute = if elapsed_secs >= 1.0 {
            stats.total as f64 * 60.0 / elapsed_secs
        } else {
            0.0
        };
        StatsSnapshot {
            started_at: stats.started_at,
            elapsed_secs,
            total_extracted: stats.total,
            per_type: stats.per_type.clone(),
            per_minute,
        }
    }
}
