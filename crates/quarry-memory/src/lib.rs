//! `quarry-memory` – what the agent remembers across iterations.
//!
//! Both stores are cheap to clone and share their state, so the mining loop,
//! the lifecycle watcher and the CLI all read the same numbers.
//!
//! # Modules
//!
//! - [`stats`] – [`StatsTracker`][stats::StatsTracker]: per-session
//!   extraction counters and a serialisable snapshot with a per-minute rate.
//! - [`chests`] – [`ChestRegistry`][chests::ChestRegistry]: known storage
//!   container positions and nearest-chest lookup.

pub mod chests;
pub mod stats;

pub use chests::ChestRegistry;
pub use stats::{StatsSnapshot, StatsTracker};
