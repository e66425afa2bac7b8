//! `quarry-runtime` – The Mining Loop
//!
//! Drives an agent through scan, select, approach, mitigate, dig, collect and
//! deposit cycles until it is stopped or something fatal happens to it.
//!
//! # Modules
//!
//! - [`mining_loop`] – [`MiningLoop`]: the state machine, its start/stop and
//!   emergency-stop control surface, and lifecycle handling.
//! - [`config`] – [`MiningConfig`]: every tunable with its default, plus
//!   validation.
//! - [`state`] – [`LoopState`], [`Phase`] and the watch-backed [`StateCell`]
//!   observers subscribe to.
//! - [`session`] – [`MiningSession`]: candidate and explored sets plus the
//!   [`SearchState`] of the current run.
//! - [`navigation`] – [`Approach`]: timed navigation with a bridged, direct
//!   retry.
//! - [`extraction`] – [`Extractor`]: one target from approach to collected
//!   drops, including vein following.
//! - [`search`] – [`SearchExpander`]: walks outward when nothing is in range.
//! - [`offload`] – [`InventoryOffloadManager`] and the RAII
//!   [`ContainerGuard`].
//! - [`tools`] – [`ToolManager`]: picks and equips the best tool by tier.
//! - [`stuck_guard`] – [`StuckGuard`]: abandons a target that keeps failing.
//! - [`telemetry`] – [`init_tracing`]: the global `tracing` subscriber with
//!   an optional OTLP span exporter.
//!
//! # Cancellation
//!
//! Every suspending operation is bracketed by
//! [`StopSignal::checkpoint`][quarry_kernel::StopSignal::checkpoint], so a
//! stopped loop never starts a new navigation, dig or deposit.  A result that
//! arrives after the stop is discarded.

pub mod config;
pub mod extraction;
pub mod mining_loop;
pub mod navigation;
pub mod offload;
pub mod search;
pub mod session;
pub mod state;
pub mod stuck_guard;
pub mod telemetry;
pub mod tools;

pub use config::MiningConfig;
pub use extraction::{ExtractOutcome, Extractor};
pub use mining_loop::MiningLoop;
pub use navigation::Approach;
pub use offload::{ContainerGuard, DepositReport, InventoryOffloadManager};
pub use search::SearchExpander;
pub use session::{MiningSession, SearchState};
pub use state::{LoopState, Phase, StateCell};
pub use stuck_guard::StuckGuard;
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use tools::{ToolManager, ToolTier};
