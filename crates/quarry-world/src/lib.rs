//! `quarry-world` – capability boundary between the mining core and the game.
//!
//! The mining core never talks to a game client directly.  It depends on a
//! handful of narrow capability traits so that each component only sees what
//! it needs, and so that a simulated world can stand in for a live server.
//!
//! # Modules
//!
//! - [`probe`] – [`WorldProbe`][probe::WorldProbe] (block and entity queries)
//!   and [`Presence`][probe::Presence] (is the agent spawned, where, how
//!   healthy).
//! - [`navigator`] – [`Navigator`][navigator::Navigator]: the external
//!   pathfinder.  Cancellable; the caller wraps it in its own timeout.
//! - [`inventory`] – [`InventoryPort`][inventory::InventoryPort] and
//!   [`Interaction`][inventory::Interaction] (dig, place, use, collect).
//! - [`container`] – [`ContainerPort`][container::ContainerPort] for chest
//!   access, handed out as [`ContainerHandle`][container::ContainerHandle]s.
//! - [`registry`] – [`AgentPorts`][registry::AgentPorts]: the bundle of
//!   shared trait objects wired into every runtime component.
//! - [`sim`] – [`SimWorld`][sim::SimWorld]: an in-process world that
//!   implements every trait and records each operation, for tests and the
//!   demo CLI.

pub mod container;
pub mod inventory;
pub mod navigator;
pub mod probe;
pub mod registry;
pub mod sim;

pub use container::{ContainerHandle, ContainerPort};
pub use inventory::{Interaction, InventoryPort};
pub use navigator::Navigator;
pub use probe::{Presence, WorldProbe};
pub use registry::AgentPorts;
pub use sim::{SimOp, SimWorld};
