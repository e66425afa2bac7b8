//! `quarry-kernel` – Safety & Cancellation
//!
//! The mining core's brainstem. It does not choose targets; it keeps the
//! agent alive around them and makes sure a stop request is honoured.
//!
//! # Modules
//!
//! - [`cancel`] – [`StopSignal`][cancel::StopSignal]: the cooperative
//!   cancellation flag checked after every suspension point, with a
//!   cancellable sleep for backoff and yield delays.
//! - [`hazard`] – [`HazardHandler`][hazard::HazardHandler]: caps lava and
//!   removes water next to a dig target, and bridges over escape hazards
//!   when navigation is stuck.  Every action is best-effort.

pub mod cancel;
pub mod hazard;

pub use cancel::StopSignal;
pub use hazard::{FACES, HazardHandler, HazardPolicy, HazardReport};
