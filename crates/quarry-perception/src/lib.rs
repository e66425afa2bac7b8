//! `quarry-perception` – turning block queries into mining targets.
//!
//! # Modules
//!
//! - [`scan`] – [`OreScanner`][scan::OreScanner]: sweeps a [`ScanBox`][scan::ScanBox]
//!   around the agent and classifies blocks against a
//!   [`PriorityTable`][scan::PriorityTable].
//! - [`candidates`] – [`CandidateSet`][candidates::CandidateSet]: known ore
//!   sites keyed by position, remembering first-seen order.
//! - [`select`] – [`TargetSelector`][select::TargetSelector]: scores
//!   candidates by distance over squared priority and picks the best.
//! - [`vein`] – neighbour offsets used to follow contiguous veins.

pub mod candidates;
pub mod scan;
pub mod select;
pub mod vein;

pub use candidates::CandidateSet;
pub use scan::{OreScanner, PriorityTable, ScanBox};
pub use select::TargetSelector;
pub use vein::{VEIN_OFFSETS, vein_neighbours};
