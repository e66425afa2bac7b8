//! `quarry-middleware` – event routing.
//!
//! Carries lifecycle signals from the connection layer to the mining loop,
//! and mining progress from the loop to whoever is listening, without either
//! side knowing about the other.
//!
//! # Modules
//!
//! - [`bus`] – topic-partitioned publish/subscribe bus built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
