//! [`SearchExpander`] – moves the agent into unexplored ground when no
//! candidates are left.
//!
//! Each expansion tries the eight compass and diagonal directions at the
//! current search radius, each at three vertical offsets, and stops at the
//! first navigation that succeeds.  A timed-out or failed attempt only rules
//! out that one combination.
//!
//! When every combination fails the session's failure counter goes up; a
//! full cycle of failures (one per direction) grows the radius by the
//! configured step, capped at the configured maximum.

use std::sync::Arc;

use quarry_kernel::StopSignal;
use quarry_middleware::EventBus;
use quarry_types::{BlockPos, Goal, MiningEvent, QuarryError};
use quarry_world::Presence;
use tracing::{debug, info, warn};

use crate::navigation::Approach;
use crate::session::MiningSession;

const SOURCE: &str = "quarry-runtime::search";

/// Unit (x, z) directions, clockwise from east.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

pub const VERTICAL_OFFSETS: [i32; 3] = [-1, 0, 1];

pub struct SearchExpander {
    approach: Arc<Approach>,
    presence: Arc<dyn Presence>,
    bus: EventBus,
    step: i32,
    max_radius: i32,
}

impl SearchExpander {
    pub fn new(
        approach: Arc<Approach>,
        presence: Arc<dyn Presence>,
        bus: EventBus,
        step: i32,
        max_radius: i32,
    ) -> Self {
        Self {
            approach,
            presence,
            bus,
            step,
            max_radius,
        }
    }

    /// Every destination tried around `origin` at `radius`, in order.
    pub fn destinations(origin: BlockPos, radius: i32) -> impl Iterator<Item = BlockPos> {
        DIRECTIONS.into_iter().flat_map(move |(dx, dz)| {
            VERTICAL_OFFSETS
                .into_iter()
                .map(move |dy| origin.offset(dx * radius, dy, dz * radius))
        })
    }

    /// Run one expansion.  Returns where the agent went, or `None` when
    /// every combination failed.
    pub async fn expand(
        &self,
        session: &mut MiningSession,
        stop: &StopSignal,
    ) -> Result<Option<BlockPos>, QuarryError> {
        let origin = self.presence.position().ok_or(QuarryError::NotSpawned)?;
        let radius = session.search.radius;
        debug!(origin = %origin, radius, "expanding search");

        for dest in Self::destinations(origin, radius) {
            match self
                .approach
                .go(Goal::near(dest, self.approach.tolerance()), stop)
                .await
            {
                Ok(()) => {
                    session.search.record_success();
                    info!(to = %dest, radius, "moved to unexplored ground");
                    return Ok(Some(dest));
                }
                Err(e) if e.is_cancellation() || e.is_fatal() => return Err(e),
                Err(e) => debug!(to = %dest, error = %e, "expansion attempt failed"),
            }
        }

        warn!(origin = %origin, radius, "every expansion direction failed");
        let cycle = DIRECTIONS.len() as u32;
        if let Some(grown) = session
            .search
            .record_failure(cycle, self.step, self.max_radius)
        {
            info!(radius = grown, "search radius grown");
            self.bus
                .publish_mining(SOURCE, MiningEvent::SearchRadiusGrown { radius: grown });
        }
        Ok(None)
    }
}
