//! [`Approach`] – time-bounded navigation with a bridging fallback.
//!
//! Every call into the external pathfinder is wrapped in
//! [`tokio::time::timeout`].  On timeout the pathfinder is told to stop and
//! the attempt reports [`QuarryError::NavigationTimeout`].  The stop signal
//! is checked again as soon as the pathfinder returns, so a success that
//! arrives after a stop is discarded.
//!
//! [`Approach::reach`] adds the recovery used for dig targets: when the
//! "near" attempt fails it bridges over an escape hazard under the agent
//! (if any) and retries with a direct, tighter goal.

use std::sync::Arc;
use std::time::Duration;

use quarry_kernel::{HazardHandler, StopSignal};
use quarry_types::{BlockPos, Goal, QuarryError, TraversalRules};
use quarry_world::{Navigator, Presence};
use tracing::{debug, warn};

/// Tolerance of the direct retry after a failed "near" approach.
pub const DIRECT_TOLERANCE: u32 = 1;

pub struct Approach {
    navigator: Arc<dyn Navigator>,
    presence: Arc<dyn Presence>,
    hazards: Arc<HazardHandler>,
    rules: TraversalRules,
    timeout: Duration,
    tolerance: u32,
}

impl Approach {
    pub fn new(
        navigator: Arc<dyn Navigator>,
        presence: Arc<dyn Presence>,
        hazards: Arc<HazardHandler>,
        rules: TraversalRules,
        timeout: Duration,
        tolerance: u32,
    ) -> Self {
        Self {
            navigator,
            presence,
            hazards,
            rules,
            timeout,
            tolerance,
        }
    }

    pub fn tolerance(&self) -> u32 {
        self.tolerance
    }

    /// One navigation attempt towards `goal`.
    pub async fn go(&self, goal: Goal, stop: &StopSignal) -> Result<(), QuarryError> {
        stop.checkpoint()?;
        debug!(goal = %goal, "navigating");
        let outcome = tokio::time::timeout(self.timeout, self.navigator.path_to(goal, &self.rules)).await;
        stop.checkpoint()?;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.navigator.stop_navigation();
                Err(QuarryError::NavigationTimeout {
                    goal,
                    after_secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Get within digging range of `target`.
    pub async fn reach(&self, target: BlockPos, stop: &StopSignal) -> Result<(), QuarryError> {
        let near = Goal::near(target, self.tolerance);
        let err = match self.go(near, stop).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_navigation() => e,
            Err(e) => return Err(e),
        };
        warn!(target = %target, error = %err, "approach failed; retrying directly");

        if let Some(agent) = self.presence.position()
            && self.hazards.needs_bridge(agent)
        {
            if let Err(e) = self.hazards.bridge(agent).await {
                warn!(agent = %agent, error = %e, "bridging failed");
            }
            stop.checkpoint()?;
        }
        self.go(Goal::near(target, DIRECT_TOLERANCE), stop).await
    }
}
