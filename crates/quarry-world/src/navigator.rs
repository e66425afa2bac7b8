//! The external pathfinder capability.

use async_trait::async_trait;
use quarry_types::{Goal, QuarryError, TraversalRules};

/// Moves the agent through the world.
///
/// Implementations are expected to be cancellable: a call to
/// [`stop_navigation`][Navigator::stop_navigation] from another task should
/// make an in-flight [`path_to`][Navigator::path_to] return promptly.  The
/// trait itself imposes no timeout; callers wrap `path_to` in their own.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Path the agent to within `goal.tolerance` blocks of `goal.position`.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::NavigationFailed`] when no path exists or the
    /// attempt was interrupted.
    async fn path_to(&self, goal: Goal, rules: &TraversalRules) -> Result<(), QuarryError>;

    /// Abort any in-flight navigation.
    fn stop_navigation(&self);

    /// Release every movement control (forward, jump, sprint, …).
    fn clear_movement_intent(&self);
}
