//! Read-only world queries.
//!
//! Both traits are synchronous: a game client answers them from its local
//! chunk and entity caches without a round trip to the server.

use quarry_types::{BlockInfo, BlockPos, Entity};

/// Block identity and nearby-entity lookup.
pub trait WorldProbe: Send + Sync {
    /// Return the block at `pos`, or `None` when the chunk is not loaded.
    fn block_at(&self, pos: BlockPos) -> Option<BlockInfo>;

    /// Every entity whose position lies within `radius` blocks of `center`.
    fn entities_near(&self, center: BlockPos, radius: f64) -> Vec<Entity>;
}

/// The agent's own presence in the world.
pub trait Presence: Send + Sync {
    /// Current block position of the agent, or `None` when it has not
    /// spawned (or has left the world).
    fn position(&self) -> Option<BlockPos>;

    fn is_alive(&self) -> bool;

    /// Hit points, `0.0..=20.0` for a standard agent.
    fn health(&self) -> f32;

    /// `true` when the agent is spawned and alive.
    fn is_present(&self) -> bool {
        self.is_alive() && self.position().is_some()
    }
}
