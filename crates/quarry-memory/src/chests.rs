//! Known storage containers.
//!
//! The registry only remembers positions.  Whether a chest still exists is
//! discovered when the offload manager tries to open it.

use std::sync::{Arc, RwLock};

use quarry_types::BlockPos;
use tracing::info;

#[derive(Clone, Default)]
pub struct ChestRegistry {
    positions: Arc<RwLock<Vec<BlockPos>>>,
}

impl ChestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chests(chests: impl IntoIterator<Item = BlockPos>) -> Self {
        let registry = Self::new();
        for pos in chests {
            registry.register(pos);
        }
        registry
    }

    /// Remember a chest at `pos`.  Returns `false` if it was already known.
    pub fn register(&self, pos: BlockPos) -> bool {
        let mut positions = self.positions.write().unwrap_or_else(|e| e.into_inner());
        if positions.contains(&pos) {
            return false;
        }
        positions.push(pos);
        info!(chest = %pos, known = positions.len(), "chest registered");
        true
    }

    /// Closest known chest to `from`; the earliest registered wins ties.
    pub fn nearest(&self, from: BlockPos) -> Option<BlockPos> {
        let positions = self.positions.read().unwrap_or_else(|e| e.into_inner());
        positions
            .iter()
            .copied()
            .reduce(|best, p| {
                if p.distance_to(from) < best.distance_to(from) {
                    p
                } else {
                    best
                }
            })
    }

    pub fn all(&self) -> Vec<BlockPos> {
        self.positions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.positions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
