//! Bounded block sweep around the agent.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`ScanBox`]       | Inclusive integer box, the sweep volume.          |
//! | [`PriorityTable`] | Block type → positive scoring weight.             |
//! | [`OreScanner`]    | Sweeps a box and reports unexplored target sites. |
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use quarry_perception::{OreScanner, PriorityTable};
//! use quarry_types::BlockPos;
//! use quarry_world::SimWorld;
//!
//! let world = Arc::new(SimWorld::new().with_block(BlockPos::new(1, 0, 0), "iron_ore"));
//! let table = PriorityTable::from_pairs([("iron_ore", 2)]);
//! let scanner = OreScanner::new(world, table);
//!
//! let sites = scanner.scan(BlockPos::new(0, 0, 0), 1, 1, &HashSet::new());
//! assert_eq!(sites.len(), 1);
//! assert_eq!(sites[0].position, BlockPos::new(1, 0, 0));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use quarry_types::{BlockPos, OreSite};
use quarry_world::WorldProbe;
use tracing::debug;

use crate::candidates::CandidateSet;

// ────────────────────────────────────────────────────────────────────────────
// ScanBox
// ────────────────────────────────────────────────────────────────────────────

/// An inclusive axis-aligned box of block positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl ScanBox {
    /// Create a box from two opposite corners, normalised so `min ≤ max`
    /// per axis.
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// The box reaching `horizontal` blocks along x and z and `vertical`
    /// blocks along y from `center`.  Negative radii are treated as zero.
    pub fn around(center: BlockPos, horizontal: i32, vertical: i32) -> Self {
        let h = horizontal.max(0);
        let v = vertical.max(0);
        Self::new(center.offset(-h, -v, -h), center.offset(h, v, h))
    }

    /// True when `p` lies inside or on the boundary of the box.
    pub fn contains(&self, p: BlockPos) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }

    /// Number of cells in the box.
    pub fn volume(&self) -> usize {
        let span = |lo: i32, hi: i32| (hi - lo + 1) as usize;
        span(self.min.x, self.max.x) * span(self.min.y, self.max.y) * span(self.min.z, self.max.z)
    }

    /// Every cell, x-major then y then z.
    pub fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        (self.min.x..=self.max.x).flat_map(move |x| {
            (self.min.y..=self.max.y)
                .flat_map(move |y| (self.min.z..=self.max.z).map(move |z| BlockPos::new(x, y, z)))
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PriorityTable
// ────────────────────────────────────────────────────────────────────────────

/// Mapping from target block type to its positive scoring weight.
///
/// Zero weights are dropped on construction, so every type in the table is
/// a valid target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityTable {
    weights: HashMap<String, u32>,
}

impl PriorityTable {
    pub fn new(weights: HashMap<String, u32>) -> Self {
        Self {
            weights: weights.into_iter().filter(|(_, w)| *w > 0).collect(),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        Self::new(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn priority(&self, block_type: &str) -> Option<u32> {
        self.weights.get(block_type).copied()
    }

    /// Every target block type, sorted for stable output.
    pub fn block_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.weights.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OreScanner
// ────────────────────────────────────────────────────────────────────────────

/// Sweeps a bounded window around a position for target blocks.
pub struct OreScanner {
    world: Arc<dyn WorldProbe>,
    table: PriorityTable,
}

impl OreScanner {
    pub fn new(world: Arc<dyn WorldProbe>, table: PriorityTable) -> Self {
        Self { world, table }
    }

    /// Return every target block within the box around `center` whose
    /// position is not in `explored`, in sweep order.
    ///
    /// Deterministic for a fixed world; never mutates `explored`.
    pub fn scan(
        &self,
        center: BlockPos,
        horizontal: i32,
        vertical: i32,
        explored: &HashSet<BlockPos>,
    ) -> Vec<OreSite> {
        let window = ScanBox::around(center, horizontal, vertical);
        let sites: Vec<OreSite> = window
            .positions()
            .filter(|pos| !explored.contains(pos))
            .filter_map(|pos| self.classify(pos))
            .collect();
        debug!(
            center = %center,
            cells = window.volume(),
            found = sites.len(),
            "scan complete"
        );
        sites
    }

    /// [`scan`][Self::scan], then merge the results into `candidates`.
    /// A site already known at the same position is overwritten.
    ///
    /// Returns the number of sites observed by this sweep.
    pub fn scan_into(
        &self,
        center: BlockPos,
        horizontal: i32,
        vertical: i32,
        explored: &HashSet<BlockPos>,
        candidates: &mut CandidateSet,
    ) -> usize {
        let sites = self.scan(center, horizontal, vertical, explored);
        let found = sites.len();
        for site in sites {
            candidates.insert(site);
        }
        found
    }

    /// Build an [`OreSite`] for `pos` when the block there is a target.
    pub fn classify(&self, pos: BlockPos) -> Option<OreSite> {
        let block = self.world.block_at(pos)?;
        let priority = self.table.priority(&block.name)?;
        Some(OreSite {
            position: pos,
            block_type: block.name,
            priority,
        })
    }
}
