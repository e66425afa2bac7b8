//! [`MiningSession`] – the state owned by one run of the mining loop.
//!
//! Only the loop task touches a session, so nothing here is synchronised.
//! A position is never a candidate and explored at the same time:
//! [`MiningSession::add_candidate`] refuses explored positions, and
//! [`MiningSession::mark_explored`] removes the candidate before recording it.

use std::collections::HashSet;

use quarry_perception::{CandidateSet, OreScanner};
use quarry_types::{BlockPos, OreSite};

// ─────────────────────────────────────────────────────────────────────────────
// SearchState
// ─────────────────────────────────────────────────────────────────────────────

/// Radius used by the search expander and its failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchState {
    pub radius: i32,
    pub consecutive_failures: u32,
}

impl SearchState {
    pub fn new(radius: i32) -> Self {
        Self {
            radius,
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Count one fully failed expansion.
    ///
    /// When the counter reaches `cycle` it resets and the radius grows by
    /// `step`, capped at `max`.  Returns the new radius if it changed.
    pub fn record_failure(&mut self, cycle: u32, step: i32, max: i32) -> Option<i32> {
        self.consecutive_failures += 1;
        if self.consecutive_failures < cycle.max(1) {
            return None;
        }
        self.consecutive_failures = 0;
        let grown = self.radius.saturating_add(step).min(max);
        if grown > self.radius {
            self.radius = grown;
            Some(grown)
        } else {
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MiningSession
// ─────────────────────────────────────────────────────────────────────────────

pub struct MiningSession {
    candidates: CandidateSet,
    explored: HashSet<BlockPos>,
    pub search: SearchState,
}

impl MiningSession {
    pub fn new(search_radius: i32) -> Self {
        Self {
            candidates: CandidateSet::new(),
            explored: HashSet::new(),
            search: SearchState::new(search_radius),
        }
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn explored(&self) -> &HashSet<BlockPos> {
        &self.explored
    }

    pub fn is_explored(&self, pos: BlockPos) -> bool {
        self.explored.contains(&pos)
    }

    /// Record a site unless its position is already explored.
    pub fn add_candidate(&mut self, site: OreSite) -> bool {
        if self.explored.contains(&site.position) {
            return false;
        }
        self.candidates.insert(site)
    }

    /// Sweep the window around `center` and merge every unexplored site into
    /// the candidates.  Returns the number of sites the sweep observed.
    pub fn merge_scan(
        &mut self,
        scanner: &OreScanner,
        center: BlockPos,
        horizontal: i32,
        vertical: i32,
    ) -> usize {
        scanner.scan_into(
            center,
            horizontal,
            vertical,
            &self.explored,
            &mut self.candidates,
        )
    }

    /// Move `pos` from the candidates into the explored set.
    ///
    /// Returns `false` when the position was already explored, in which
    /// case nothing changes.
    pub fn mark_explored(&mut self, pos: BlockPos) -> bool {
        self.candidates.remove(pos);
        self.explored.insert(pos)
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.explored.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(x: i32) -> OreSite {
        OreSite {
            position: BlockPos::new(x, 0, 0),
            block_type: "iron_ore".to_string(),
            priority: 2,
        }
    }

    #[test]
    fn explored_positions_are_never_candidates() {
        let mut s = MiningSession::new(16);
        assert!(s.add_candidate(site(1)));
        assert!(s.mark_explored(BlockPos::new(1, 0, 0)));
        assert!(s.candidates().is_empty());
        assert!(!s.add_candidate(site(1)));
        assert!(!s.candidates().contains(BlockPos::new(1, 0, 0)));
    }

    #[test]
    fn mark_explored_happens_once() {
        let mut s = MiningSession::new(16);
        s.add_candidate(site(1));
        assert!(s.mark_explored(BlockPos::new(1, 0, 0)));
        assert!(!s.mark_explored(BlockPos::new(1, 0, 0)));
        assert_eq!(s.explored().len(), 1);
    }

    #[test]
    fn merged_scan_skips_explored_positions() {
        use quarry_perception::PriorityTable;
        use quarry_world::SimWorld;
        use std::sync::Arc;

        let world = SimWorld::new()
            .with_block(BlockPos::new(1, 0, 0), "iron_ore")
            .with_block(BlockPos::new(-1, 0, 0), "iron_ore");
        let scanner = OreScanner::new(Arc::new(world), PriorityTable::from_pairs([("iron_ore", 2)]));
        let mut s = MiningSession::new(16);
        s.mark_explored(BlockPos::new(1, 0, 0));

        assert_eq!(s.merge_scan(&scanner, BlockPos::default(), 1, 1), 1);
        assert!(s.candidates().contains(BlockPos::new(-1, 0, 0)));
        assert!(!s.candidates().contains(BlockPos::new(1, 0, 0)));
    }

    #[test]
    fn radius_grows_after_a_full_cycle() {
        let mut search = SearchState::new(16);
        for _ in 0..7 {
            assert_eq!(search.record_failure(8, 16, 64), None);
        }
        assert_eq!(search.record_failure(8, 16, 64), Some(32));
        assert_eq!(search.consecutive_failures, 0);
    }

    #[test]
    fn success_resets_the_counter() {
        let mut search = SearchState::new(16);
        for _ in 0..7 {
            search.record_failure(8, 16, 64);
        }
        search.record_success();
        assert_eq!(search.record_failure(8, 16, 64), None);
        assert_eq!(search.radius, 16);
    }

    #[test]
    fn radius_never_exceeds_max() {
        let mut search = SearchState::new(16);
        for _ in 0..100 {
            search.record_failure(8, 16, 40);
            assert!(search.radius <= 40);
        }
        assert_eq!(search.radius, 40);
    }
}
