//! [`TargetSelector`] – picks the next site to mine.
//!
//! Score = distance / priority², lower is better.  Priority suppresses
//! distance quadratically: a priority-3 site six blocks away (score ≈ 0.67)
//! beats a priority-1 site two blocks away (score 2).  Ties go to the site
//! seen first.

use std::cmp::Ordering;
use std::collections::HashSet;

use quarry_types::{BlockPos, OreSite};

use crate::candidates::CandidateSet;

#[derive(Debug, Default, Clone, Copy)]
pub struct TargetSelector;

impl TargetSelector {
    pub fn new() -> Self {
        Self
    }

    /// Score for a site at `distance` with weight `priority`.
    ///
    /// A zero priority never reaches here (the priority table drops them),
    /// but is clamped to 1 rather than dividing by zero.
    pub fn score(distance: f64, priority: u32) -> f64 {
        let p = f64::from(priority.max(1));
        distance / (p * p)
    }

    /// The best candidate as seen from `agent`, ignoring positions in `skip`.
    /// `None` when nothing is left.
    pub fn select_best(
        &self,
        agent: BlockPos,
        candidates: &CandidateSet,
        skip: &HashSet<BlockPos>,
    ) -> Option<OreSite> {
        candidates
            .iter()
            .filter(|(_, site)| !skip.contains(&site.position))
            .map(|(seq, site)| {
                (
                    Self::score(agent.distance_to(site.position), site.priority),
                    seq,
                    site,
                )
            })
            .min_by(|a, b| match a.0.total_cmp(&b.0) {
                Ordering::Equal => a.1.cmp(&b.1),
                other => other,
            })
            .map(|(_, _, site)| site.clone())
    }
}
