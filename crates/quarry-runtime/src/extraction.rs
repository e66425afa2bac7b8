//! [`Extractor`] – takes one ore site from "selected" to "mined".
//!
//! Order of work for a site:
//!
//! 1. re-read the block; a site that no longer holds its ore is dropped
//! 2. approach it ([`Approach::reach`])
//! 3. neutralise neighbouring liquids ([`HazardHandler::mitigate`])
//! 4. equip the best tool, then dig
//! 5. record the extraction and follow the vein
//! 6. optionally pick up nearby drops
//!
//! The stop signal is checked after every external call.  A dig that has
//! already happened is always recorded, even if a stop arrives meanwhile.

use std::sync::Arc;

use quarry_kernel::{HazardHandler, StopSignal};
use quarry_memory::StatsTracker;
use quarry_middleware::EventBus;
use quarry_perception::vein_neighbours;
use quarry_types::{BlockInfo, EntityKind, MiningEvent, OreSite, QuarryError};
use quarry_world::{Interaction, Presence, WorldProbe};
use tracing::{debug, info};

use crate::navigation::Approach;
use crate::session::MiningSession;
use crate::state::{Phase, StateCell};
use crate::tools::ToolManager;

const SOURCE: &str = "quarry-runtime::extraction";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Mined { vein_added: usize, collected: usize },
    /// The block changed before it could be dug.
    Vanished,
}

pub struct Extractor {
    pub(crate) world: Arc<dyn WorldProbe>,
    pub(crate) presence: Arc<dyn Presence>,
    pub(crate) interaction: Arc<dyn Interaction>,
    pub(crate) tools: ToolManager,
    pub(crate) hazards: Arc<HazardHandler>,
    pub(crate) approach: Arc<Approach>,
    pub(crate) stats: StatsTracker,
    pub(crate) bus: EventBus,
    pub(crate) state: StateCell,
    pub(crate) tool_class: String,
    /// `None` disables drop collection.
    pub(crate) collect_radius: Option<f64>,
}

impl Extractor {
    pub async fn extract(
        &self,
        site: &OreSite,
        session: &mut MiningSession,
        stop: &StopSignal,
    ) -> Result<ExtractOutcome, QuarryError> {
        let pos = site.position;
        if self.current(site).is_none() {
            debug!(pos = %pos, block = %site.block_type, "site no longer holds its ore");
            session.mark_explored(pos);
            return Ok(ExtractOutcome::Vanished);
        }

        self.state.enter(Phase::Navigating);
        self.approach.reach(pos, stop).await?;

        self.state.enter(Phase::HazardChecking);
        self.hazards.mitigate(pos, stop).await?;

        self.state.enter(Phase::Extracting);
        self.tools.equip_best_tool(&self.tool_class).await?;
        stop.checkpoint()?;
        let Some(block) = self.current(site) else {
            session.mark_explored(pos);
            return Ok(ExtractOutcome::Vanished);
        };
        self.interaction.dig(&block).await?;

        if session.mark_explored(pos) {
            self.stats.record(&site.block_type);
            self.bus.publish_mining(
                SOURCE,
                MiningEvent::SiteMined {
                    position: pos,
                    block_type: site.block_type.clone(),
                },
            );
        }
        info!(pos = %pos, block = %site.block_type, "mined");

        let vein_added = self.follow_vein(site, session);
        stop.checkpoint()?;

        let collected = match self.collect_radius {
            Some(radius) => {
                self.state.enter(Phase::Collecting);
                self.collect_drops(radius, stop).await?
            }
            None => 0,
        };
        Ok(ExtractOutcome::Mined {
            vein_added,
            collected,
        })
    }

    /// The block at the site, if it is still the recorded ore.
    fn current(&self, site: &OreSite) -> Option<BlockInfo> {
        self.world
            .block_at(site.position)
            .filter(|b| b.name == site.block_type)
    }

    /// Add same-type neighbours of a mined site to the candidates.
    fn follow_vein(&self, site: &OreSite, session: &mut MiningSession) -> usize {
        let mut added = 0;
        for pos in vein_neighbours(site.position) {
            if session.is_explored(pos) {
                continue;
            }
            let same = self
                .world
                .block_at(pos)
                .is_some_and(|b| b.name == site.block_type);
            if same
                && session.add_candidate(OreSite {
                    position: pos,
                    block_type: site.block_type.clone(),
                    priority: site.priority,
                })
            {
                added += 1;
            }
        }
        if added > 0 {
            debug!(origin = %site.position, added, "following vein");
        }
        added
    }

    async fn collect_drops(&self, radius: f64, stop: &StopSignal) -> Result<usize, QuarryError> {
        let Some(agent) = self.presence.position() else {
            return Ok(0);
        };
        let drops = self
            .world
            .entities_near(agent, radius)
            .into_iter()
            .filter(|e| e.kind == EntityKind::DroppedItem);
        let mut collected = 0;
        for entity in drops {
            stop.checkpoint()?;
            match self.interaction.collect_item(&entity).await {
                Ok(()) => collected += 1,
                Err(e) => debug!(entity = entity.id, error = %e, "pickup skipped"),
            }
        }
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use quarry_kernel::HazardPolicy;
    use quarry_types::{BlockPos, Item, TraversalRules};
    use quarry_world::{SimOp, SimWorld};

    fn extractor(world: Arc<SimWorld>, collect: bool) -> Extractor {
        let hazards = Arc::new(HazardHandler::new(
            world.clone(),
            world.clone(),
            world.clone(),
            HazardPolicy::default(),
        ));
        let approach = Arc::new(Approach::new(
            world.clone(),
            world.clone(),
            hazards.clone(),
            TraversalRules::mining(["iron_ore".to_string()]),
            Duration::from_secs(1),
            2,
        ));
        let state = StateCell::new();
        state.set(crate::state::LoopState::Starting);
        Extractor {
            world: world.clone(),
            presence: world.clone(),
            interaction: world.clone(),
            tools: ToolManager::new(world),
            hazards,
            approach,
            stats: StatsTracker::new(),
            bus: EventBus::default(),
            state,
            tool_class: "pickaxe".to_string(),
            collect_radius: collect.then_some(4.0),
        }
    }

    fn iron(pos: BlockPos) -> OreSite {
        OreSite {
            position: pos,
            block_type: "iron_ore".to_string(),
            priority: 2,
        }
    }

    #[tokio::test]
    async fn single_site_is_mined_and_explored() {
        let target = BlockPos::new(1, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(target, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ex = extractor(world.clone(), true);
        let mut session = MiningSession::new(16);
        session.add_candidate(iron(target));

        let outcome = ex
            .extract(&iron(target), &mut session, &StopSignal::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExtractOutcome::Mined {
                vein_added: 0,
                collected: 1
            }
        );
        assert!(session.candidates().is_empty());
        assert!(session.is_explored(target));
        assert_eq!(ex.stats.total(), 1);
        assert!(world.inventory().iter().any(|i| i.name == "iron_ore"));
    }

    #[tokio::test]
    async fn hazard_and_equip_precede_dig() {
        let target = BlockPos::new(4, 10, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 10, 0))
                .with_block(target, "iron_ore")
                .with_block(target.offset(0, 0, 1), "lava")
                .with_item(Item::new("iron_pickaxe", 1))
                .with_item(Item::new("cobblestone", 4)),
        );
        let ex = extractor(world.clone(), false);
        let mut session = MiningSession::new(16);
        ex.extract(&iron(target), &mut session, &StopSignal::new())
            .await
            .unwrap();

        let ops = world.ops();
        let place = ops
            .iter()
            .position(|op| matches!(op, SimOp::Place { .. }))
            .unwrap();
        let equip = ops
            .iter()
            .position(|op| *op == SimOp::Equip("iron_pickaxe".to_string()))
            .unwrap();
        let dig = ops.iter().position(|op| *op == SimOp::Dig(target)).unwrap();
        assert!(place < equip && equip < dig);
    }

    #[tokio::test]
    async fn vein_is_followed_without_double_counting() {
        let target = BlockPos::new(2, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(target, "iron_ore")
                .with_block(target.offset(1, 0, 0), "iron_ore")
                .with_block(target.offset(0, 1, 1), "iron_ore")
                .with_block(target.offset(1, 1, 1), "iron_ore")
                .with_block(target.offset(0, 0, 1), "coal_ore")
                .with_item(Item::new("stone_pickaxe", 1)),
        );
        let ex = extractor(world, false);
        let mut session = MiningSession::new(16);
        session.add_candidate(iron(target));

        let outcome = ex
            .extract(&iron(target), &mut session, &StopSignal::new())
            .await
            .unwrap();
        // (1,1,1) is a pure corner and is not probed.
        assert_eq!(
            outcome,
            ExtractOutcome::Mined {
                vein_added: 2,
                collected: 0
            }
        );
        assert!(!session.candidates().contains(target));

        // Rediscovering the mined site changes nothing.
        assert!(!session.add_candidate(iron(target)));
        assert!(!session.mark_explored(target));
        assert_eq!(ex.stats.total(), 1);
    }

    #[tokio::test]
    async fn vanished_site_is_dropped_without_travel() {
        let target = BlockPos::new(3, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ex = extractor(world.clone(), false);
        let mut session = MiningSession::new(16);
        session.add_candidate(iron(target));

        let outcome = ex
            .extract(&iron(target), &mut session, &StopSignal::new())
            .await
            .unwrap();
        assert_eq!(outcome, ExtractOutcome::Vanished);
        assert!(session.is_explored(target));
        assert!(world.ops().is_empty());
    }

    #[tokio::test]
    async fn missing_tool_fails_the_extraction_only() {
        let target = BlockPos::new(1, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(target, "iron_ore"),
        );
        let ex = extractor(world.clone(), false);
        let mut session = MiningSession::new(16);
        session.add_candidate(iron(target));

        let err = ex
            .extract(&iron(target), &mut session, &StopSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::NoTool { .. }));
        assert!(!err.is_fatal());
        assert!(session.candidates().contains(target));
        assert!(!world.ops().iter().any(|op| matches!(op, SimOp::Dig(_))));
    }

    #[tokio::test]
    async fn stopped_before_dig_does_not_dig() {
        let target = BlockPos::new(1, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(target, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ex = extractor(world.clone(), false);
        let stop = StopSignal::new();
        stop.trigger();
        let err = ex
            .extract(&iron(target), &mut MiningSession::new(16), &stop)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        assert!(world.ops().is_empty());
    }
}
