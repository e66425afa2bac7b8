//! [`HazardHandler`] – liquid mitigation around a dig target.
//!
//! Before a target is dug its six face neighbours are inspected:
//!
//! | Neighbour | Policy flag   | Action                                            |
//! |-----------|---------------|---------------------------------------------------|
//! | lava      | `avoid_lava`  | place the safety block into it, against the target |
//! | water     | `avoid_water` | scoop it with an empty bucket                      |
//!
//! Every action is best-effort: a failure is logged and counted in the
//! [`HazardReport`], never returned, and the caller digs regardless.
//! Placement success is not re-verified before digging.
//!
//! [`HazardHandler::bridge`] covers the navigation side: when the agent is
//! standing over an escape hazard it places the safety block underneath.

use std::sync::Arc;

use quarry_types::{BlockInfo, BlockPos, EquipSlot, QuarryError};
use quarry_world::{Interaction, InventoryPort, WorldProbe};
use tracing::{debug, info, warn};

use crate::cancel::StopSignal;

/// The six axis-aligned face offsets.
pub const FACES: [BlockPos; 6] = [
    BlockPos::new(1, 0, 0),
    BlockPos::new(-1, 0, 0),
    BlockPos::new(0, 1, 0),
    BlockPos::new(0, -1, 0),
    BlockPos::new(0, 0, 1),
    BlockPos::new(0, 0, -1),
];

const UP: BlockPos = BlockPos::new(0, 1, 0);

/// What the handler is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HazardPolicy {
    pub avoid_lava: bool,
    pub avoid_water: bool,
    /// Solid block item used for capping lava and bridging.
    pub safety_block: String,
    /// Empty-bucket item used to remove water sources.
    pub bucket: String,
    /// Block types that trigger bridging when found under the agent.
    pub escape_hazards: Vec<String>,
}

impl Default for HazardPolicy {
    fn default() -> Self {
        Self {
            avoid_lava: true,
            avoid_water: true,
            safety_block: "cobblestone".to_string(),
            bucket: "bucket".to_string(),
            escape_hazards: vec!["lava".to_string(), "water".to_string()],
        }
    }
}

/// Outcome of one [`HazardHandler::mitigate`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HazardReport {
    pub lava_capped: u32,
    pub water_cleared: u32,
    pub failures: u32,
}

impl HazardReport {
    pub fn is_clear(&self) -> bool {
        self.lava_capped == 0 && self.water_cleared == 0 && self.failures == 0
    }
}

pub struct HazardHandler {
    world: Arc<dyn WorldProbe>,
    inventory: Arc<dyn InventoryPort>,
    interaction: Arc<dyn Interaction>,
    policy: HazardPolicy,
}

impl HazardHandler {
    pub fn new(
        world: Arc<dyn WorldProbe>,
        inventory: Arc<dyn InventoryPort>,
        interaction: Arc<dyn Interaction>,
        policy: HazardPolicy,
    ) -> Self {
        Self {
            world,
            inventory,
            interaction,
            policy,
        }
    }

    /// Neutralise liquids next to `target`.
    ///
    /// # Errors
    ///
    /// Only [`QuarryError::Cancelled`], when `stop` is raised between two
    /// hazard actions.  Individual action failures are logged and counted.
    pub async fn mitigate(
        &self,
        target: BlockPos,
        stop: &StopSignal,
    ) -> Result<HazardReport, QuarryError> {
        let mut report = HazardReport::default();
        let Some(target_block) = self.world.block_at(target) else {
            return Ok(report);
        };

        for face in FACES {
            let Some(neighbour) = self.world.block_at(target + face) else {
                continue;
            };

            if neighbour.is_lava() && self.policy.avoid_lava {
                stop.checkpoint()?;
                match self.cap_lava(&target_block, face).await {
                    Ok(()) => {
                        info!(target = %target, lava = %neighbour.position, "capped lava");
                        report.lava_capped += 1;
                    }
                    Err(e) => {
                        warn!(target = %target, lava = %neighbour.position, error = %e, "lava capping failed; digging anyway");
                        report.failures += 1;
                    }
                }
            } else if neighbour.is_water() && self.policy.avoid_water {
                stop.checkpoint()?;
                match self.clear_water(&neighbour).await {
                    Ok(()) => {
                        info!(target = %target, water = %neighbour.position, "removed water");
                        report.water_cleared += 1;
                    }
                    Err(e) => {
                        warn!(target = %target, water = %neighbour.position, error = %e, "water removal failed; digging anyway");
                        report.failures += 1;
                    }
                }
            }
        }

        if !report.is_clear() {
            debug!(target = %target, ?report, "hazard pass finished");
        }
        Ok(report)
    }

    /// `true` when the block under `agent` is one of the escape hazards.
    pub fn needs_bridge(&self, agent: BlockPos) -> bool {
        self.world
            .block_at(agent.below())
            .is_some_and(|b| self.is_escape_hazard(&b))
    }

    /// Place the safety block under the agent, on top of whatever lies
    /// beneath the hazard.
    ///
    /// # Errors
    ///
    /// [`QuarryError::NoTool`] when no safety block is held, or the
    /// placement error from the world.
    pub async fn bridge(&self, agent: BlockPos) -> Result<(), QuarryError> {
        let support = agent.below().below();
        let reference = self
            .world
            .block_at(support)
            .unwrap_or_else(|| BlockInfo::new("unknown", support));
        self.equip_named(&self.policy.safety_block).await?;
        self.interaction.place_block(&reference, UP).await?;
        info!(at = %agent.below(), block = %self.policy.safety_block, "bridged over hazard");
        Ok(())
    }

    fn is_escape_hazard(&self, block: &BlockInfo) -> bool {
        self.policy
            .escape_hazards
            .iter()
            .any(|h| block.name.contains(h.as_str()))
    }

    async fn cap_lava(&self, target: &BlockInfo, face: BlockPos) -> Result<(), QuarryError> {
        self.equip_named(&self.policy.safety_block).await?;
        self.interaction.place_block(target, face).await
    }

    async fn clear_water(&self, water: &BlockInfo) -> Result<(), QuarryError> {
        self.equip_named(&self.policy.bucket).await?;
        self.interaction.use_held_item_on(water).await
    }

    async fn equip_named(&self, name: &str) -> Result<(), QuarryError> {
        let item = self
            .inventory
            .items()
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| QuarryError::NoTool {
                class: name.to_string(),
            })?;
        self.inventory.equip(&item, EquipSlot::Hand).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_types::Item;
    use quarry_world::{SimOp, SimWorld};

    fn handler(world: Arc<SimWorld>, policy: HazardPolicy) -> HazardHandler {
        HazardHandler::new(world.clone(), world.clone(), world, policy)
    }

    const TARGET: BlockPos = BlockPos::new(0, 10, 0);

    #[tokio::test]
    async fn lava_neighbour_is_capped_with_safety_block() {
        let world = Arc::new(
            SimWorld::new()
                .with_block(TARGET, "iron_ore")
                .with_block(TARGET.offset(1, 0, 0), "lava")
                .with_item(Item::new("cobblestone", 4)),
        );
        let h = handler(world.clone(), HazardPolicy::default());
        let report = h.mitigate(TARGET, &StopSignal::new()).await.unwrap();

        assert_eq!(report.lava_capped, 1);
        assert_eq!(world.block_name(TARGET.offset(1, 0, 0)), "cobblestone");
        assert_eq!(world.block_name(TARGET), "iron_ore");
    }

    #[tokio::test]
    async fn water_neighbour_is_scooped() {
        let world = Arc::new(
            SimWorld::new()
                .with_block(TARGET, "coal_ore")
                .with_block(TARGET.offset(0, 1, 0), "water")
                .with_item(Item::new("bucket", 1)),
        );
        let h = handler(world.clone(), HazardPolicy::default());
        let report = h.mitigate(TARGET, &StopSignal::new()).await.unwrap();

        assert_eq!(report.water_cleared, 1);
        assert_eq!(world.block_name(TARGET.offset(0, 1, 0)), "air");
    }

    #[tokio::test]
    async fn disabled_policy_leaves_liquids_alone() {
        let world = Arc::new(
            SimWorld::new()
                .with_block(TARGET, "iron_ore")
                .with_block(TARGET.offset(0, 0, 1), "lava")
                .with_block(TARGET.offset(0, 0, -1), "water")
                .with_item(Item::new("cobblestone", 4))
                .with_item(Item::new("bucket", 1)),
        );
        let policy = HazardPolicy {
            avoid_lava: false,
            avoid_water: false,
            ..HazardPolicy::default()
        };
        let report = handler(world.clone(), policy)
            .mitigate(TARGET, &StopSignal::new())
            .await
            .unwrap();
        assert!(report.is_clear());
        assert!(world.ops().is_empty());
    }

    #[tokio::test]
    async fn failures_are_counted_not_returned() {
        let world = Arc::new(
            SimWorld::new()
                .with_block(TARGET, "iron_ore")
                .with_block(TARGET.offset(-1, 0, 0), "lava")
                .with_block(TARGET.offset(0, -1, 0), "water"),
        );
        let report = handler(world, HazardPolicy::default())
            .mitigate(TARGET, &StopSignal::new())
            .await
            .unwrap();
        assert_eq!(report.failures, 2);
        assert_eq!(report.lava_capped, 0);
    }

    #[tokio::test]
    async fn rejected_placement_is_best_effort() {
        let world = Arc::new(
            SimWorld::new()
                .with_block(TARGET, "iron_ore")
                .with_block(TARGET.offset(1, 0, 0), "lava")
                .with_item(Item::new("cobblestone", 4)),
        );
        world.set_fail_placement(true);
        let report = handler(world.clone(), HazardPolicy::default())
            .mitigate(TARGET, &StopSignal::new())
            .await
            .unwrap();
        assert_eq!(report.failures, 1);
        assert_eq!(world.block_name(TARGET.offset(1, 0, 0)), "lava");
    }

    #[tokio::test]
    async fn raised_stop_cancels_before_acting() {
        let world = Arc::new(
            SimWorld::new()
                .with_block(TARGET, "iron_ore")
                .with_block(TARGET.offset(1, 0, 0), "lava")
                .with_item(Item::new("cobblestone", 4)),
        );
        let stop = StopSignal::new();
        stop.trigger();
        let result = handler(world.clone(), HazardPolicy::default())
            .mitigate(TARGET, &stop)
            .await;
        assert!(matches!(result, Err(QuarryError::Cancelled)));
        assert!(world.ops().is_empty());
    }

    #[tokio::test]
    async fn bridge_places_safety_block_under_agent() {
        let agent = BlockPos::new(0, 65, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_block(agent.below(), "lava")
                .with_block(agent.below().below(), "stone")
                .with_item(Item::new("cobblestone", 1)),
        );
        let h = handler(world.clone(), HazardPolicy::default());
        assert!(h.needs_bridge(agent));

        h.bridge(agent).await.unwrap();
        assert_eq!(world.block_name(agent.below()), "cobblestone");
        assert!(!h.needs_bridge(agent));
        assert!(world.ops().contains(&SimOp::Equip("cobblestone".to_string())));
    }

    #[tokio::test]
    async fn bridge_without_safety_block_is_no_tool() {
        let agent = BlockPos::new(0, 65, 0);
        let world = Arc::new(SimWorld::new().with_block(agent.below(), "lava"));
        let err = handler(world, HazardPolicy::default())
            .bridge(agent)
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::NoTool { class } if class == "cobblestone"));
    }
}
