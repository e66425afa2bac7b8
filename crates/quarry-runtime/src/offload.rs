//! [`InventoryOffloadManager`] – empties the inventory into the nearest
//! known chest.
//!
//! The container handle is held by a [`ContainerGuard`], so the chest is
//! closed on every exit path: normal completion, a rejected deposit, a stop
//! between two deposits, or the whole task being aborted mid-await.

use std::sync::Arc;

use quarry_kernel::StopSignal;
use quarry_memory::ChestRegistry;
use quarry_middleware::EventBus;
use quarry_types::{BlockInfo, BlockPos, MiningEvent, QuarryError};
use quarry_world::{ContainerHandle, ContainerPort, InventoryPort, Presence, WorldProbe};
use tracing::{debug, info, warn};

use crate::config::MiningConfig;
use crate::navigation::Approach;

const SOURCE: &str = "quarry-runtime::offload";

// ─────────────────────────────────────────────────────────────────────────────
// ContainerGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Closes the container when dropped.
pub struct ContainerGuard {
    port: Arc<dyn ContainerPort>,
    handle: Option<ContainerHandle>,
}

impl ContainerGuard {
    pub fn new(port: Arc<dyn ContainerPort>, handle: ContainerHandle) -> Self {
        Self {
            port,
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> Option<&ContainerHandle> {
        self.handle.as_ref()
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.port.close_container(&handle);
            debug!(chest = %handle.position, "container closed");
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        self.release();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InventoryOffloadManager
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReport {
    pub chest: BlockPos,
    pub stacks: u32,
    pub items: u32,
}

pub struct InventoryOffloadManager {
    world: Arc<dyn WorldProbe>,
    presence: Arc<dyn Presence>,
    inventory: Arc<dyn InventoryPort>,
    containers: Arc<dyn ContainerPort>,
    approach: Arc<Approach>,
    chests: ChestRegistry,
    bus: EventBus,
    config: Arc<MiningConfig>,
}

impl InventoryOffloadManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world: Arc<dyn WorldProbe>,
        presence: Arc<dyn Presence>,
        inventory: Arc<dyn InventoryPort>,
        containers: Arc<dyn ContainerPort>,
        approach: Arc<Approach>,
        chests: ChestRegistry,
        bus: EventBus,
        config: Arc<MiningConfig>,
    ) -> Self {
        Self {
            world,
            presence,
            inventory,
            containers,
            approach,
            chests,
            bus,
            config,
        }
    }

    /// Free slots at or below the configured minimum.
    pub fn needs_offload(&self) -> bool {
        self.inventory.free_slots() <= self.config.min_free_slots
    }

    /// Travel to the nearest chest and deposit every stack that is not kept.
    ///
    /// # Errors
    ///
    /// * [`QuarryError::NoChestKnown`] – no chest registered.
    /// * [`QuarryError::DepositFailed`] – at least one stack was rejected;
    ///   the others were still deposited.
    /// * [`QuarryError::Cancelled`] – stopped before or between deposits.
    /// * navigation and container errors from the world.
    pub async fn deposit_all(&self, stop: &StopSignal) -> Result<DepositReport, QuarryError> {
        let agent = self.presence.position().ok_or(QuarryError::NotSpawned)?;
        let chest = self.chests.nearest(agent).ok_or(QuarryError::NoChestKnown)?;
        info!(chest = %chest, free = self.inventory.free_slots(), "offloading");

        self.approach.reach(chest, stop).await?;

        let block = self
            .world
            .block_at(chest)
            .unwrap_or_else(|| BlockInfo::new("chest", chest));
        let handle = self.containers.open_container(&block).await?;
        let guard = ContainerGuard::new(self.containers.clone(), handle);
        stop.checkpoint()?;

        let mut report = DepositReport {
            chest,
            stacks: 0,
            items: 0,
        };
        let mut rejected = 0u32;
        for item in self.inventory.items() {
            if self.config.is_kept(&item.name) {
                continue;
            }
            stop.checkpoint()?;
            let Some(handle) = guard.handle() else { break };
            match self.containers.deposit(handle, &item.name, item.count).await {
                Ok(()) => {
                    report.stacks += 1;
                    report.items += item.count;
                }
                Err(e) => {
                    warn!(item = %item.name, count = item.count, error = %e, "deposit rejected");
                    rejected += 1;
                }
            }
        }
        guard.close();

        if report.stacks > 0 {
            self.bus.publish_mining(
                SOURCE,
                MiningEvent::Deposited {
                    stacks: report.stacks,
                    items: report.items,
                },
            );
        }
        info!(chest = %chest, stacks = report.stacks, items = report.items, rejected, "offload finished");
        if rejected > 0 {
            return Err(QuarryError::DepositFailed(format!(
                "{rejected} stack(s) rejected by chest at {chest}"
            )));
        }
        Ok(report)
    }
}
