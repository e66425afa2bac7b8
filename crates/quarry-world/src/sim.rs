//! In-process simulated world for tests and demos without a game server.
//!
//! [`SimWorld`] implements every capability trait against a small in-memory
//! model: a sparse block map (absent means air), an inventory with a fixed
//! slot count, dropped-item entities, and chests.  Every external operation
//! is appended to an operation log ([`SimOp`]) so tests can assert ordering
//! and the absence of work after a stop.
//!
//! Failure injection covers the paths the mining core must survive:
//! unreachable goals, navigation that never finishes, navigation held open
//! until released, failing placements, and failing deposits.
//!
//! # Example
//!
//! ```rust
//! use quarry_types::{BlockPos, Item};
//! use quarry_world::{SimWorld, WorldProbe};
//!
//! let world = SimWorld::new()
//!     .with_agent_at(BlockPos::new(0, 64, 0))
//!     .with_block(BlockPos::new(1, 64, 0), "iron_ore")
//!     .with_item(Item::new("iron_pickaxe", 1));
//!
//! assert_eq!(world.block_at(BlockPos::new(1, 64, 0)).unwrap().name, "iron_ore");
//! assert!(world.block_at(BlockPos::new(2, 64, 0)).unwrap().is_air());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use quarry_types::{
    BlockInfo, BlockPos, Entity, EntityKind, EquipSlot, Goal, Item, QuarryError, TraversalRules,
};
use tokio::sync::watch;
use tracing::debug;

use crate::container::{ContainerHandle, ContainerPort};
use crate::inventory::{Interaction, InventoryPort};
use crate::navigator::Navigator;
use crate::probe::{Presence, WorldProbe};

/// Default number of inventory slots (a standard player inventory).
const DEFAULT_CAPACITY: u32 = 36;
/// Maximum items per stack.
const STACK_SIZE: u32 = 64;

// ────────────────────────────────────────────────────────────────────────────
// Operation log
// ────────────────────────────────────────────────────────────────────────────

/// One external operation performed against the simulated world.
#[derive(Debug, Clone, PartialEq)]
pub enum SimOp {
    Navigate(Goal),
    StopNavigation,
    ClearMovement,
    Equip(String),
    Dig(BlockPos),
    Place { at: BlockPos, block: String },
    UseItem { item: String, at: BlockPos },
    Collect(u64),
    Open(BlockPos),
    Deposit { item: String, count: u32 },
    Close(BlockPos),
}

// ────────────────────────────────────────────────────────────────────────────
// Internal state
// ────────────────────────────────────────────────────────────────────────────

struct SimState {
    blocks: HashMap<BlockPos, String>,
    agent: Option<BlockPos>,
    alive: bool,
    health: f32,
    inventory: Vec<Item>,
    capacity: u32,
    held: Option<String>,
    entities: Vec<Entity>,
    next_id: u64,
    chests: HashMap<BlockPos, Vec<Item>>,
    open: Option<ContainerHandle>,
    unreachable: HashSet<BlockPos>,
    stalled: HashSet<BlockPos>,
    nav_delay: Duration,
    deposit_delay: Duration,
    fail_placement: bool,
    fail_deposits: bool,
    ops: Vec<SimOp>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            blocks: HashMap::new(),
            agent: None,
            alive: true,
            health: 20.0,
            inventory: Vec::new(),
            capacity: DEFAULT_CAPACITY,
            held: None,
            entities: Vec::new(),
            next_id: 1,
            chests: HashMap::new(),
            open: None,
            unreachable: HashSet::new(),
            stalled: HashSet::new(),
            nav_delay: Duration::ZERO,
            deposit_delay: Duration::ZERO,
            fail_placement: false,
            fail_deposits: false,
            ops: Vec::new(),
        }
    }
}

impl SimState {
    fn add_item(&mut self, name: &str, mut count: u32) {
        for stack in self.inventory.iter_mut().filter(|s| s.name == name) {
            let room = STACK_SIZE.saturating_sub(stack.count);
            let moved = room.min(count);
            stack.count += moved;
            count -= moved;
        }
        while count > 0 && (self.inventory.len() as u32) < self.capacity {
            let moved = count.min(STACK_SIZE);
            self.inventory.push(Item::new(name, moved));
            count -= moved;
        }
    }

    fn take_item(&mut self, name: &str, mut count: u32) -> u32 {
        let mut taken = 0;
        for stack in self.inventory.iter_mut().filter(|s| s.name == name) {
            let moved = stack.count.min(count);
            stack.count -= moved;
            count -= moved;
            taken += moved;
        }
        self.inventory.retain(|s| s.count > 0);
        if let Some(held) = &self.held
            && !self.inventory.iter().any(|s| &s.name == held)
        {
            self.held = None;
        }
        taken
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// Simulated game world implementing every capability trait.
///
/// Build with the `with_*` methods, wrap in an `Arc`, and hand it to
/// [`AgentPorts::from_shared`][crate::registry::AgentPorts::from_shared].
/// Runtime mutators (`set_block`, `kill`, `release_navigation`, …) take
/// `&self` so tests can steer the world while a mining loop is running.
pub struct SimWorld {
    state: Mutex<SimState>,
    stop_tx: watch::Sender<u64>,
    gate_tx: watch::Sender<bool>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// An empty world: no agent, no blocks (all air), empty inventory.
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(0);
        let (gate_tx, _) = watch::channel(true);
        Self {
            state: Mutex::new(SimState::default()),
            stop_tx,
            gate_tx,
        }
    }

    /// A small deterministic world used by the demo CLI: the agent stands on
    /// a stone floor with a few ore veins, a lava pocket, a water pocket, and
    /// a chest next to the spawn point.
    pub fn demo() -> Self {
        let mut world = Self::new()
            .with_agent_at(BlockPos::new(0, 64, 0))
            .with_chest(BlockPos::new(-2, 64, 0))
            .with_item(Item::new("stone_pickaxe", 1).with_durability(131))
            .with_item(Item::new("iron_pickaxe", 1).with_durability(250))
            .with_item(Item::new("cobblestone", 32))
            .with_item(Item::new("bucket", 1));
        for x in -12..=12 {
            for z in -12..=12 {
                world = world.with_block(BlockPos::new(x, 63, z), "stone");
            }
        }
        let veins: [(&str, [i32; 3], i32); 4] = [
            ("coal_ore", [4, 64, 3], 4),
            ("iron_ore", [-5, 64, 6], 3),
            ("gold_ore", [7, 63, -6], 2),
            ("diamond_ore", [-8, 63, -8], 2),
        ];
        for (name, [x, y, z], len) in veins {
            for i in 0..len {
                world = world.with_block(BlockPos::new(x + i, y, z), name);
            }
        }
        world
            .with_block(BlockPos::new(-5, 65, 6), "lava")
            .with_block(BlockPos::new(4, 65, 3), "water")
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, op: SimOp) {
        debug!(?op, "sim op");
        self.lock().ops.push(op);
    }

    // ── Builder ───────────────────────────────────────────────────────────

    pub fn with_agent_at(self, pos: BlockPos) -> Self {
        self.lock().agent = Some(pos);
        self
    }

    pub fn with_block(self, pos: BlockPos, name: &str) -> Self {
        self.set_block(pos, name);
        self
    }

    pub fn with_item(self, item: Item) -> Self {
        self.lock().inventory.push(item);
        self
    }

    pub fn with_capacity(self, slots: u32) -> Self {
        self.lock().capacity = slots;
        self
    }

    /// Place an empty chest block at `pos`.
    pub fn with_chest(self, pos: BlockPos) -> Self {
        {
            let mut s = self.lock();
            s.blocks.insert(pos, "chest".to_string());
            s.chests.insert(pos, Vec::new());
        }
        self
    }

    /// Every navigation attempt whose goal is `pos` fails immediately.
    pub fn with_unreachable(self, pos: BlockPos) -> Self {
        self.lock().unreachable.insert(pos);
        self
    }

    /// Every navigation attempt whose goal is `pos` never completes on its
    /// own; it only ends when stopped.
    pub fn with_stalled(self, pos: BlockPos) -> Self {
        self.lock().stalled.insert(pos);
        self
    }

    /// Simulated travel time for every successful navigation.
    pub fn with_navigation_delay(self, delay: Duration) -> Self {
        self.lock().nav_delay = delay;
        self
    }

    /// Simulated transfer time for every deposit into an open container.
    pub fn with_deposit_delay(self, delay: Duration) -> Self {
        self.lock().deposit_delay = delay;
        self
    }

    // ── Runtime mutators ──────────────────────────────────────────────────

    /// Overwrite a block.  `"air"` removes it.
    pub fn set_block(&self, pos: BlockPos, name: &str) {
        let mut s = self.lock();
        if name == "air" {
            s.blocks.remove(&pos);
        } else {
            s.blocks.insert(pos, name.to_string());
        }
    }

    pub fn kill(&self) {
        let mut s = self.lock();
        s.alive = false;
        s.health = 0.0;
    }

    pub fn despawn(&self) {
        self.lock().agent = None;
    }

    pub fn set_fail_placement(&self, fail: bool) {
        self.lock().fail_placement = fail;
    }

    pub fn set_fail_deposits(&self, fail: bool) {
        self.lock().fail_deposits = fail;
    }

    /// Hold every subsequent navigation open until
    /// [`release_navigation`][Self::release_navigation] is called.  Held
    /// navigations ignore `stop_navigation`, like a pathfinder that reports
    /// success after the caller has given up on it.
    pub fn hold_navigation(&self) {
        self.gate_tx.send_replace(false);
    }

    pub fn release_navigation(&self) {
        self.gate_tx.send_replace(true);
    }

    // ── Inspection ────────────────────────────────────────────────────────

    pub fn ops(&self) -> Vec<SimOp> {
        self.lock().ops.clone()
    }

    pub fn block_name(&self, pos: BlockPos) -> String {
        self.lock()
            .blocks
            .get(&pos)
            .cloned()
            .unwrap_or_else(|| "air".to_string())
    }

    pub fn inventory(&self) -> Vec<Item> {
        self.lock().inventory.clone()
    }

    pub fn held(&self) -> Option<String> {
        self.lock().held.clone()
    }

    pub fn chest_contents(&self, pos: BlockPos) -> Vec<Item> {
        self.lock().chests.get(&pos).cloned().unwrap_or_default()
    }

    pub fn is_container_open(&self) -> bool {
        self.lock().open.is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Capability implementations
// ────────────────────────────────────────────────────────────────────────────

impl WorldProbe for SimWorld {
    fn block_at(&self, pos: BlockPos) -> Option<BlockInfo> {
        let name = self
            .lock()
            .blocks
            .get(&pos)
            .cloned()
            .unwrap_or_else(|| "air".to_string());
        Some(BlockInfo::new(name, pos))
    }

    fn entities_near(&self, center: BlockPos, radius: f64) -> Vec<Entity> {
        self.lock()
            .entities
            .iter()
            .filter(|e| e.position.distance_to(center) <= radius)
            .cloned()
            .collect()
    }
}

impl Presence for SimWorld {
    fn position(&self) -> Option<BlockPos> {
        self.lock().agent
    }

    fn is_alive(&self) -> bool {
        self.lock().alive
    }

    fn health(&self) -> f32 {
        self.lock().health
    }
}

#[async_trait]
impl Navigator for SimWorld {
    async fn path_to(&self, goal: Goal, _rules: &TraversalRules) -> Result<(), QuarryError> {
        self.record(SimOp::Navigate(goal));
        let mut stop_rx = self.stop_tx.subscribe();
        let mut gate_rx = self.gate_tx.subscribe();

        let (unreachable, stalled, delay) = {
            let s = self.lock();
            (
                s.unreachable.contains(&goal.position),
                s.stalled.contains(&goal.position),
                s.nav_delay,
            )
        };
        if unreachable {
            return Err(QuarryError::NavigationFailed {
                goal,
                reason: "no path".to_string(),
            });
        }

        let stopped = || QuarryError::NavigationFailed {
            goal,
            reason: "navigation stopped".to_string(),
        };
        if stalled {
            let _ = stop_rx.changed().await;
            return Err(stopped());
        }
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => return Err(stopped()),
            }
        }
        loop {
            let open = *gate_rx.borrow_and_update();
            if open {
                break;
            }
            if gate_rx.changed().await.is_err() {
                return Err(stopped());
            }
        }

        let arrival = if goal.tolerance == 0 {
            goal.position
        } else {
            goal.position.offset(0, 1, 0)
        };
        self.lock().agent = Some(arrival);
        Ok(())
    }

    fn stop_navigation(&self) {
        self.record(SimOp::StopNavigation);
        self.stop_tx.send_modify(|epoch| *epoch += 1);
    }

    fn clear_movement_intent(&self) {
        self.record(SimOp::ClearMovement);
    }
}

#[async_trait]
impl InventoryPort for SimWorld {
    fn items(&self) -> Vec<Item> {
        self.lock().inventory.clone()
    }

    fn free_slots(&self) -> u32 {
        let s = self.lock();
        s.capacity.saturating_sub(s.inventory.len() as u32)
    }

    async fn equip(&self, item: &Item, _slot: EquipSlot) -> Result<(), QuarryError> {
        self.record(SimOp::Equip(item.name.clone()));
        let mut s = self.lock();
        if !s.inventory.iter().any(|i| i.name == item.name) {
            return Err(QuarryError::capability(
                "equip",
                format!("'{}' is not in the inventory", item.name),
            ));
        }
        s.held = Some(item.name.clone());
        Ok(())
    }
}

#[async_trait]
impl Interaction for SimWorld {
    async fn dig(&self, block: &BlockInfo) -> Result<(), QuarryError> {
        self.record(SimOp::Dig(block.position));
        let mut s = self.lock();
        let Some(name) = s.blocks.remove(&block.position) else {
            return Err(QuarryError::capability(
                "dig",
                format!("nothing to dig at {}", block.position),
            ));
        };
        let id = s.next_id;
        s.next_id += 1;
        s.entities.push(Entity {
            id,
            kind: EntityKind::DroppedItem,
            position: block.position,
            item: Some(name),
        });
        Ok(())
    }

    async fn place_block(&self, reference: &BlockInfo, face: BlockPos) -> Result<(), QuarryError> {
        let at = reference.position + face;
        let mut s = self.lock();
        let Some(held) = s.held.clone() else {
            return Err(QuarryError::capability("place", "nothing held"));
        };
        s.ops.push(SimOp::Place {
            at,
            block: held.clone(),
        });
        if s.fail_placement {
            return Err(QuarryError::capability("place", "placement rejected"));
        }
        if s.take_item(&held, 1) == 0 {
            return Err(QuarryError::capability("place", format!("out of {held}")));
        }
        s.blocks.insert(at, held);
        Ok(())
    }

    async fn use_held_item_on(&self, block: &BlockInfo) -> Result<(), QuarryError> {
        let mut s = self.lock();
        let held = s.held.clone().unwrap_or_default();
        s.ops.push(SimOp::UseItem {
            item: held.clone(),
            at: block.position,
        });
        if held != "bucket" || !block.is_water() {
            return Err(QuarryError::capability(
                "use item",
                format!("'{held}' has no effect on {}", block.name),
            ));
        }
        s.blocks.remove(&block.position);
        s.take_item("bucket", 1);
        s.add_item("water_bucket", 1);
        Ok(())
    }

    async fn collect_item(&self, entity: &Entity) -> Result<(), QuarryError> {
        self.record(SimOp::Collect(entity.id));
        let mut s = self.lock();
        let Some(idx) = s.entities.iter().position(|e| e.id == entity.id) else {
            return Err(QuarryError::capability("collect", "entity is gone"));
        };
        let taken = s.entities.remove(idx);
        if let Some(name) = taken.item {
            s.add_item(&name, 1);
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerPort for SimWorld {
    async fn open_container(&self, block: &BlockInfo) -> Result<ContainerHandle, QuarryError> {
        self.record(SimOp::Open(block.position));
        let mut s = self.lock();
        if !s.chests.contains_key(&block.position) {
            return Err(QuarryError::capability(
                "open container",
                format!("no container at {}", block.position),
            ));
        }
        let handle = ContainerHandle {
            id: s.next_id,
            position: block.position,
        };
        s.next_id += 1;
        s.open = Some(handle.clone());
        Ok(handle)
    }

    async fn deposit(
        &self,
        handle: &ContainerHandle,
        item_name: &str,
        count: u32,
    ) -> Result<(), QuarryError> {
        self.record(SimOp::Deposit {
            item: item_name.to_string(),
            count,
        });
        let delay = self.lock().deposit_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut s = self.lock();
        if s.open.as_ref() != Some(handle) {
            return Err(QuarryError::DepositFailed("container is not open".to_string()));
        }
        if s.fail_deposits {
            return Err(QuarryError::DepositFailed("container is full".to_string()));
        }
        let moved = s.take_item(item_name, count);
        if let Some(contents) = s.chests.get_mut(&handle.position) {
            contents.push(Item::new(item_name, moved));
        }
        Ok(())
    }

    fn close_container(&self, handle: &ContainerHandle) {
        let mut s = self.lock();
        s.ops.push(SimOp::Close(handle.position));
        if s.open.as_ref() == Some(handle) {
            s.open = None;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
