//! Inventory access and block/entity interaction.

use async_trait::async_trait;
use quarry_types::{BlockInfo, BlockPos, Entity, EquipSlot, Item, QuarryError};

/// The agent's inventory.
#[async_trait]
pub trait InventoryPort: Send + Sync {
    /// Every stack currently held, in slot order.
    fn items(&self) -> Vec<Item>;

    /// Number of completely empty inventory slots.
    fn free_slots(&self) -> u32;

    /// Move `item` into `slot`.
    async fn equip(&self, item: &Item, slot: EquipSlot) -> Result<(), QuarryError>;
}

/// Actions the agent performs on the world.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Break `block` with whatever is currently held.
    async fn dig(&self, block: &BlockInfo) -> Result<(), QuarryError>;

    /// Place the held block against `reference`, on the face pointed to by
    /// the unit vector `face`.  The new block lands at
    /// `reference.position + face`.
    async fn place_block(&self, reference: &BlockInfo, face: BlockPos) -> Result<(), QuarryError>;

    /// Use the held item on `block` (e.g. scoop a liquid with a bucket).
    async fn use_held_item_on(&self, block: &BlockInfo) -> Result<(), QuarryError>;

    /// Walk over and pick up a dropped item entity.
    async fn collect_item(&self, entity: &Entity) -> Result<(), QuarryError>;
}
