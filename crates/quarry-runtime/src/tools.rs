//! [`ToolManager`] – equips the best tool of a class.
//!
//! Tiers, lowest to highest:
//!
//! | Tier | Item prefix |
//! |------|-------------|
//! | [`ToolTier::Wooden`]    | `wooden_`    |
//! | [`ToolTier::Golden`]    | `golden_`    |
//! | [`ToolTier::Stone`]     | `stone_`     |
//! | [`ToolTier::Iron`]      | `iron_`      |
//! | [`ToolTier::Diamond`]   | `diamond_`   |
//! | [`ToolTier::Netherite`] | `netherite_` |
//!
//! Items of the class with an unknown material rank below wooden.

use std::sync::Arc;

use quarry_types::{EquipSlot, Item, QuarryError};
use quarry_world::InventoryPort;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolTier {
    Unknown,
    Wooden,
    Golden,
    Stone,
    Iron,
    Diamond,
    Netherite,
}

impl ToolTier {
    /// Tier from an item name such as `"iron_pickaxe"`.
    pub fn of(item_name: &str) -> Self {
        const PREFIXES: [(&str, ToolTier); 6] = [
            ("netherite_", ToolTier::Netherite),
            ("diamond_", ToolTier::Diamond),
            ("iron_", ToolTier::Iron),
            ("stone_", ToolTier::Stone),
            ("golden_", ToolTier::Golden),
            ("wooden_", ToolTier::Wooden),
        ];
        PREFIXES
            .iter()
            .find(|(prefix, _)| item_name.starts_with(prefix))
            .map(|(_, tier)| *tier)
            .unwrap_or(ToolTier::Unknown)
    }
}

pub struct ToolManager {
    inventory: Arc<dyn InventoryPort>,
}

impl ToolManager {
    pub fn new(inventory: Arc<dyn InventoryPort>) -> Self {
        Self { inventory }
    }

    /// Highest-tier item whose name contains `class`.  The first one in
    /// inventory order wins a tie.
    pub fn best_tool(&self, class: &str) -> Option<Item> {
        self.inventory
            .items()
            .into_iter()
            .filter(|i| i.name.contains(class))
            .reduce(|best, item| {
                if ToolTier::of(&item.name) > ToolTier::of(&best.name) {
                    item
                } else {
                    best
                }
            })
    }

    /// Equip the best tool of `class` in the main hand.
    ///
    /// # Errors
    ///
    /// [`QuarryError::NoTool`] when no item of the class is held, or the
    /// equip failure from the inventory.
    pub async fn equip_best_tool(&self, class: &str) -> Result<Item, QuarryError> {
        let tool = self.best_tool(class).ok_or_else(|| QuarryError::NoTool {
            class: class.to_string(),
        })?;
        self.inventory.equip(&tool, EquipSlot::Hand).await?;
        info!(tool = %tool.name, "equipped");
        Ok(tool)
    }
}
