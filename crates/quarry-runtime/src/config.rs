//! [`MiningConfig`] – immutable settings handed to every component at
//! construction.
//!
//! Every field has a default, so a partial `[mining]` table in a TOML file
//! deserialises cleanly.

use std::collections::BTreeMap;
use std::time::Duration;

use quarry_kernel::HazardPolicy;
use quarry_perception::PriorityTable;
use quarry_types::QuarryError;
use serde::{Deserialize, Serialize};

/// Largest accepted scan radius on either axis.  The scan visits every
/// block of the box, so the cost grows with the cube of the radius.
pub const MAX_SCAN_RADIUS: i32 = 64;

/// Largest accepted exploration radius.
pub const MAX_SEARCH_RADIUS: i32 = 512;

fn default_priorities() -> BTreeMap<String, u32> {
    [
        ("diamond_ore", 5),
        ("emerald_ore", 5),
        ("gold_ore", 3),
        ("iron_ore", 3),
        ("lapis_ore", 2),
        ("redstone_ore", 2),
        ("copper_ore", 1),
        ("coal_ore", 1),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Target block type → positive weight.
    pub priorities: BTreeMap<String, u32>,
    pub scan_horizontal_radius: i32,
    pub scan_vertical_radius: i32,
    /// Offload once free inventory slots drop to this value or below.
    pub min_free_slots: u32,
    /// Items never deposited.  Matched by substring.
    pub keep_items: Vec<String>,
    /// Tool class required for digging, matched by substring.
    pub tool_class: String,
    pub search_radius_initial: i32,
    pub search_radius_step: i32,
    pub search_radius_max: i32,
    pub navigation_timeout_secs: u64,
    pub approach_tolerance: u32,
    pub loop_delay_ms: u64,
    pub error_backoff_ms: u64,
    pub avoid_lava: bool,
    pub avoid_water: bool,
    pub safety_block: String,
    /// Block types under the agent that trigger bridging.
    pub escape_hazards: Vec<String>,
    pub collect_drops: bool,
    pub collect_radius: f64,
    /// Consecutive failures on one target before it is abandoned.
    pub stuck_threshold: usize,
    pub stop_on_low_health: bool,
    pub low_health_threshold: f32,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            priorities: default_priorities(),
            scan_horizontal_radius: 8,
            scan_vertical_radius: 4,
            min_free_slots: 3,
            keep_items: strings(&["pickaxe", "bucket", "torch"]),
            tool_class: "pickaxe".to_string(),
            search_radius_initial: 16,
            search_radius_step: 16,
            search_radius_max: 64,
            navigation_timeout_secs: 10,
            approach_tolerance: 2,
            loop_delay_ms: 100,
            error_backoff_ms: 1000,
            avoid_lava: true,
            avoid_water: true,
            safety_block: "cobblestone".to_string(),
            escape_hazards: strings(&["lava", "water"]),
            collect_drops: true,
            collect_radius: 4.0,
            stuck_threshold: 3,
            stop_on_low_health: true,
            low_health_threshold: 6.0,
        }
    }
}

impl MiningConfig {
    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), QuarryError> {
        let bad = |msg: String| Err(QuarryError::Config(msg));

        if !self.priorities.values().any(|w| *w > 0) {
            return bad("priority table has no positive weights".to_string());
        }
        if self.scan_horizontal_radius < 0 || self.scan_vertical_radius < 0 {
            return bad("scan radii must not be negative".to_string());
        }
        if self.scan_horizontal_radius > MAX_SCAN_RADIUS
            || self.scan_vertical_radius > MAX_SCAN_RADIUS
        {
            return bad(format!("scan radii must not exceed {MAX_SCAN_RADIUS}"));
        }
        if self.search_radius_initial <= 0 || self.search_radius_step <= 0 {
            return bad("search radius and step must be positive".to_string());
        }
        if self.search_radius_max < self.search_radius_initial {
            return bad(format!(
                "search_radius_max ({}) is below search_radius_initial ({})",
                self.search_radius_max, self.search_radius_initial
            ));
        }
        if self.search_radius_max > MAX_SEARCH_RADIUS {
            return bad(format!(
                "search_radius_max ({}) exceeds {MAX_SEARCH_RADIUS}",
                self.search_radius_max
            ));
        }
        if self.navigation_timeout_secs == 0 {
            return bad("navigation_timeout_secs must be positive".to_string());
        }
        if self.tool_class.is_empty() || self.safety_block.is_empty() {
            return bad("tool_class and safety_block must be set".to_string());
        }
        if self.stuck_threshold == 0 {
            return bad("stuck_threshold must be at least 1".to_string());
        }
        if !self.collect_radius.is_finite() || self.collect_radius < 0.0 {
            return bad("collect_radius must be a non-negative number".to_string());
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn priority_table(&self) -> PriorityTable {
        PriorityTable::new(self.priorities.clone().into_iter().collect())
    }

    pub fn hazard_policy(&self) -> HazardPolicy {
        HazardPolicy {
            avoid_lava: self.avoid_lava,
            avoid_water: self.avoid_water,
            safety_block: self.safety_block.clone(),
            escape_hazards: self.escape_hazards.clone(),
            ..HazardPolicy::default()
        }
    }

    /// Whether `item_name` stays in the inventory during an offload.
    ///
    /// The safety block and the tool class are always kept.
    pub fn is_kept(&self, item_name: &str) -> bool {
        item_name.contains(self.tool_class.as_str())
            || item_name == self.safety_block
            || self
                .keep_items
                .iter()
                .any(|k| !k.is_empty() && item_name.contains(k.as_str()))
    }
}
