use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Spatial types
// ────────────────────────────────────────────────────────────────────────────

/// Integer block coordinate.  Used directly as the key of every position map
/// (candidates, explored set, chest registry).
///
/// Serialises as a compact `[x, y, z]` array so config files can list
/// positions as `chests = [[10, 64, -3]]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Floor a continuous entity position onto the block grid.
    pub fn floored(x: f64, y: f64, z: f64) -> Self {
        Self::new(x.floor() as i32, y.floor() as i32, z.floor() as i32)
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The block directly underneath.
    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// Straight-line (Euclidean) distance between block origins.
    pub fn distance_to(self, other: BlockPos) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Add for BlockPos {
    type Output = BlockPos;

    fn add(self, rhs: BlockPos) -> BlockPos {
        self.offset(rhs.x, rhs.y, rhs.z)
    }
}

impl Sub for BlockPos {
    type Output = BlockPos;

    fn sub(self, rhs: BlockPos) -> BlockPos {
        self.offset(-rhs.x, -rhs.y, -rhs.z)
    }
}

impl From<[i32; 3]> for BlockPos {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<BlockPos> for [i32; 3] {
    fn from(p: BlockPos) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Canonical `"x,y,z"` form, used in logs and accepted back by [`FromStr`].
impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

impl FromStr for BlockPos {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, z] = parts.as_slice() else {
            return Err(QuarryError::Config(format!("expected 'x,y,z', got '{s}'")));
        };
        let parse = |v: &str| {
            v.parse::<i32>()
                .map_err(|e| QuarryError::Config(format!("bad coordinate '{v}': {e}")))
        };
        Ok(Self::new(parse(x)?, parse(y)?, parse(z)?))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// World observations
// ────────────────────────────────────────────────────────────────────────────

/// Identity of a single block as reported by the world probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Registry name, e.g. `"iron_ore"`, `"lava"`, `"air"`.
    pub name: String,
    pub position: BlockPos,
}

impl BlockInfo {
    pub fn new(name: impl Into<String>, position: BlockPos) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }

    pub fn is_air(&self) -> bool {
        self.name.ends_with("air")
    }

    pub fn is_lava(&self) -> bool {
        self.name.contains("lava")
    }

    pub fn is_water(&self) -> bool {
        self.name.contains("water")
    }
}

/// One stack held in the agent's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub count: u32,
    /// Remaining uses for damageable items; `None` for plain stacks.
    pub durability: Option<u32>,
}

impl Item {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
            durability: None,
        }
    }

    pub fn with_durability(mut self, durability: u32) -> Self {
        self.durability = Some(durability);
        self
    }
}

/// Which hand an item is equipped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipSlot {
    Hand,
    OffHand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A dropped item stack lying in the world.
    DroppedItem,
    Mob,
    Player,
    Other,
}

/// A nearby entity as reported by the world probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u64,
    pub kind: EntityKind,
    pub position: BlockPos,
    /// Item name for [`EntityKind::DroppedItem`] entities.
    pub item: Option<String>,
}

/// A recorded position believed to hold a target-priority block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OreSite {
    pub position: BlockPos,
    pub block_type: String,
    /// Positive weight from the priority table.
    pub priority: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Navigation
// ────────────────────────────────────────────────────────────────────────────

/// A "get within `tolerance` blocks of `position`" navigation goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub position: BlockPos,
    pub tolerance: u32,
}

impl Goal {
    pub const fn near(position: BlockPos, tolerance: u32) -> Self {
        Self {
            position,
            tolerance,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (±{})", self.position, self.tolerance)
    }
}

/// Traversal permissions handed to the external pathfinder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalRules {
    pub can_dig: bool,
    pub allow_parkour: bool,
    pub allow_sprint: bool,
    /// Block types the pathfinder must never break on its way.
    pub uncuttable: BTreeSet<String>,
}

impl TraversalRules {
    /// Aggressive mining movement that still refuses to break target ore.
    pub fn mining(uncuttable: impl IntoIterator<Item = String>) -> Self {
        Self {
            can_dig: true,
            allow_parkour: true,
            allow_sprint: true,
            uncuttable: uncuttable.into_iter().collect(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Events
// ────────────────────────────────────────────────────────────────────────────

/// Agent lifecycle signals produced by the connection layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleSignal {
    Spawn,
    Death,
    Disconnect { reason: String },
    Kicked { reason: String },
    LowHealth { health: f32 },
    /// Unrecoverable transport error.
    Error { message: String },
}

impl LifecycleSignal {
    /// Reason string for signals that always end a mining session.
    ///
    /// `LowHealth` is policy-dependent and returns `None` here.
    pub fn terminal_reason(&self) -> Option<String> {
        match self {
            LifecycleSignal::Death => Some("agent died".to_string()),
            LifecycleSignal::Disconnect { reason } => Some(format!("disconnected: {reason}")),
            LifecycleSignal::Kicked { reason } => Some(format!("kicked: {reason}")),
            LifecycleSignal::Error { message } => Some(format!("transport error: {message}")),
            LifecycleSignal::Spawn | LifecycleSignal::LowHealth { .. } => None,
        }
    }
}

/// Progress notifications published by the mining loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MiningEvent {
    Started,
    Stopped,
    EmergencyStopped { reason: String },
    SiteMined { position: BlockPos, block_type: String },
    Deposited { stacks: u32, items: u32 },
    SearchRadiusGrown { radius: i32 },
}

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"quarry-runtime::mining_loop"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleSignal),
    Mining(MiningEvent),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error taxonomy shared by every quarry crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuarryError {
    #[error("agent is not spawned in the world")]
    NotSpawned,

    #[error("no {class} in inventory")]
    NoTool { class: String },

    #[error("navigation to {goal} timed out after {after_secs}s")]
    NavigationTimeout { goal: Goal, after_secs: u64 },

    #[error("navigation to {goal} failed: {reason}")]
    NavigationFailed { goal: Goal, reason: String },

    #[error("no storage container is known")]
    NoChestKnown,

    #[error("deposit failed: {0}")]
    DepositFailed(String),

    #[error("emergency: {0}")]
    Emergency(String),

    #[error("{operation} failed: {details}")]
    Capability { operation: String, details: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("event bus error: {0}")]
    Channel(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl QuarryError {
    /// Convenience constructor for a failed external capability call.
    pub fn capability(operation: impl Into<String>, details: impl Into<String>) -> Self {
        QuarryError::Capability {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Errors that end the whole session rather than the current action.
    ///
    /// Losing world presence mid-session is treated like a disconnect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, QuarryError::Emergency(_) | QuarryError::NotSpawned)
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, QuarryError::Cancelled)
    }

    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            QuarryError::NavigationTimeout { .. } | QuarryError::NavigationFailed { .. }
        )
    }
}
