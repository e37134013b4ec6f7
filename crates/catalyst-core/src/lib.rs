//! Core engine for the three-faction catalyst arena.
//!
//! The crate owns the hex territory automaton, the catalyst behaviour state
//! machine, the collision/combat resolver and the [`Arena`] orchestrator that
//! sequences them every tick. Rendering, audio and input live elsewhere and only
//! read the snapshots and events produced here.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod agent;
pub mod arena;
pub mod combat;
pub mod config;
pub mod grid;
pub mod targeting;

pub use agent::{Agent, AgentSnapshot, BehaviorMode, PeerView, StepContext};
pub use arena::{Arena, ArenaSnapshot, TickRate};
pub use combat::{resolve_collisions, CollisionOutcome};
pub use config::{
    ArenaConfig, CatalystConfig, CombatConfig, GridConfig, PowerConfig, TargetingConfig,
};
pub use grid::{Cell, HexCoord, TerritoryGrid, TerritoryStats};
pub use targeting::{acquire_target, nearest_peer, TargetQuery};

/// Simulation clock (ticks processed since the match started).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Ticks elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub const fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Whether this tick lands on a multiple of `interval` (never for interval 0).
    #[must_use]
    pub const fn is_multiple_of(self, interval: u64) -> bool {
        interval != 0 && self.0 % interval == 0
    }
}

/// Pixel-space position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Position) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Per-tick displacement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    /// Construct a new velocity vector.
    #[must_use]
    pub const fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    /// Magnitude of the vector.
    #[must_use]
    pub fn speed(self) -> f32 {
        self.vx.hypot(self.vy)
    }
}

/// Unit vector from `from` to `to` plus the distance, or `None` when the points
/// coincide (or the distance is not finite).
pub(crate) fn direction(from: Position, to: Position) -> Option<(f32, f32, f32)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dist = dx.hypot(dy);
    if dist <= f32::EPSILON || !dist.is_finite() {
        return None;
    }
    Some((dx / dist, dy / dist, dist))
}

/// One of the three competing factions.
///
/// Dominance is cyclic: every faction preys on the next index and is preyed on by
/// the previous one (Orange > Gray > Cyan > Orange).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Orange,
    Gray,
    Cyan,
}

impl Faction {
    /// Number of factions in a match.
    pub const COUNT: usize = 3;
    /// All factions in index order.
    pub const ALL: [Faction; Self::COUNT] = [Faction::Orange, Faction::Gray, Faction::Cyan];

    /// Dense index in `0..3`.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Faction for a dense index, `None` outside `0..3`.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// The faction this one hunts.
    #[must_use]
    pub const fn prey(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::COUNT]
    }

    /// The faction that hunts this one.
    #[must_use]
    pub const fn predator(self) -> Self {
        Self::ALL[(self.index() + 2) % Self::COUNT]
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Faction::Orange => "orange",
            Faction::Gray => "gray",
            Faction::Cyan => "cyan",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Notable outcomes surfaced to audio/announcement consumers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArenaEvent {
    LethalCollision {
        killer: Faction,
        victim: Faction,
        kill_streak: u32,
    },
    NonLethalCollision {
        first: Faction,
        second: Faction,
    },
    LastStandEntered {
        faction: Faction,
    },
    Eliminated {
        faction: Faction,
    },
    MatchDecided {
        winner: Faction,
    },
}

/// Events emitted after processing one arena tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub tick: Tick,
    pub events: Vec<ArenaEvent>,
}

/// Errors that can occur when constructing arena state.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The board is too small to hold a single hex.
    #[error("grid must have at least one row and one column (got {rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },
    /// The board needs more hexes than the grid will allocate.
    #[error("grid of {rows}x{cols} hexes exceeds the {max} cell limit")]
    GridTooLarge {
        rows: usize,
        cols: usize,
        max: usize,
    },
}
