//! Core type definitions for the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of any agent (resource cell or trader).
///
/// Identities are handed out from a single increasing counter, so ordering by
/// `AgentId` is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind buckets used by the scheduler registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Sugar,
    Spice,
    Trader,
}

/// The two tradable goods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Good {
    Sugar,
    Spice,
}

impl Good {
    pub fn kind(&self) -> AgentKind {
        match self {
            Good::Sugar => AgentKind::Sugar,
            Good::Spice => AgentKind::Spice,
        }
    }
}

impl fmt::Display for Good {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Good::Sugar => write!(f, "sugar"),
            Good::Spice => write!(f, "spice"),
        }
    }
}

/// Neighborhood shape for vision and trade searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborMode {
    /// 4-connected, Manhattan radius
    VonNeumann,
    /// 8-connected, Chebyshev radius
    Moore,
}

impl NeighborMode {
    pub fn from_moore(moore: bool) -> Self {
        if moore {
            NeighborMode::Moore
        } else {
            NeighborMode::VonNeumann
        }
    }

    /// Distance for per-axis offsets under this mode's metric
    pub fn distance(&self, dx: i32, dy: i32) -> i32 {
        let (dx, dy) = (dx.abs(), dy.abs());
        match self {
            NeighborMode::VonNeumann => dx + dy,
            NeighborMode::Moore => dx.max(dy),
        }
    }
}

/// 2D position in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Apply toroidal wrapping for given world dimensions
    pub fn wrap(&self, width: i32, height: i32) -> Self {
        Self {
            x: ((self.x % width) + width) % width,
            y: ((self.y % height) + height) % height,
        }
    }

    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.x < width && self.y >= 0 && self.y < height
    }

    /// Grid distance under `mode`. With `wrap = Some((width, height))` each
    /// axis takes the shorter way around the torus.
    pub fn grid_distance(
        &self,
        other: &Position,
        mode: NeighborMode,
        wrap: Option<(i32, i32)>,
    ) -> i32 {
        let mut dx = (self.x - other.x).abs();
        let mut dy = (self.y - other.y).abs();
        if let Some((width, height)) = wrap {
            dx = dx.min(width - dx);
            dy = dy.min(height - dy);
        }
        mode.distance(dx, dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
