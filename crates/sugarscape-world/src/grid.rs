//! 2D lattice with a per-cell occupancy index.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use sugarscape_core::{AgentId, AgentKind, Error, ModelConfig, NeighborMode, Position, Result};

/// Agents resident in one cell: at most one of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellContents {
    pub sugar: Option<AgentId>,
    pub spice: Option<AgentId>,
    pub trader: Option<AgentId>,
}

impl CellContents {
    pub fn get(&self, kind: AgentKind) -> Option<AgentId> {
        match kind {
            AgentKind::Sugar => self.sugar,
            AgentKind::Spice => self.spice,
            AgentKind::Trader => self.trader,
        }
    }

    fn slot_mut(&mut self, kind: AgentKind) -> &mut Option<AgentId> {
        match kind {
            AgentKind::Sugar => &mut self.sugar,
            AgentKind::Spice => &mut self.spice,
            AgentKind::Trader => &mut self.trader,
        }
    }

}

/// A toroidal or bounded grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    pub torus: bool,
    cells: Vec<CellContents>,
    locations: HashMap<AgentId, (Position, AgentKind)>,
}

impl Grid {
    pub fn new(width: i32, height: i32, torus: bool) -> Self {
        let size = (width * height) as usize;
        Self {
            width,
            height,
            torus,
            cells: vec![CellContents::default(); size],
            locations: HashMap::new(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.width, config.height, config.torus)
    }

    /// Dimensions to wrap distances with, if the grid is toroidal
    pub fn wrap_dims(&self) -> Option<(i32, i32)> {
        self.torus.then_some((self.width, self.height))
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.in_bounds(self.width, self.height)
    }

    /// Positions within `radius` of `pos` under `mode`'s metric. Wrapped on a
    /// torus (each cell listed once), clipped otherwise. Row-major order.
    pub fn neighborhood(
        &self,
        pos: Position,
        mode: NeighborMode,
        include_center: bool,
        radius: i32,
    ) -> Vec<Position> {
        let mut seen = HashSet::new();
        let mut neighborhood = Vec::new();

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if mode.distance(dx, dy) > radius {
                    continue;
                }

                let candidate = pos.add(dx, dy);
                let candidate = if self.torus {
                    candidate.wrap(self.width, self.height)
                } else if self.in_bounds(candidate) {
                    candidate
                } else {
                    continue;
                };

                if !include_center && candidate == pos {
                    continue;
                }
                if seen.insert(candidate) {
                    neighborhood.push(candidate);
                }
            }
        }

        neighborhood
    }

    pub fn cell_contents(&self, pos: Position) -> CellContents {
        self.cell_index(pos)
            .map(|index| self.cells[index])
            .unwrap_or_default()
    }

    pub fn trader_at(&self, pos: Position) -> Option<AgentId> {
        self.cell_contents(pos).trader
    }

    pub fn position_of(&self, id: AgentId) -> Option<Position> {
        self.locations.get(&id).map(|(pos, _)| *pos)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.locations.contains_key(&id)
    }

    pub fn agent_count(&self) -> usize {
        self.locations.len()
    }

    pub fn place(&mut self, id: AgentId, kind: AgentKind, pos: Position) -> Result<()> {
        if self.locations.contains_key(&id) {
            return Err(Error::Placement(format!("agent {id} is already on the grid")));
        }
        let index = self.require_index(pos)?;
        let slot = self.cells[index].slot_mut(kind);
        if let Some(resident) = slot {
            return Err(Error::Placement(format!(
                "cell {pos} already holds {kind:?} agent {resident}"
            )));
        }
        *slot = Some(id);
        self.locations.insert(id, (pos, kind));
        Ok(())
    }

    pub fn remove(&mut self, id: AgentId) -> Result<Position> {
        let (pos, kind) = self
            .locations
            .remove(&id)
            .ok_or_else(|| Error::InvalidState(format!("agent {id} is not on the grid")))?;
        let index = self.require_index(pos)?;
        *self.cells[index].slot_mut(kind) = None;
        Ok(pos)
    }

    pub fn move_agent(&mut self, id: AgentId, new_pos: Position) -> Result<()> {
        let (old_pos, kind) = *self
            .locations
            .get(&id)
            .ok_or_else(|| Error::InvalidState(format!("agent {id} is not on the grid")))?;
        if old_pos == new_pos {
            return Ok(());
        }

        let new_index = self.require_index(new_pos)?;
        if let Some(resident) = self.cells[new_index].get(kind) {
            return Err(Error::Placement(format!(
                "cannot move {id} to {new_pos}: occupied by {resident}"
            )));
        }
        let old_index = self.require_index(old_pos)?;

        *self.cells[old_index].slot_mut(kind) = None;
        *self.cells[new_index].slot_mut(kind) = Some(id);
        self.locations.insert(id, (new_pos, kind));
        Ok(())
    }

    /// Every (agent, position, kind) in the occupancy index, sorted by id.
    pub fn residents(&self) -> Vec<(AgentId, Position, AgentKind)> {
        let mut residents: Vec<_> = self
            .locations
            .iter()
            .map(|(id, (pos, kind))| (*id, *pos, *kind))
            .collect();
        residents.sort_by_key(|(id, _, _)| *id);
        residents
    }

    fn cell_index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    fn require_index(&self, pos: Position) -> Result<usize> {
        self.cell_index(pos).ok_or_else(|| {
            Error::Placement(format!(
                "{pos} is outside the {}x{} grid",
                self.width, self.height
            ))
        })
    }

    /// Iterator over all positions
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Position::new(x, y)))
    }
}
