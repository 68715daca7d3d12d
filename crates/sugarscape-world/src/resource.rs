//! Renewable sugar and spice cells.

use serde::{Deserialize, Serialize};
use sugarscape_core::{AgentId, Good, Position};

/// One renewable stock of a single good, pinned to a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCell {
    pub id: AgentId,
    pub good: Good,
    pub position: Position,
    pub amount: f64,
    pub max_amount: f64,
}

impl ResourceCell {
    /// New cells start full
    pub fn new(id: AgentId, good: Good, position: Position, max_amount: f64) -> Self {
        Self {
            id,
            good,
            position,
            amount: max_amount,
            max_amount,
        }
    }

    /// +1 per tick up to the capacity
    pub fn regrow(&mut self) {
        self.amount = self.max_amount.min(self.amount + 1.0);
    }

    /// Take the whole stock; the cell stays in place and regrows.
    pub fn harvest(&mut self) -> f64 {
        let taken = self.amount;
        self.amount = 0.0;
        taken
    }
}
