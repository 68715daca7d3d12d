//! Trader state, welfare and marginal rate of substitution.

use serde::{Deserialize, Serialize};
use sugarscape_core::{AgentId, NeighborMode, Position};

/// Floor applied to stocks and metabolisms before dividing
pub const MRS_EPSILON: f64 = 1e-9;

/// Trades executed by a trader during the current tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLog {
    pub prices: Vec<f64>,
    pub partners: Vec<AgentId>,
}

impl TradeLog {
    pub fn clear(&mut self) {
        self.prices.clear();
        self.partners.clear();
    }

    pub fn record(&mut self, price: f64, partner: AgentId) {
        self.prices.push(price);
        self.partners.push(partner);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Birth attributes of a trader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderTraits {
    pub sugar: f64,
    pub spice: f64,
    pub metabolism_sugar: f64,
    pub metabolism_spice: f64,
    pub vision: i32,
    pub neighbor_mode: NeighborMode,
}

/// A mobile trader in the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trader {
    pub id: AgentId,
    pub position: Position,
    pub sugar: f64,
    pub spice: f64,
    pub metabolism_sugar: f64,
    pub metabolism_spice: f64,
    pub vision: i32,
    pub neighbor_mode: NeighborMode,
    pub trade_log: TradeLog,
}

impl Trader {
    pub fn new(id: AgentId, position: Position, traits: TraderTraits) -> Self {
        Self {
            id,
            position,
            sugar: traits.sugar,
            spice: traits.spice,
            metabolism_sugar: traits.metabolism_sugar,
            metabolism_spice: traits.metabolism_spice,
            vision: traits.vision,
            neighbor_mode: traits.neighbor_mode,
            trade_log: TradeLog::default(),
        }
    }

    /// Cobb-Douglas welfare at hypothetical stocks, weighted by metabolism
    /// shares. Pure: does not touch the trader.
    pub fn welfare(&self, sugar: f64, spice: f64) -> f64 {
        let total = self.metabolism_sugar + self.metabolism_spice;
        if total <= 0.0 {
            return 0.0;
        }
        let a_sugar = self.metabolism_sugar / total;
        let a_spice = self.metabolism_spice / total;
        sugar.max(0.0).powf(a_sugar) * spice.max(0.0).powf(a_spice)
    }

    pub fn current_welfare(&self) -> f64 {
        self.welfare(self.sugar, self.spice)
    }

    /// Spice price of one sugar this trader would accept at the given stocks
    pub fn mrs_at(&self, sugar: f64, spice: f64) -> f64 {
        let sugar_need = sugar.max(MRS_EPSILON) / self.metabolism_sugar.max(MRS_EPSILON);
        let spice_need = spice.max(MRS_EPSILON) / self.metabolism_spice.max(MRS_EPSILON);
        spice_need / sugar_need
    }

    pub fn mrs(&self) -> f64 {
        self.mrs_at(self.sugar, self.spice)
    }

    pub fn absorb(&mut self, sugar: f64, spice: f64) {
        self.sugar += sugar;
        self.spice += spice;
    }

    /// Burn one tick of metabolism; stocks floor at zero.
    pub fn metabolize(&mut self) {
        self.sugar = (self.sugar - self.metabolism_sugar).max(0.0);
        self.spice = (self.spice - self.metabolism_spice).max(0.0);
    }

    pub fn is_depleted(&self) -> bool {
        self.sugar <= 0.0 && self.spice <= 0.0
    }
}
