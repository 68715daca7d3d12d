//! Kind-indexed registry of live agents and the step counter.

use crate::resource::ResourceCell;
use crate::trader::Trader;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use sugarscape_core::{AgentId, AgentKind, Error, Good, Result};

/// Owns every live agent, bucketed by kind and keyed by identity. Iteration
/// within a bucket is in identity order, so snapshots are reproducible.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    steps: u64,
    next_id: u64,
    sugar: BTreeMap<AgentId, ResourceCell>,
    spice: BTreeMap<AgentId, ResourceCell>,
    traders: BTreeMap<AgentId, Trader>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn advance(&mut self) {
        self.steps += 1;
    }

    /// Hand out the next unused identity
    pub fn next_id(&mut self) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_resource(&mut self, cell: ResourceCell) -> Result<()> {
        self.ensure_unregistered(cell.id)?;
        self.bucket_mut(cell.good).insert(cell.id, cell);
        Ok(())
    }

    pub fn add_trader(&mut self, trader: Trader) -> Result<()> {
        self.ensure_unregistered(trader.id)?;
        self.traders.insert(trader.id, trader);
        Ok(())
    }

    pub fn remove_trader(&mut self, id: AgentId) -> Option<Trader> {
        self.traders.remove(&id)
    }

    pub fn count(&self, kind: AgentKind) -> usize {
        match kind {
            AgentKind::Sugar => self.sugar.len(),
            AgentKind::Spice => self.spice.len(),
            AgentKind::Trader => self.traders.len(),
        }
    }

    pub fn kind_of(&self, id: AgentId) -> Option<AgentKind> {
        if self.traders.contains_key(&id) {
            Some(AgentKind::Trader)
        } else if self.sugar.contains_key(&id) {
            Some(AgentKind::Sugar)
        } else if self.spice.contains_key(&id) {
            Some(AgentKind::Spice)
        } else {
            None
        }
    }

    pub fn resources(&self, good: Good) -> impl Iterator<Item = &ResourceCell> {
        self.bucket(good).values()
    }

    pub fn resource(&self, good: Good, id: AgentId) -> Option<&ResourceCell> {
        self.bucket(good).get(&id)
    }

    pub fn resource_mut(&mut self, good: Good, id: AgentId) -> Option<&mut ResourceCell> {
        self.bucket_mut(good).get_mut(&id)
    }

    /// Regrow every sugar and spice cell by one unit
    pub fn regrow_resources(&mut self) {
        for cell in self.sugar.values_mut().chain(self.spice.values_mut()) {
            cell.regrow();
        }
    }

    pub fn traders(&self) -> impl Iterator<Item = &Trader> {
        self.traders.values()
    }

    pub fn traders_mut(&mut self) -> impl Iterator<Item = &mut Trader> {
        self.traders.values_mut()
    }

    pub fn trader(&self, id: AgentId) -> Option<&Trader> {
        self.traders.get(&id)
    }

    pub fn trader_mut(&mut self, id: AgentId) -> Option<&mut Trader> {
        self.traders.get_mut(&id)
    }

    pub fn trader_ids(&self) -> Vec<AgentId> {
        self.traders.keys().copied().collect()
    }

    /// Snapshot of live trader ids in a fresh random order
    pub fn shuffled_trader_ids<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<AgentId> {
        let mut ids = self.trader_ids();
        ids.shuffle(rng);
        ids
    }

    /// Temporarily detach a trader so two can be borrowed mutably at once.
    /// Must be paired with [`Scheduler::restore_trader`].
    pub(crate) fn take_trader(&mut self, id: AgentId) -> Option<Trader> {
        self.traders.remove(&id)
    }

    pub(crate) fn restore_trader(&mut self, trader: Trader) {
        self.traders.insert(trader.id, trader);
    }

    fn ensure_unregistered(&self, id: AgentId) -> Result<()> {
        match self.kind_of(id) {
            Some(kind) => Err(Error::InvalidState(format!(
                "agent {id} is already registered as {kind:?}"
            ))),
            None => Ok(()),
        }
    }

    fn bucket(&self, good: Good) -> &BTreeMap<AgentId, ResourceCell> {
        match good {
            Good::Sugar => &self.sugar,
            Good::Spice => &self.spice,
        }
    }

    fn bucket_mut(&mut self, good: Good) -> &mut BTreeMap<AgentId, ResourceCell> {
        match good {
            Good::Sugar => &mut self.sugar,
            Good::Spice => &mut self.spice,
        }
    }
}
