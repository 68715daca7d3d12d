//! Simulation engine: setup and the per-tick step loop.

use crate::grid::Grid;
use crate::metrics::{MetricsCollector, TickReport};
use crate::movement::{choose_destination, resource_at};
use crate::resource::ResourceCell;
use crate::scheduler::Scheduler;
use crate::trade::{negotiate, TradeRules};
use crate::trader::{Trader, TraderTraits};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use sugarscape_core::{
    geometric_mean, AgentId, AgentKind, CapacityMaps, Error, Good, Landscape, ModelConfig,
    Position, Result,
};
use tracing::{debug, info, instrument};

pub struct Simulation {
    grid: Grid,
    scheduler: Scheduler,
    config: ModelConfig,
    rules: TradeRules,
    rng: ChaCha8Rng,
    sugar_capacity_max: f64,
    spice_capacity_max: f64,
}

impl Simulation {
    /// Full setup: derive noised capacity maps from `base`, create resource
    /// cells, then place the initial traders. One seeded RNG drives all of it.
    pub fn new(config: ModelConfig, base: &Landscape) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let maps = CapacityMaps::derive(base, &config, &mut rng)?;

        let mut sim = Self::assemble(config, &maps, rng)?;
        sim.populate_traders()?;

        info!(
            width = sim.config.width,
            height = sim.config.height,
            torus = sim.config.torus,
            seed = sim.config.seed,
            sugar_cells = sim.scheduler.count(AgentKind::Sugar),
            spice_cells = sim.scheduler.count(AgentKind::Spice),
            traders = sim.scheduler.count(AgentKind::Trader),
            "Simulation initialized"
        );
        Ok(sim)
    }

    pub fn from_map_file(config: ModelConfig, path: impl AsRef<Path>) -> Result<Self> {
        let base = Landscape::load(path)?;
        Self::new(config, &base)
    }

    /// Resources only, no traders. Use [`Simulation::spawn_trader`] to set up
    /// a specific population.
    pub fn with_capacities(config: ModelConfig, maps: &CapacityMaps) -> Result<Self> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::assemble(config, maps, rng)
    }

    fn assemble(config: ModelConfig, maps: &CapacityMaps, rng: ChaCha8Rng) -> Result<Self> {
        for map in [&maps.sugar, &maps.spice] {
            if map.width() != config.width || map.height() != config.height {
                return Err(Error::Config(format!(
                    "capacity map is {}x{} but the grid is {}x{}",
                    map.width(),
                    map.height(),
                    config.width,
                    config.height
                )));
            }
        }

        let mut sim = Self {
            grid: Grid::from_config(&config),
            scheduler: Scheduler::new(),
            rules: TradeRules::from(&config),
            config,
            rng,
            sugar_capacity_max: maps.sugar.max_value(),
            spice_capacity_max: maps.spice.max_value(),
        };

        for y in 0..sim.config.height {
            for x in 0..sim.config.width {
                let pos = Position::new(x, y);
                for (good, capacity) in [
                    (Good::Sugar, maps.sugar.get(x, y)),
                    (Good::Spice, maps.spice.get(x, y)),
                ] {
                    if capacity > 0.0 {
                        let id = sim.scheduler.next_id();
                        sim.grid.place(id, good.kind(), pos)?;
                        sim.scheduler
                            .add_resource(ResourceCell::new(id, good, pos, capacity))?;
                    }
                }
            }
        }

        Ok(sim)
    }

    fn populate_traders(&mut self) -> Result<()> {
        let mut free: Vec<Position> = self
            .grid
            .positions()
            .filter(|pos| self.grid.trader_at(*pos).is_none())
            .collect();
        let wanted = self.config.initial_population;
        if free.len() < wanted {
            return Err(Error::Config(format!(
                "cannot place {wanted} traders on {} free cells",
                free.len()
            )));
        }

        free.shuffle(&mut self.rng);
        for pos in free.into_iter().take(wanted) {
            let traits = self.random_traits()?;
            self.spawn_trader(pos, traits)?;
        }
        Ok(())
    }

    fn random_traits(&mut self) -> Result<TraderTraits> {
        let c = &self.config;
        let rng = &mut self.rng;
        let sugar = rng.gen_range(c.endowment_min..=c.endowment_max);
        let spice = rng.gen_range(c.endowment_min..=c.endowment_max);
        let metabolism_sugar = rng.gen_range(c.metabolism_min..=c.metabolism_max);
        let metabolism_spice = rng.gen_range(c.metabolism_min..=c.metabolism_max);
        let vision = rng.gen_range(c.vision_min..=c.vision_max);
        let vision = i32::try_from(vision)
            .map_err(|_| Error::Config(format!("vision {vision} does not fit the grid")))?;

        Ok(TraderTraits {
            sugar: f64::from(sugar),
            spice: f64::from(spice),
            metabolism_sugar: f64::from(metabolism_sugar),
            metabolism_spice: f64::from(metabolism_spice),
            vision,
            neighbor_mode: c.neighbor_mode,
        })
    }

    /// Place a trader with explicit traits on a free cell
    pub fn spawn_trader(&mut self, position: Position, traits: TraderTraits) -> Result<AgentId> {
        if traits.vision < 0 {
            return Err(Error::Config(format!(
                "vision must be non-negative, got {}",
                traits.vision
            )));
        }
        if let Some(resident) = self.grid.trader_at(position) {
            return Err(Error::Placement(format!(
                "{position} is already held by trader {resident}"
            )));
        }
        let id = self.scheduler.next_id();
        self.grid.place(id, AgentKind::Trader, position)?;
        if let Err(err) = self.scheduler.add_trader(Trader::new(id, position, traits)) {
            self.grid.remove(id)?;
            return Err(err);
        }
        Ok(id)
    }

    /// Run `num_ticks` steps, feeding every report to `collector`
    #[instrument(skip(self, collector), fields(seed = self.config.seed))]
    pub fn run(&mut self, num_ticks: u64, collector: &mut MetricsCollector) -> Result<RunSummary> {
        info!("Starting simulation for {} ticks", num_ticks);
        let mut total_trades = 0;
        let mut total_deaths = 0;

        for tick in 0..num_ticks {
            let report = self.step()?;
            total_trades += report.trades;
            total_deaths += report.deaths;

            if self.config.log_interval > 0 && tick % self.config.log_interval == 0 {
                info!(
                    "Tick {}/{}: {} traders alive, {} trades",
                    report.step, num_ticks, report.traders, report.trades
                );
            }
            collector.collect(self, report);
        }

        let summary = RunSummary {
            ticks: self.steps(),
            final_traders: self.trader_count(),
            total_trades,
            total_deaths,
        };
        info!(
            event = "run_summary",
            ticks = summary.ticks,
            final_traders = summary.final_traders,
            total_trades = summary.total_trades,
            total_deaths = summary.total_deaths,
            "Simulation complete"
        );
        Ok(summary)
    }

    /// Advance one tick: regrow, move and harvest, trade, metabolize, bury.
    pub fn step(&mut self) -> Result<TickReport> {
        self.scheduler.regrow_resources();

        let order = self.scheduler.shuffled_trader_ids(&mut self.rng);
        for id in order {
            if let Some(trader) = self.scheduler.trader_mut(id) {
                trader.trade_log.clear();
            }
            self.move_trader(id)?;
            self.harvest(id)?;
        }

        for _ in 0..self.config.trading_passes {
            let order = self.scheduler.shuffled_trader_ids(&mut self.rng);
            for id in order {
                self.trade_with_neighbors(id)?;
            }
        }

        let mut dead = Vec::new();
        for trader in self.scheduler.traders_mut() {
            trader.metabolize();
            if trader.is_depleted() {
                dead.push(trader.id);
            }
        }
        for &id in &dead {
            let trader = self.remove_trader(id)?;
            debug!(trader = %id, x = trader.position.x, y = trader.position.y, "Trader died");
        }

        self.scheduler.advance();
        debug_assert!(
            self.check_invariants().is_ok(),
            "grid and registry diverged: {:?}",
            self.check_invariants()
        );

        let report = TickReport {
            step: self.steps(),
            traders: self.trader_count(),
            trades: self.scheduler.traders().map(|t| t.trade_log.len()).sum(),
            trade_volume: self.trade_volume(),
            price_gmean: self.price_geometric_mean(),
            deaths: dead.len(),
        };
        debug!(
            step = report.step,
            traders = report.traders,
            trades = report.trades,
            volume = report.trade_volume,
            price = ?report.price_gmean,
            deaths = report.deaths,
            "Tick complete"
        );
        Ok(report)
    }

    fn move_wrap(&self) -> Option<(i32, i32)> {
        if self.config.wrapped_move_distance {
            self.grid.wrap_dims()
        } else {
            None
        }
    }

    fn move_trader(&mut self, id: AgentId) -> Result<()> {
        let wrap = self.move_wrap();
        let Some(trader) = self.scheduler.trader(id) else {
            return Ok(());
        };
        let dest = choose_destination(trader, &self.grid, &self.scheduler, wrap, &mut self.rng);
        let Some(dest) = dest else {
            return Ok(());
        };

        self.grid.move_agent(id, dest)?;
        if let Some(trader) = self.scheduler.trader_mut(id) {
            trader.position = dest;
        }
        Ok(())
    }

    fn harvest(&mut self, id: AgentId) -> Result<()> {
        let Some(position) = self.scheduler.trader(id).map(|t| t.position) else {
            return Ok(());
        };
        let contents = self.grid.cell_contents(position);

        let mut take = |good: Good| {
            contents
                .get(good.kind())
                .and_then(|cell_id| self.scheduler.resource_mut(good, cell_id))
                .map(ResourceCell::harvest)
                .unwrap_or(0.0)
        };
        let sugar = take(Good::Sugar);
        let spice = take(Good::Spice);

        let trader = self
            .scheduler
            .trader_mut(id)
            .ok_or_else(|| Error::InvalidState(format!("trader {id} vanished during harvest")))?;
        trader.absorb(sugar, spice);
        Ok(())
    }

    /// Negotiate in turn with every trader within vision
    fn trade_with_neighbors(&mut self, id: AgentId) -> Result<()> {
        let Some(trader) = self.scheduler.trader(id) else {
            return Ok(());
        };
        let partners: Vec<AgentId> = self
            .grid
            .neighborhood(trader.position, trader.neighbor_mode, false, trader.vision)
            .into_iter()
            .filter_map(|pos| self.grid.trader_at(pos))
            .filter(|other| *other != id)
            .collect();
        if partners.is_empty() {
            return Ok(());
        }

        let mut trader = self
            .scheduler
            .take_trader(id)
            .ok_or_else(|| Error::InvalidState(format!("trader {id} is not registered")))?;
        for partner_id in partners {
            if let Some(partner) = self.scheduler.trader_mut(partner_id) {
                negotiate(&mut trader, partner, &self.rules);
            }
        }
        self.scheduler.restore_trader(trader);
        Ok(())
    }

    /// Remove from grid and registry together
    fn remove_trader(&mut self, id: AgentId) -> Result<Trader> {
        if !self.grid.contains(id) || self.scheduler.trader(id).is_none() {
            return Err(Error::InvalidState(format!(
                "trader {id} is not resident in both grid and registry"
            )));
        }
        self.grid.remove(id)?;
        self.scheduler
            .remove_trader(id)
            .ok_or_else(|| Error::InvalidState(format!("trader {id} is not registered")))
    }

    /// Verify the grid occupancy index and the registry describe the same agents
    pub fn check_invariants(&self) -> Result<()> {
        let residents = self.grid.residents();
        for (id, pos, kind) in &residents {
            match self.scheduler.kind_of(*id) {
                Some(registered) if registered == *kind => {}
                other => {
                    return Err(Error::InvalidState(format!(
                        "grid holds {kind:?} {id} at {pos} but registry has {other:?}"
                    )))
                }
            }
            if *kind == AgentKind::Trader {
                let recorded = self.scheduler.trader(*id).map(|t| t.position);
                if recorded != Some(*pos) {
                    return Err(Error::InvalidState(format!(
                        "trader {id} is at {pos} on the grid but {recorded:?} in the registry"
                    )));
                }
            }
        }

        let registered = self.scheduler.count(AgentKind::Sugar)
            + self.scheduler.count(AgentKind::Spice)
            + self.scheduler.count(AgentKind::Trader);
        if registered != residents.len() {
            return Err(Error::InvalidState(format!(
                "{registered} agents registered but {} on the grid",
                residents.len()
            )));
        }
        Ok(())
    }

    pub fn steps(&self) -> u64 {
        self.scheduler.steps()
    }

    pub fn trader_count(&self) -> usize {
        self.scheduler.count(AgentKind::Trader)
    }

    /// Distinct unordered pairs that traded at least once this tick
    pub fn trade_volume(&self) -> usize {
        let mut edges = BTreeSet::new();
        for trader in self.scheduler.traders() {
            for &partner in &trader.trade_log.partners {
                edges.insert((trader.id.min(partner), trader.id.max(partner)));
            }
        }
        edges.len()
    }

    /// Geometric mean of every price executed this tick
    pub fn price_geometric_mean(&self) -> Option<f64> {
        let prices: Vec<f64> = self
            .scheduler
            .traders()
            .flat_map(|t| t.trade_log.prices.iter().copied())
            .collect();
        geometric_mean(&prices)
    }

    /// Partners of each live trader this tick, in trade order
    pub fn trade_partners(&self) -> BTreeMap<AgentId, Vec<AgentId>> {
        self.scheduler
            .traders()
            .map(|t| (t.id, t.trade_log.partners.clone()))
            .collect()
    }

    pub fn sugar_at(&self, pos: Position) -> f64 {
        resource_at(&self.grid, &self.scheduler, Good::Sugar, pos)
    }

    pub fn spice_at(&self, pos: Position) -> f64 {
        resource_at(&self.grid, &self.scheduler, Good::Spice, pos)
    }

    pub fn sugar_capacity_max(&self) -> f64 {
        self.sugar_capacity_max
    }

    pub fn spice_capacity_max(&self) -> f64 {
        self.spice_capacity_max
    }

    pub fn trader(&self, id: AgentId) -> Option<&Trader> {
        self.scheduler.trader(id)
    }

    pub fn traders(&self) -> impl Iterator<Item = &Trader> {
        self.scheduler.traders()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

/// Totals over a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub final_traders: usize,
    pub total_trades: usize,
    pub total_deaths: usize,
}
