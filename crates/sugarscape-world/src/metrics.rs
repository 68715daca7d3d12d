//! Per-tick readouts and their CSV export.

use crate::simulation::Simulation;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use sugarscape_core::{AgentId, Result};

/// Model-level readout for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub step: u64,
    /// Live traders after deaths were processed
    pub traders: usize,
    /// Lots executed this tick
    pub trades: usize,
    /// Distinct trading pairs this tick
    pub trade_volume: usize,
    /// Geometric mean of all executed prices, `None` without trades
    pub price_gmean: Option<f64>,
    pub deaths: usize,
}

/// Partners one trader dealt with during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub step: u64,
    pub trader: AgentId,
    pub partners: Vec<AgentId>,
}

/// In-memory history of tick readouts
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    model: Vec<TickReport>,
    agents: Vec<AgentRecord>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&mut self, simulation: &Simulation, report: TickReport) {
        let step = report.step;
        self.agents.extend(
            simulation
                .trade_partners()
                .into_iter()
                .map(|(trader, partners)| AgentRecord {
                    step,
                    trader,
                    partners,
                }),
        );
        self.model.push(report);
    }

    pub fn model_vars(&self) -> &[TickReport] {
        &self.model
    }

    pub fn agent_vars(&self) -> &[AgentRecord] {
        &self.agents
    }

    pub fn latest(&self) -> Option<&TickReport> {
        self.model.last()
    }

    /// `step,traders,trades,volume,price,deaths`; price is empty for tradeless ticks
    pub fn write_model_csv<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "step,traders,trades,volume,price,deaths")?;
        for report in &self.model {
            let price = report
                .price_gmean
                .map(|p| p.to_string())
                .unwrap_or_default();
            writeln!(
                out,
                "{},{},{},{},{},{}",
                report.step,
                report.traders,
                report.trades,
                report.trade_volume,
                price,
                report.deaths
            )?;
        }
        out.flush()?;
        Ok(())
    }

    /// `step,trader,partners` with partners joined by `;`
    pub fn write_agent_csv<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "step,trader,partners")?;
        for record in &self.agents {
            let partners = record
                .partners
                .iter()
                .map(AgentId::to_string)
                .collect::<Vec<_>>()
                .join(";");
            writeln!(out, "{},{},{}", record.step, record.trader, partners)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write `model_vars.csv` and `agent_vars.csv` into `dir`
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.write_model_csv(BufWriter::new(File::create(dir.join("model_vars.csv"))?))?;
        self.write_agent_csv(BufWriter::new(File::create(dir.join("agent_vars.csv"))?))?;
        Ok(())
    }
}
