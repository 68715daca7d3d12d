//! Sugarscape command-line runner.

mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sugarscape_core::RunConfig;
use sugarscape_world::{MetricsCollector, Simulation};
use tracing::info;

#[derive(Parser)]
#[command(name = "sugarscape")]
#[command(version)]
#[command(about = "Sugarscape trading simulation with sugar and spice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and export per-tick metrics as CSV
    Run(RunArgs),

    /// Write the default run configuration as JSON
    Init {
        /// Output path
        #[arg(short, long, default_value = "sugarscape.json")]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// JSON run configuration; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Height map the capacity maps are derived from
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(short, long)]
    steps: Option<u64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    width: Option<i32>,

    #[arg(long)]
    height: Option<i32>,

    /// Initial number of traders
    #[arg(long)]
    init_pop: Option<usize>,

    /// Standard deviation of the sugar map noise
    #[arg(long)]
    sugar_noise: Option<f64>,

    /// Standard deviation of the spice map noise
    #[arg(long)]
    spice_noise: Option<f64>,

    /// Trading passes per tick
    #[arg(long)]
    trading_passes: Option<u32>,

    /// Directory for model_vars.csv and agent_vars.csv
    #[arg(short, long, default_value = "data")]
    out: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl RunArgs {
    fn resolve(&self) -> Result<RunConfig> {
        let mut run = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(map) = &self.map {
            run.map_path = map.clone();
        }
        if let Some(steps) = self.steps {
            run.num_ticks = steps;
        }

        let model = &mut run.model;
        if let Some(seed) = self.seed {
            model.seed = seed;
        }
        if let Some(width) = self.width {
            model.width = width;
        }
        if let Some(height) = self.height {
            model.height = height;
        }
        if let Some(population) = self.init_pop {
            model.initial_population = population;
        }
        if let Some(sigma) = self.sugar_noise {
            model.sugar_noise_sigma = sigma;
        }
        if let Some(sigma) = self.spice_noise {
            model.spice_noise_sigma = sigma;
        }
        if let Some(passes) = self.trading_passes {
            model.trading_passes = passes;
        }
        Ok(run)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_simulation(args),
        Commands::Init { output } => write_default_config(output),
    }
}

fn run_simulation(args: RunArgs) -> Result<()> {
    telemetry::init_telemetry(args.json_logs)?;
    let run = args.resolve()?;

    info!("Map: {}", run.map_path.display());
    let mut sim = Simulation::from_map_file(run.model.clone(), &run.map_path)
        .context("failed to set up simulation")?;

    let mut collector = MetricsCollector::new();
    let summary = sim.run(run.num_ticks, &mut collector)?;
    if let Some(last) = collector.latest() {
        info!(
            step = last.step,
            traders = last.traders,
            volume = last.trade_volume,
            price = ?last.price_gmean,
            "Final tick"
        );
    }

    collector
        .export(&args.out)
        .with_context(|| format!("failed to write metrics to {}", args.out.display()))?;
    info!(
        "Saved {} and {}",
        args.out.join("model_vars.csv").display(),
        args.out.join("agent_vars.csv").display()
    );
    info!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn write_default_config(output: PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(&RunConfig::default())?;
    std::fs::write(&output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Default configuration written to {}", output.display());
    Ok(())
}
