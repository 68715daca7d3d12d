//! Configuration types for the simulation.

use crate::{Error, NeighborMode, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Width of the world grid
    pub width: i32,
    /// Height of the world grid
    pub height: i32,
    /// Wrap edges (toroidal) instead of clipping at the bounds
    pub torus: bool,
    /// Number of traders placed at start
    pub initial_population: usize,
    /// Initial sugar/spice endowment range (inclusive)
    pub endowment_min: u32,
    pub endowment_max: u32,
    /// Per-tick consumption range (inclusive)
    pub metabolism_min: u32,
    pub metabolism_max: u32,
    /// Search radius range (inclusive)
    pub vision_min: u32,
    pub vision_max: u32,
    /// Neighborhood shape shared by all traders
    pub neighbor_mode: NeighborMode,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Standard deviation of the Gaussian noise added to the sugar map
    pub sugar_noise_sigma: f64,
    /// Standard deviation of the Gaussian noise added to the spice map
    pub spice_noise_sigma: f64,
    /// Round noised capacities to the nearest integer
    pub integerize_maps: bool,
    /// Constant added to the base height map before deriving capacities
    pub capacity_baseline: f64,
    /// Trading passes per tick
    pub trading_passes: u32,
    /// Negotiation rounds allowed per trader pair per pass
    pub max_trade_rounds: u32,
    /// Minimum welfare improvement both parties need for a trade
    pub min_trade_gain: f64,
    /// Break movement ties by wrapped (shortest-way) distance on a torus
    pub wrapped_move_distance: bool,
    /// Ticks between progress log lines
    pub log_interval: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            torus: true,
            initial_population: 200,
            endowment_min: 2,
            endowment_max: 3,
            metabolism_min: 2,
            metabolism_max: 3,
            vision_min: 3,
            vision_max: 5,
            neighbor_mode: NeighborMode::Moore,
            seed: 0,
            sugar_noise_sigma: 0.5,
            spice_noise_sigma: 0.5,
            integerize_maps: true,
            capacity_baseline: 1.0,
            trading_passes: 2,
            max_trade_rounds: 64,
            min_trade_gain: 1e-12,
            wrapped_move_distance: true,
            log_interval: 100,
        }
    }
}

impl ModelConfig {
    pub fn cell_count(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    /// Check every setup-time constraint. Construction must not proceed on error.
    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::Config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        check_range("endowment", self.endowment_min, self.endowment_max)?;
        check_range("metabolism", self.metabolism_min, self.metabolism_max)?;
        check_range("vision", self.vision_min, self.vision_max)?;
        let span = self.width.max(self.height);
        if i64::from(self.vision_max) > i64::from(span) {
            return Err(Error::Config(format!(
                "vision_max {} exceeds the largest grid dimension {span}",
                self.vision_max
            )));
        }

        for (name, sigma) in [
            ("sugar_noise_sigma", self.sugar_noise_sigma),
            ("spice_noise_sigma", self.spice_noise_sigma),
        ] {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be finite and non-negative, got {sigma}"
                )));
            }
        }
        if !self.capacity_baseline.is_finite() {
            return Err(Error::Config("capacity_baseline must be finite".to_string()));
        }
        if self.max_trade_rounds == 0 {
            return Err(Error::Config("max_trade_rounds must be at least 1".to_string()));
        }
        if !self.min_trade_gain.is_finite() || self.min_trade_gain < 0.0 {
            return Err(Error::Config(format!(
                "min_trade_gain must be finite and non-negative, got {}",
                self.min_trade_gain
            )));
        }
        if self.initial_population > self.cell_count() {
            return Err(Error::Config(format!(
                "initial population {} exceeds the {} placeable cells",
                self.initial_population,
                self.cell_count()
            )));
        }
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn check_range(name: &str, min: u32, max: u32) -> Result<()> {
    if min > max {
        return Err(Error::Config(format!(
            "{name} range is inverted: min {min} > max {max}"
        )));
    }
    Ok(())
}

/// A complete run: model parameters, landscape source and tick count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of ticks to simulate
    pub num_ticks: u64,
    /// Height-map file the capacities are derived from
    pub map_path: PathBuf,
    /// Engine configuration
    pub model: ModelConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_ticks: 1000,
            map_path: PathBuf::from("data/sugar-map.txt"),
            model: ModelConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = ModelConfig::default();
        assert_eq!(config.width, 50);
        assert_eq!(config.height, 50);
        assert_eq!(config.initial_population, 200);
        assert_eq!(config.trading_passes, 2);
        assert_eq!(config.max_trade_rounds, 64);
        assert!(config.validate().is_ok());

        let run = RunConfig::default();
        assert_eq!(run.num_ticks, 1000);
    }

    #[test]
    fn test_rejects_non_positive_dimensions() {
        let config = ModelConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let config = ModelConfig {
            vision_min: 6,
            vision_max: 2,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vision"));
    }

    #[test]
    fn test_rejects_vision_beyond_grid() {
        let config = ModelConfig {
            width: 5,
            height: 5,
            initial_population: 2,
            vision_min: u32::MAX,
            vision_max: u32::MAX,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("vision_max"));

        let wide = ModelConfig {
            width: 6,
            height: 2,
            initial_population: 2,
            vision_min: 1,
            vision_max: 6,
            ..Default::default()
        };
        assert!(wide.validate().is_ok());
        let wider = ModelConfig {
            vision_max: 7,
            ..wide
        };
        assert!(wider.validate().is_err());
    }

    #[test]
    fn test_rejects_overpopulation() {
        let config = ModelConfig {
            width: 3,
            height: 3,
            vision_min: 1,
            vision_max: 1,
            initial_population: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_negative_noise() {
        let config = ModelConfig {
            spice_noise_sigma: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"width": 20, "neighbor_mode": "von_neumann"}"#).unwrap();
        assert_eq!(config.width, 20);
        assert_eq!(config.height, 50);
        assert_eq!(config.neighbor_mode, NeighborMode::VonNeumann);
    }

    #[test]
    fn test_run_config_nests_model() {
        let run: RunConfig =
            serde_json::from_str(r#"{"num_ticks": 5, "model": {"seed": 9}}"#).unwrap();
        assert_eq!(run.num_ticks, 5);
        assert_eq!(run.model.seed, 9);
        assert_eq!(run.map_path, PathBuf::from("data/sugar-map.txt"));
    }
}
