//! Height-map loading and the derivation of sugar/spice capacity maps.

use crate::numeric::{gaussian, round_half_even};
use crate::{Error, ModelConfig, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Rectangular row-major matrix of non-negative values. Row 0 is grid row y = 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landscape {
    width: i32,
    height: i32,
    values: Vec<f64>,
}

impl Landscape {
    pub fn uniform(width: i32, height: i32, value: f64) -> Self {
        let size = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            values: vec![value; size],
        }
    }

    /// Build from explicit rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(Error::Landscape("matrix is empty".to_string()));
        }

        let mut values = Vec::with_capacity(width * height);
        for (y, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(Error::Landscape(format!(
                    "row {y} has {} columns, expected {width}",
                    row.len()
                )));
            }
            for (x, value) in row.into_iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::Landscape(format!(
                        "value {value} at ({x}, {y}) is not a non-negative number"
                    )));
                }
                values.push(value);
            }
        }

        Ok(Self {
            width: width as i32,
            height: height as i32,
            values,
        })
    }

    /// Parse a whitespace-delimited matrix, one row per line. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let rows = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_no, line)| {
                line.split_whitespace()
                    .map(|token| {
                        token.parse::<f64>().map_err(|_| {
                            Error::Landscape(format!(
                                "line {}: cannot parse '{token}' as a number",
                                line_no + 1
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::LandscapeNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let landscape = Self::parse(&text)?;
        debug!(
            path = %path.display(),
            width = landscape.width,
            height = landscape.height,
            "Loaded landscape"
        );
        Ok(landscape)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn get(&self, x: i32, y: i32) -> f64 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Flip left-to-right
    pub fn mirrored(&self) -> Self {
        let mut values = Vec::with_capacity(self.values.len());
        for y in 0..self.height {
            for x in (0..self.width).rev() {
                values.push(self.get(x, y));
            }
        }
        Self {
            width: self.width,
            height: self.height,
            values,
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            width: self.width,
            height: self.height,
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Add independent N(0, sigma) noise per cell, clip at zero, optionally
    /// round half-to-even. Also clips when sigma is zero.
    pub fn noised<R: Rng + ?Sized>(&self, sigma: f64, integerize: bool, rng: &mut R) -> Self {
        let values = self
            .values
            .iter()
            .map(|&v| {
                let noisy = if sigma > 0.0 { v + sigma * gaussian(rng) } else { v };
                let clipped = noisy.max(0.0);
                if integerize {
                    round_half_even(clipped)
                } else {
                    clipped
                }
            })
            .collect();
        Self {
            width: self.width,
            height: self.height,
            values,
        }
    }
}

/// Per-cell regrowth ceilings for both goods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityMaps {
    pub sugar: Landscape,
    pub spice: Landscape,
}

impl CapacityMaps {
    /// Sugar is `base + baseline`; spice is the mirrored sugar base scaled by
    /// `v * 2 - 1`. Each is noised independently, sugar first.
    pub fn derive<R: Rng + ?Sized>(
        base: &Landscape,
        config: &ModelConfig,
        rng: &mut R,
    ) -> Result<Self> {
        if base.width != config.width || base.height != config.height {
            return Err(Error::Config(format!(
                "landscape is {}x{} but the grid is {}x{}",
                base.width, base.height, config.width, config.height
            )));
        }

        let baseline = config.capacity_baseline;
        let sugar_base = base.map(|v| v + baseline);
        let spice_base = sugar_base.mirrored().map(|v| v * 2.0 - 1.0);

        let sugar = sugar_base.noised(config.sugar_noise_sigma, config.integerize_maps, rng);
        let spice = spice_base.noised(config.spice_noise_sigma, config.integerize_maps, rng);
        Ok(Self { sugar, spice })
    }
}
