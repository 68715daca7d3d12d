//! Core types and utilities for the Sugarscape trading simulation.

pub mod types;
pub mod config;
pub mod error;
pub mod landscape;
pub mod numeric;

pub use error::{Error, Result};
pub use types::*;
pub use config::*;
pub use landscape::{CapacityMaps, Landscape};
pub use numeric::*;
