//! Sugarscape trading world.
//!
//! Traders move across a grid of renewable sugar and spice cells, harvest,
//! barter with neighbours, metabolize and die when both stocks run out.

pub mod grid;
pub mod resource;
pub mod trader;
pub mod trade;
pub mod scheduler;
pub mod movement;
pub mod metrics;
pub mod simulation;

pub use grid::{CellContents, Grid};
pub use metrics::{AgentRecord, MetricsCollector, TickReport};
pub use resource::ResourceCell;
pub use scheduler::Scheduler;
pub use simulation::{RunSummary, Simulation};
pub use trade::{negotiate, propose_exchange, Exchange, Lot, Negotiation, StopReason, TradeRules};
pub use trader::{TradeLog, Trader, TraderTraits};
