//! Bilateral sugar/spice negotiation.
//!
//! A pair trades in integer lots at the geometric mean of their MRS values,
//! one lot per round, until a gate rejects the next lot or the round cap is
//! reached. A rejection ends the pair's negotiation for the current pass; it
//! is an expected outcome, not an error.

use crate::trader::Trader;
use serde::{Deserialize, Serialize};
use sugarscape_core::{is_close, round_half_even, Good, ModelConfig};
use tracing::trace;

const MRS_REL_TOL: f64 = 1e-9;
const MRS_ABS_TOL: f64 = 1e-12;
const MIN_PRICE: f64 = 1e-9;

/// Negotiation limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRules {
    /// Lots a single pair may exchange per pass
    pub max_rounds: u32,
    /// Welfare improvement each side needs for a lot to go through
    pub min_gain: f64,
}

impl Default for TradeRules {
    fn default() -> Self {
        Self {
            max_rounds: 64,
            min_gain: 1e-12,
        }
    }
}

impl From<&ModelConfig> for TradeRules {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_rounds: config.max_trade_rounds,
            min_gain: config.min_trade_gain,
        }
    }
}

/// Why a negotiation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    /// One side holds nothing of either good
    Depleted,
    NonFiniteMrs,
    /// MRS values already equal
    Equilibrium,
    /// Geometric-mean price non-finite or not positive
    InvalidPrice,
    /// The lot would drive a stock negative
    Infeasible,
    /// One side would not gain at least `min_gain` welfare
    NoWelfareGain,
    /// The lot would invert the MRS ordering
    MrsCrossing,
    RoundCap,
}

/// Integer quantities of one lot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub sugar: f64,
    pub spice: f64,
}

impl Lot {
    /// 1 sugar for round(price) spice when price >= 1, else round(1/price)
    /// sugar for 1 spice. Never less than one unit of either.
    pub fn for_price(price: f64) -> Option<Self> {
        if !price.is_finite() || price <= MIN_PRICE {
            return None;
        }
        let lot = if price >= 1.0 {
            Self {
                sugar: 1.0,
                spice: round_half_even(price).max(1.0),
            }
        } else {
            Self {
                sugar: round_half_even(1.0 / price).max(1.0),
                spice: 1.0,
            }
        };
        Some(lot)
    }
}

/// One lot that passed every gate, with the resulting stocks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub price: f64,
    /// The good the initiating trader gives up
    pub sells: Good,
    pub lot: Lot,
    pub trader_after: (f64, f64),
    pub partner_after: (f64, f64),
}

impl Exchange {
    pub fn apply(&self, trader: &mut Trader, partner: &mut Trader) {
        (trader.sugar, trader.spice) = self.trader_after;
        (partner.sugar, partner.spice) = self.partner_after;
    }
}

/// Result of negotiating with one partner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    pub rounds: u32,
    pub stop: StopReason,
}

/// Evaluate the next lot between `trader` (initiator) and `partner` without
/// mutating either.
pub fn propose_exchange(
    trader: &Trader,
    partner: &Trader,
    rules: &TradeRules,
) -> Result<Exchange, StopReason> {
    if trader.is_depleted() || partner.is_depleted() {
        return Err(StopReason::Depleted);
    }

    let mrs_trader = trader.mrs();
    let mrs_partner = partner.mrs();
    if !mrs_trader.is_finite() || !mrs_partner.is_finite() {
        return Err(StopReason::NonFiniteMrs);
    }
    if is_close(mrs_trader, mrs_partner, MRS_REL_TOL, MRS_ABS_TOL) {
        return Err(StopReason::Equilibrium);
    }

    let price = (mrs_trader * mrs_partner).sqrt();
    let lot = Lot::for_price(price).ok_or(StopReason::InvalidPrice)?;

    // The side with the higher MRS values spice less relative to sugar and
    // gives up spice.
    let sells = if mrs_trader > mrs_partner {
        Good::Spice
    } else {
        Good::Sugar
    };
    let (d_sugar, d_spice) = match sells {
        Good::Spice => (lot.sugar, -lot.spice),
        Good::Sugar => (-lot.sugar, lot.spice),
    };

    let trader_after = (trader.sugar + d_sugar, trader.spice + d_spice);
    let partner_after = (partner.sugar - d_sugar, partner.spice - d_spice);
    let stocks = [trader_after.0, trader_after.1, partner_after.0, partner_after.1];
    if stocks.iter().any(|&stock| stock < 0.0) {
        return Err(StopReason::Infeasible);
    }

    let gain_trader = trader.welfare(trader_after.0, trader_after.1) - trader.current_welfare();
    let gain_partner =
        partner.welfare(partner_after.0, partner_after.1) - partner.current_welfare();
    if gain_trader < rules.min_gain || gain_partner < rules.min_gain {
        return Err(StopReason::NoWelfareGain);
    }

    let mrs_trader_after = trader.mrs_at(trader_after.0, trader_after.1);
    let mrs_partner_after = partner.mrs_at(partner_after.0, partner_after.1);
    let keeps_order = match sells {
        Good::Spice => mrs_trader > mrs_partner && mrs_trader_after >= mrs_partner_after,
        Good::Sugar => mrs_trader < mrs_partner && mrs_trader_after <= mrs_partner_after,
    };
    if !keeps_order {
        return Err(StopReason::MrsCrossing);
    }

    Ok(Exchange {
        price,
        sells,
        lot,
        trader_after,
        partner_after,
    })
}

/// Trade lot by lot until a gate rejects or the round cap is hit. Each
/// executed lot is logged on the initiator only.
pub fn negotiate(trader: &mut Trader, partner: &mut Trader, rules: &TradeRules) -> Negotiation {
    let mut rounds = 0;
    while rounds < rules.max_rounds {
        match propose_exchange(trader, partner, rules) {
            Ok(exchange) => {
                exchange.apply(trader, partner);
                trader.trade_log.record(exchange.price, partner.id);
                rounds += 1;
                trace!(
                    trader = %trader.id,
                    partner = %partner.id,
                    price = exchange.price,
                    sells = %exchange.sells,
                    sugar = exchange.lot.sugar,
                    spice = exchange.lot.spice,
                    "Trade executed"
                );
            }
            Err(stop) => {
                trace!(
                    trader = %trader.id,
                    partner = %partner.id,
                    rounds,
                    reason = ?stop,
                    "Negotiation stopped"
                );
                return Negotiation { rounds, stop };
            }
        }
    }

    Negotiation {
        rounds,
        stop: StopReason::RoundCap,
    }
}
