//! DEX domain - AMM pools and the exchange engine

mod dex_engine;
mod liquidity_pool;
mod tier_schedule;

pub use dex_engine::{DexEngine, DexStats};
pub use liquidity_pool::{LiquidityPool, WithdrawalRequest};
pub use tier_schedule::{TierBand, TierSchedule, MAX_FEE_RATE, MIN_FEE_RATE};

use serde::{Deserialize, Serialize};

/// Swap quote against a single pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolQuote {
    pub output_amount: f64,
    pub price_impact_pct: f64,
    pub effective_price: f64,
    pub fee_rate: f64,
    pub fee_amount: f64,
}

impl PoolQuote {
    /// Quote for an unfillable request (empty pool, non-positive input)
    pub fn zero(fee_rate: f64) -> Self {
        Self {
            output_amount: 0.0,
            price_impact_pct: 0.0,
            effective_price: 0.0,
            fee_rate,
            fee_amount: 0.0,
        }
    }
}

/// Result of an executed pool swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub pool_id: String,
    pub input_token: String,
    pub output_token: String,
    pub input_amount: f64,
    pub output_amount: f64,
    pub fee_rate: f64,
    pub fee_amount: f64,
    pub price_impact_pct: f64,
}
