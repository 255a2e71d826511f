//! Common types used across the application

use serde::{Deserialize, Serialize};

/// Account names that regular providers may never withdraw as.
///
/// Any provider whose name starts with one of these prefixes is a system
/// account and is rejected by liquidity withdrawal and LP transfers out.
pub const PROTECTED_ACCOUNT_PREFIXES: &[&str] = &[
    "TREASURY",
    "VALIDATOR_POOL",
    "ECOSYSTEM_FUND",
    "FARM_ESCROW",
    "FARMING_REWARDS",
    "TRANSITION_RESERVE",
];

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexSettings {
    /// Symbol every pool must pair against (one side of every pool)
    pub base_currency: String,
    /// Account that receives routed swap fees
    pub validator_pool: String,
    /// Account seeded with the genesis supply of the base currency
    pub treasury: String,
    /// Genesis supply of the base currency minted to the treasury
    pub genesis_supply: f64,
    /// Maximum deviation between deposit ratio and pool ratio
    pub ratio_tolerance: f64,
    /// Default slippage tolerance applied when the caller passes none
    pub default_slippage: f64,
    /// Seconds a withdrawal request must age before it executes (0 = immediate)
    pub withdrawal_delay_secs: u64,
}

/// Farming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmSettings {
    /// Account reward settlements are paid from
    pub reward_source: String,
    /// Daily base reward rate applied to every farm
    pub base_reward_rate: f64,
}

/// Ledger adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Fee rate deducted from every settlement payout
    pub settlement_fee_rate: f64,
    /// Account the settlement fee is routed to
    pub fee_wallet: String,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub dex: DexSettings,
    pub farming: FarmSettings,
    pub ledger: LedgerSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dex: DexSettings {
                base_currency: "NXT".to_string(),
                validator_pool: "VALIDATOR_POOL".to_string(),
                treasury: "TREASURY".to_string(),
                genesis_supply: 1_000_000.0,
                ratio_tolerance: 0.02,
                default_slippage: 0.01,
                withdrawal_delay_secs: 0,
            },
            farming: FarmSettings {
                reward_source: "FARMING_REWARDS".to_string(),
                base_reward_rate: 0.01,
            },
            ledger: LedgerSettings {
                settlement_fee_rate: 0.005,
                fee_wallet: "SDK_WALLET".to_string(),
            },
        }
    }
}

/// Check whether an account name belongs to a protected system account.
pub fn is_protected_account(name: &str) -> bool {
    PROTECTED_ACCOUNT_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Validate a provider/user account name: alphanumeric, underscore, hyphen.
pub fn is_valid_account_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
