//! Ledger adapter contract consumed by the exchange and farming engines

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::errors::LedgerError;

/// Module a settlement originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementModule {
    Dex,
    Farming,
}

impl SettlementModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementModule::Dex => "dex",
            SettlementModule::Farming => "farming",
        }
    }
}

/// One value transfer to settle on the external ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub source: String,
    pub recipient: String,
    pub amount_nxt: f64,
    pub module: SettlementModule,
    pub transfer_id: String,
}

impl SettlementRequest {
    pub fn new(source: &str, recipient: &str, amount_nxt: f64, module: SettlementModule) -> Self {
        Self {
            source: source.to_string(),
            recipient: recipient.to_string(),
            amount_nxt,
            module,
            transfer_id: crate::shared::utils::generate_id(),
        }
    }
}

/// Outcome of a settlement attempt.
///
/// `settlement_success` is the single gate for committing local accounting
/// state; callers inspect it and `message`, everything else is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub transfer_id: String,
    pub settlement_success: bool,
    pub message: String,
    pub amount_nxt: f64,
    pub fee_nxt: f64,
    pub net_amount_nxt: f64,
    pub timestamp: DateTime<Utc>,
}

/// Unit-safe wrapper around the external account-balance store.
///
/// `get_balance` and `transfer` auto-create missing accounts with a zero
/// balance. `settle` is the sole blocking boundary of the core: a durable
/// payout that may fail, whose receipt gates every local state commit.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    async fn get_balance(&self, address: &str) -> Result<f64, LedgerError>;

    async fn transfer(&self, from: &str, to: &str, amount_nxt: f64) -> Result<(), LedgerError>;

    async fn settle(&self, request: SettlementRequest) -> Result<SettlementReceipt, LedgerError>;
}
