//! In-memory ledger adapter for local sessions and tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::adapter::{LedgerAdapter, SettlementReceipt, SettlementRequest};
use crate::shared::errors::LedgerError;
use crate::shared::types::LedgerSettings;

/// Ledger backed by a process-local account map.
///
/// Settlements deduct the configured fee, route it to the fee wallet and
/// credit the net amount to the recipient; failed settlements return a
/// receipt with `settlement_success = false` and move no funds. The
/// `fail_settlements` switch injects settlement failures for tests.
pub struct InMemoryLedger {
    accounts: Mutex<HashMap<String, f64>>,
    receipts: Mutex<Vec<SettlementReceipt>>,
    settings: LedgerSettings,
    fail_settlements: AtomicBool,
}

impl InMemoryLedger {
    pub fn new(settings: LedgerSettings) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            receipts: Mutex::new(Vec::new()),
            settings,
            fail_settlements: AtomicBool::new(false),
        }
    }

    /// Credit an account directly, e.g. to seed a session
    pub fn fund(&self, address: &str, amount_nxt: f64) {
        let mut accounts = self.accounts.lock().unwrap();
        *accounts.entry(address.to_string()).or_insert(0.0) += amount_nxt;
    }

    /// Make every subsequent settlement fail (or succeed again)
    pub fn set_fail_settlements(&self, fail: bool) {
        self.fail_settlements.store(fail, Ordering::SeqCst);
    }

    /// Receipts of every settlement attempted so far
    pub fn receipts(&self) -> Vec<SettlementReceipt> {
        self.receipts.lock().unwrap().clone()
    }

    fn record(&self, receipt: SettlementReceipt) -> SettlementReceipt {
        self.receipts.lock().unwrap().push(receipt.clone());
        receipt
    }
}

#[async_trait]
impl LedgerAdapter for InMemoryLedger {
    async fn get_balance(&self, address: &str) -> Result<f64, LedgerError> {
        let mut accounts = self.accounts.lock().unwrap();
        Ok(*accounts.entry(address.to_string()).or_insert(0.0))
    }

    async fn transfer(&self, from: &str, to: &str, amount_nxt: f64) -> Result<(), LedgerError> {
        if amount_nxt <= 0.0 {
            return Err(LedgerError::InvalidAmount(amount_nxt));
        }

        let mut accounts = self.accounts.lock().unwrap();
        let from_balance = *accounts.entry(from.to_string()).or_insert(0.0);
        if from_balance < amount_nxt {
            return Err(LedgerError::InsufficientFunds {
                address: from.to_string(),
                have: from_balance,
                need: amount_nxt,
            });
        }

        accounts.insert(from.to_string(), from_balance - amount_nxt);
        *accounts.entry(to.to_string()).or_insert(0.0) += amount_nxt;
        Ok(())
    }

    async fn settle(&self, request: SettlementRequest) -> Result<SettlementReceipt, LedgerError> {
        if request.amount_nxt <= 0.0 {
            return Err(LedgerError::InvalidAmount(request.amount_nxt));
        }

        let fee_nxt = request.amount_nxt * self.settings.settlement_fee_rate;
        let net_amount_nxt = request.amount_nxt - fee_nxt;

        if self.fail_settlements.load(Ordering::SeqCst) {
            return Ok(self.record(SettlementReceipt {
                transfer_id: request.transfer_id,
                settlement_success: false,
                message: "Settlement rejected by ledger".to_string(),
                amount_nxt: request.amount_nxt,
                fee_nxt,
                net_amount_nxt,
                timestamp: Utc::now(),
            }));
        }

        let mut accounts = self.accounts.lock().unwrap();
        let source_balance = *accounts.entry(request.source.clone()).or_insert(0.0);
        if source_balance < request.amount_nxt {
            return Ok(self.record(SettlementReceipt {
                transfer_id: request.transfer_id,
                settlement_success: false,
                message: format!(
                    "Settlement failed: {} has {:.4}, needs {:.4}",
                    request.source, source_balance, request.amount_nxt
                ),
                amount_nxt: request.amount_nxt,
                fee_nxt,
                net_amount_nxt,
                timestamp: Utc::now(),
            }));
        }

        accounts.insert(request.source.clone(), source_balance - request.amount_nxt);
        *accounts.entry(request.recipient.clone()).or_insert(0.0) += net_amount_nxt;
        *accounts
            .entry(self.settings.fee_wallet.clone())
            .or_insert(0.0) += fee_nxt;
        drop(accounts);

        tracing::debug!(
            module = request.module.as_str(),
            transfer_id = %request.transfer_id,
            amount = request.amount_nxt,
            "settlement applied"
        );

        Ok(self.record(SettlementReceipt {
            transfer_id: request.transfer_id,
            settlement_success: true,
            message: format!(
                "Settled {:.4} NXT to {} ({:.4} fee)",
                net_amount_nxt, request.recipient, fee_nxt
            ),
            amount_nxt: request.amount_nxt,
            fee_nxt,
            net_amount_nxt,
            timestamp: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ledger::SettlementModule;

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(LedgerSettings {
            settlement_fee_rate: 0.005,
            fee_wallet: "SDK_WALLET".to_string(),
        })
    }

    #[tokio::test]
    async fn test_get_balance_auto_creates_account() {
        let ledger = ledger();
        assert_eq!(ledger.get_balance("fresh").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let ledger = ledger();
        ledger.fund("alice", 100.0);

        ledger.transfer("alice", "bob", 40.0).await.unwrap();
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 60.0);
        assert_eq!(ledger.get_balance("bob").await.unwrap(), 40.0);

        let err = ledger.transfer("alice", "bob", 100.0).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_settlement_routes_fee() {
        let ledger = ledger();
        ledger.fund("FARMING_REWARDS", 1_000.0);

        let receipt = ledger
            .settle(SettlementRequest::new(
                "FARMING_REWARDS",
                "alice",
                100.0,
                SettlementModule::Farming,
            ))
            .await
            .unwrap();

        assert!(receipt.settlement_success);
        assert!((receipt.fee_nxt - 0.5).abs() < 1e-9);
        assert!((ledger.get_balance("alice").await.unwrap() - 99.5).abs() < 1e-9);
        assert!((ledger.get_balance("SDK_WALLET").await.unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_injected_failure_moves_no_funds() {
        let ledger = ledger();
        ledger.fund("FARMING_REWARDS", 1_000.0);
        ledger.set_fail_settlements(true);

        let receipt = ledger
            .settle(SettlementRequest::new(
                "FARMING_REWARDS",
                "alice",
                100.0,
                SettlementModule::Farming,
            ))
            .await
            .unwrap();

        assert!(!receipt.settlement_success);
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 0.0);
        assert_eq!(ledger.get_balance("FARMING_REWARDS").await.unwrap(), 1_000.0);
    }

    #[tokio::test]
    async fn test_underfunded_source_fails_settlement() {
        let ledger = ledger();
        ledger.fund("FARMING_REWARDS", 10.0);

        let receipt = ledger
            .settle(SettlementRequest::new(
                "FARMING_REWARDS",
                "alice",
                100.0,
                SettlementModule::Farming,
            ))
            .await
            .unwrap();

        assert!(!receipt.settlement_success);
        assert_eq!(ledger.get_balance("FARMING_REWARDS").await.unwrap(), 10.0);
        assert_eq!(ledger.receipts().len(), 1);
    }
}
