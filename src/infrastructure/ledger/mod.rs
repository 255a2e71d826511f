//! Ledger infrastructure - the external settlement boundary

mod adapter;
mod memory_ledger;

pub use adapter::{LedgerAdapter, SettlementModule, SettlementReceipt, SettlementRequest};
pub use memory_ledger::InMemoryLedger;
