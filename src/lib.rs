//! NexusOS AMM exchange and LP farming engine
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod report;
pub mod shared;

// Re-export main types for convenience
pub use domain::dex::DexEngine;
pub use domain::farming::FarmingEngine;
pub use infrastructure::ledger::{InMemoryLedger, LedgerAdapter};
pub use report::ExchangeReport;
pub use shared::types::EngineConfig;
