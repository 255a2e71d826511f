// src/report.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::dex::{DexEngine, DexStats, LiquidityPool};
use crate::domain::farming::{FarmSummary, FarmingEngine, FarmingStats};

/// Full state report of an exchange session
#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub dex: DexStats,
    pub farming: FarmingStats,

    pub pools: Vec<PoolDetails>,
    pub farms: Vec<FarmSummary>,

    pub timestamp: DateTime<Utc>,
    pub session_notes: Option<Vec<String>>,
}

/// Per-pool details
#[derive(Debug, Serialize, Deserialize)]
pub struct PoolDetails {
    pub pool_id: String,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: f64,
    pub reserve_b: f64,
    pub price_a_in_b: f64,
    pub price_b_in_a: f64,
    pub lp_token_supply: f64,
    pub fee_rate: f64,
    pub tvl: f64,
    pub total_volume_a: f64,
    pub total_volume_b: f64,
    pub total_fees_collected: f64,
    pub provider_count: usize,
}

impl PoolDetails {
    pub fn from_pool(pool: &LiquidityPool) -> Self {
        Self {
            pool_id: pool.pool_id(),
            token_a: pool.token_a.clone(),
            token_b: pool.token_b.clone(),
            reserve_a: pool.reserve_a,
            reserve_b: pool.reserve_b,
            price_a_in_b: pool.mid_price(&pool.token_a),
            price_b_in_a: pool.mid_price(&pool.token_b),
            lp_token_supply: pool.lp_token_supply,
            fee_rate: pool.fee_rate,
            tvl: pool.tvl(),
            total_volume_a: pool.total_volume_a,
            total_volume_b: pool.total_volume_b,
            total_fees_collected: pool.total_fees_collected,
            provider_count: pool.provider_count(),
        }
    }
}

impl ExchangeReport {
    pub fn new(dex: &DexEngine, farming: &FarmingEngine) -> Self {
        let now = Utc::now();
        Self {
            dex: dex.stats(),
            farming: farming.stats(now),
            pools: dex.pools().map(PoolDetails::from_pool).collect(),
            farms: farming.all_farms(),
            timestamp: now,
            session_notes: None,
        }
    }

    pub fn with_session_notes(mut self, notes: Vec<String>) -> Self {
        self.session_notes = Some(notes);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ledger::InMemoryLedger;
    use crate::shared::types::EngineConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_report_renders_to_json() {
        let config = EngineConfig::default();
        let ledger = Arc::new(InMemoryLedger::new(config.ledger.clone()));
        let mut dex = DexEngine::new(config.dex.clone(), ledger.clone());
        let mut farming = FarmingEngine::new(config.farming.clone(), ledger.clone());

        dex.create_token("TOKEN", "Test Token", 100_000.0, "alice", 18)
            .unwrap();
        ledger.fund("alice", 10_000.0);
        dex.create_pool("TOKEN", "NXT", 10_000.0, 1_000.0, "alice")
            .await
            .unwrap();
        farming
            .stake_lp(&mut dex, "alice", "TOKEN-NXT", 100.0)
            .await
            .unwrap();

        let report = ExchangeReport::new(&dex, &farming)
            .with_session_notes(vec!["smoke".to_string()]);

        assert_eq!(report.pools.len(), 1);
        assert_eq!(report.farms.len(), 1);
        assert_eq!(report.pools[0].pool_id, "TOKEN-NXT");

        let json = report.to_json().unwrap();
        assert!(json.contains("\"pool_id\": \"TOKEN-NXT\""));
        assert!(json.contains("\"total_swaps\""));
    }
}
