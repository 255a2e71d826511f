//! Farming engine - stake/unstake/claim flows settling through the ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::farm_pool::{ClaimSnapshot, FarmPool, FarmSummary, FarmUserInfo};
use crate::domain::dex::DexEngine;
use crate::infrastructure::ledger::{LedgerAdapter, SettlementModule, SettlementRequest};
use crate::shared::errors::{DexError, FarmError};
use crate::shared::types::FarmSettings;

/// Result of a successful stake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeOutcome {
    pub pool_id: String,
    pub lp_staked: f64,
    pub rewards_settled: f64,
}

/// Result of a successful unstake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstakeOutcome {
    pub pool_id: String,
    pub lp_unstaked: f64,
    pub rewards_settled: f64,
}

/// Result of a claim across all farms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimAllOutcome {
    pub total_rewards: f64,
    pub farms_claimed: usize,
}

/// Global farming statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmingStats {
    pub total_farms: usize,
    pub active_farms: usize,
    pub total_tvl: f64,
    pub total_stakers: usize,
    pub total_rewards_distributed: f64,
    pub uptime_days: f64,
}

/// Manages every farm pool and the settlement of their reward payouts.
///
/// The engine never owns the DEX engine - methods that need pool access
/// take it as an explicit argument, and LP only ever moves through the
/// pool's `transfer_lp` API (user to escrow and back).
///
/// Every flow follows preview -> settle externally -> commit: a reward
/// payout that the ledger refuses leaves farm accounting, escrow balances
/// and positions untouched.
pub struct FarmingEngine {
    settings: FarmSettings,
    farms: HashMap<String, FarmPool>,
    ledger: Arc<dyn LedgerAdapter>,

    total_rewards_distributed: f64,
    created_at: DateTime<Utc>,
}

impl FarmingEngine {
    pub fn new(settings: FarmSettings, ledger: Arc<dyn LedgerAdapter>) -> Self {
        Self {
            settings,
            farms: HashMap::new(),
            ledger,
            total_rewards_distributed: 0.0,
            created_at: Utc::now(),
        }
    }

    /// Escrow account name holding all staked LP of one pool
    pub fn escrow_account(pool_id: &str) -> String {
        format!("FARM_ESCROW_{}", pool_id)
    }

    pub fn farm(&self, pool_id: &str) -> Option<&FarmPool> {
        self.farms.get(pool_id)
    }

    /// Create a farm for an existing DEX pool
    pub fn create_farm(
        &mut self,
        dex: &DexEngine,
        pool_id: &str,
        base_reward_rate: f64,
        bonus_multiplier: f64,
    ) -> Result<(), FarmError> {
        if self.farms.contains_key(pool_id) {
            return Err(FarmError::Conflict(format!(
                "farm already exists for {}",
                pool_id
            )));
        }

        let pool = dex
            .pool(pool_id)
            .ok_or_else(|| FarmError::Dex(DexError::PoolNotFound(pool_id.to_string())))?;

        self.farms.insert(
            pool_id.to_string(),
            FarmPool::new(
                pool_id,
                &pool.token_a,
                &pool.token_b,
                base_reward_rate,
                bonus_multiplier,
                dex.tier_schedule().clone(),
            ),
        );

        tracing::info!(pool = pool_id, base_reward_rate, "farm created");
        Ok(())
    }

    /// Fetch a farm, creating it lazily from the DEX pool on first use
    fn get_or_create_farm(
        &mut self,
        dex: &DexEngine,
        pool_id: &str,
    ) -> Result<&mut FarmPool, FarmError> {
        if !self.farms.contains_key(pool_id) {
            let rate = self.settings.base_reward_rate;
            self.create_farm(dex, pool_id, rate, 1.0)?;
        }
        // just inserted or already present
        self.farms
            .get_mut(pool_id)
            .ok_or_else(|| FarmError::FarmNotFound(pool_id.to_string()))
    }

    /// Pay out rewards through the external ledger.
    ///
    /// Returns an error unless the receipt reports settlement success;
    /// callers commit local state only after this returns `Ok`.
    async fn settle_rewards(&self, user: &str, amount_nxt: f64) -> Result<(), FarmError> {
        let request = SettlementRequest::new(
            &self.settings.reward_source,
            user,
            amount_nxt,
            SettlementModule::Farming,
        );
        let receipt = self.ledger.settle(request).await?;

        if !receipt.settlement_success {
            return Err(FarmError::SettlementFailed(receipt.message));
        }
        Ok(())
    }

    /// Stake LP tokens into a pool's farm.
    ///
    /// Order matters: any pending rewards settle externally first, the farm
    /// accounting commits second, and the LP moves into escrow last. A
    /// settlement failure aborts before any local mutation.
    pub async fn stake_lp(
        &mut self,
        dex: &mut DexEngine,
        user: &str,
        pool_id: &str,
        lp_amount: f64,
    ) -> Result<StakeOutcome, FarmError> {
        if lp_amount <= 0.0 {
            return Err(FarmError::InvalidAmount(lp_amount));
        }

        let lp_value = dex.lp_value_nxt(pool_id, lp_amount)?;
        let available = dex.lp_balance(pool_id, user)?;
        if available < lp_amount {
            return Err(FarmError::Dex(DexError::InsufficientLpBalance {
                have: available,
                need: lp_amount,
            }));
        }

        let farm = self.get_or_create_farm(dex, pool_id)?;
        if !farm.is_active {
            return Err(FarmError::FarmInactive(pool_id.to_string()));
        }

        let snapshot = farm.preview_stake(user, Utc::now());
        let pending = snapshot.pending_rewards;

        if pending > 0.0 {
            self.settle_rewards(user, pending).await?;
        }

        let farm = self
            .farms
            .get_mut(pool_id)
            .ok_or_else(|| FarmError::FarmNotFound(pool_id.to_string()))?;
        farm.commit_stake(snapshot, lp_amount, lp_value)?;

        dex.transfer_lp(pool_id, user, &Self::escrow_account(pool_id), lp_amount)
            .map_err(|e| FarmError::Dex(DexError::InvariantViolation(e.to_string())))?;

        self.total_rewards_distributed += pending;

        tracing::info!(pool = pool_id, user, lp_amount, "LP staked");
        Ok(StakeOutcome {
            pool_id: pool_id.to_string(),
            lp_staked: lp_amount,
            rewards_settled: pending,
        })
    }

    /// Unstake LP tokens, settling accrued rewards in the same flow
    pub async fn unstake_lp(
        &mut self,
        dex: &mut DexEngine,
        user: &str,
        pool_id: &str,
        lp_amount: f64,
    ) -> Result<UnstakeOutcome, FarmError> {
        let farm = self
            .farms
            .get(pool_id)
            .ok_or_else(|| FarmError::FarmNotFound(pool_id.to_string()))?;

        let snapshot = farm.preview_unstake(user, lp_amount, Utc::now())?;
        let pending = snapshot.pending_rewards;

        if pending > 0.0 {
            self.settle_rewards(user, pending).await?;
        }

        let farm = self
            .farms
            .get_mut(pool_id)
            .ok_or_else(|| FarmError::FarmNotFound(pool_id.to_string()))?;
        farm.commit_unstake(snapshot)?;

        dex.transfer_lp(pool_id, &Self::escrow_account(pool_id), user, lp_amount)
            .map_err(|e| FarmError::Dex(DexError::InvariantViolation(e.to_string())))?;

        self.total_rewards_distributed += pending;

        tracing::info!(pool = pool_id, user, lp_amount, "LP unstaked");
        Ok(UnstakeOutcome {
            pool_id: pool_id.to_string(),
            lp_unstaked: lp_amount,
            rewards_settled: pending,
        })
    }

    /// Claim accrued rewards from one farm
    pub async fn claim_rewards(&mut self, user: &str, pool_id: &str) -> Result<f64, FarmError> {
        let farm = self
            .farms
            .get(pool_id)
            .ok_or_else(|| FarmError::FarmNotFound(pool_id.to_string()))?;

        let snapshot = farm.preview_claim(user, Utc::now())?;
        let rewards = snapshot.rewards;

        self.settle_rewards(user, rewards).await?;

        let farm = self
            .farms
            .get_mut(pool_id)
            .ok_or_else(|| FarmError::FarmNotFound(pool_id.to_string()))?;
        farm.commit_claim(snapshot)?;

        self.total_rewards_distributed += rewards;

        tracing::info!(pool = pool_id, user, rewards, "rewards claimed");
        Ok(rewards)
    }

    /// Claim rewards from every farm in one combined settlement.
    ///
    /// All farms are previewed first; the aggregate settles as a single
    /// ledger transfer; each farm then commits its own snapshot. Snapshots
    /// carry farm versions, so any farm that moved in between refuses its
    /// commit with `Conflict` rather than double-paying.
    pub async fn claim_all_rewards(&mut self, user: &str) -> Result<ClaimAllOutcome, FarmError> {
        let now = Utc::now();

        let mut snapshots: Vec<ClaimSnapshot> = Vec::new();
        for farm in self.farms.values() {
            match farm.preview_claim(user, now) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(FarmError::NoStake) | Err(FarmError::NothingToClaim) => continue,
                Err(err) => return Err(err),
            }
        }

        if snapshots.is_empty() {
            return Err(FarmError::NothingToClaim);
        }

        // re-validate before settling: every previewed farm must still hold
        // the user at the previewed version
        for snapshot in &snapshots {
            let farm = self
                .farms
                .get(&snapshot.pool_id)
                .ok_or_else(|| FarmError::FarmNotFound(snapshot.pool_id.clone()))?;
            if farm.position(user).is_none() {
                return Err(FarmError::Conflict(format!(
                    "user left farm {} before settlement",
                    snapshot.pool_id
                )));
            }
        }

        let total: f64 = snapshots.iter().map(|s| s.rewards).sum();
        self.settle_rewards(user, total).await?;

        let farms_claimed = snapshots.len();
        for snapshot in snapshots {
            let pool_id = snapshot.pool_id.clone();
            if let Some(farm) = self.farms.get_mut(&pool_id) {
                farm.commit_claim(snapshot)?;
            }
        }

        self.total_rewards_distributed += total;

        tracing::info!(user, total, farms_claimed, "claimed across all farms");
        Ok(ClaimAllOutcome {
            total_rewards: total,
            farms_claimed,
        })
    }

    /// Every farm position held by a user
    pub fn user_farms(&self, user: &str, now: DateTime<Utc>) -> Vec<FarmUserInfo> {
        self.farms
            .values()
            .filter_map(|farm| farm.user_info(user, now))
            .collect()
    }

    /// Summaries of all active farms
    pub fn all_farms(&self) -> Vec<FarmSummary> {
        self.farms
            .values()
            .filter(|farm| farm.is_active)
            .map(|farm| farm.summary())
            .collect()
    }

    /// Total value locked across every farm
    pub fn total_tvl(&self) -> f64 {
        self.farms.values().map(|f| f.total_value_locked).sum()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> FarmingStats {
        FarmingStats {
            total_farms: self.farms.len(),
            active_farms: self.farms.values().filter(|f| f.is_active).count(),
            total_tvl: self.total_tvl(),
            total_stakers: self.farms.values().map(|f| f.staker_count()).sum(),
            total_rewards_distributed: self.total_rewards_distributed,
            uptime_days: (now - self.created_at).num_milliseconds() as f64 / 86_400_000.0,
        }
    }
}
