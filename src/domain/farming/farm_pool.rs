//! Farming pool for LP token staking with preview/commit accounting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::farm_position::FarmPosition;
use crate::domain::dex::TierSchedule;
use crate::shared::errors::FarmError;

/// Informational APY display band
const MIN_APY_PCT: f64 = 10.0;
const MAX_APY_PCT: f64 = 500.0;

/// Snapshot of pending rewards taken before a stake top-up.
///
/// Commits consume the snapshot by value, so a snapshot settles at most
/// once; the embedded version catches any farm mutation in between.
#[derive(Debug, Clone)]
pub struct StakeSnapshot {
    pub pool_id: String,
    pub user: String,
    pub pending_rewards: f64,
    pub snapshot_at: DateTime<Utc>,
    pub(super) version: u64,
}

/// Snapshot of an unstake computed without mutating state
#[derive(Debug, Clone)]
pub struct UnstakeSnapshot {
    pub pool_id: String,
    pub user: String,
    pub lp_amount: f64,
    pub pending_rewards: f64,
    pub value_to_remove: f64,
    pub snapshot_at: DateTime<Utc>,
    pub(super) version: u64,
}

/// Snapshot of a reward claim computed without mutating state
#[derive(Debug, Clone)]
pub struct ClaimSnapshot {
    pub pool_id: String,
    pub user: String,
    pub rewards: f64,
    pub snapshot_at: DateTime<Utc>,
    pub(super) version: u64,
}

/// A user's view of one farm, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmUserInfo {
    pub pool_id: String,
    pub staked_lp: f64,
    pub share_pct: f64,
    pub pending_rewards: f64,
    pub total_claimed: f64,
    pub staked_at: DateTime<Utc>,
    pub stake_duration_days: f64,
    pub apy_pct: f64,
}

/// Aggregate view of one farm, for listings and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmSummary {
    pub pool_id: String,
    pub token_a: String,
    pub token_b: String,
    pub total_staked_lp: f64,
    pub total_value_locked: f64,
    pub apy_pct: f64,
    pub tier: String,
    pub reward_multiplier: f64,
    pub staker_count: usize,
    pub total_rewards_distributed: f64,
    pub is_active: bool,
}

/// LP staking pool earning time-accrued rewards.
///
/// Rewards accrue continuously as
/// `base_rate * share * elapsed_days * multiplier * tvl`, where the
/// multiplier is a step function of TVL from the shared tier schedule.
///
/// Mutation happens exclusively through `commit_*` methods consuming a
/// snapshot produced by the matching `preview_*`; a version counter bumps
/// on every commit and any stale snapshot is refused with `Conflict`.
#[derive(Debug, Clone)]
pub struct FarmPool {
    pub pool_id: String,
    pub token_a: String,
    pub token_b: String,

    pub total_staked_lp: f64,
    pub total_value_locked: f64,

    pub base_reward_rate: f64,
    pub bonus_multiplier: f64,

    stakers: HashMap<String, FarmPosition>,

    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub total_rewards_distributed: f64,

    version: u64,
    schedule: TierSchedule,
}

impl FarmPool {
    pub fn new(
        pool_id: &str,
        token_a: &str,
        token_b: &str,
        base_reward_rate: f64,
        bonus_multiplier: f64,
        schedule: TierSchedule,
    ) -> Self {
        Self {
            pool_id: pool_id.to_string(),
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            total_staked_lp: 0.0,
            total_value_locked: 0.0,
            base_reward_rate,
            bonus_multiplier,
            stakers: HashMap::new(),
            created_at: Utc::now(),
            is_active: true,
            total_rewards_distributed: 0.0,
            version: 0,
            schedule,
        }
    }

    /// Current reward multiplier: TVL tier times the farm bonus
    pub fn reward_multiplier(&self) -> f64 {
        self.schedule.reward_multiplier(self.total_value_locked) * self.bonus_multiplier
    }

    /// Tier name currently in effect
    pub fn tier_name(&self) -> &'static str {
        self.schedule.band_for(self.total_value_locked).name
    }

    /// Informational APY: daily rate annualized with the current multiplier
    pub fn projected_apy(&self) -> f64 {
        (self.base_reward_rate * self.reward_multiplier() * 365.0 * 100.0)
            .clamp(MIN_APY_PCT, MAX_APY_PCT)
    }

    pub fn staker_count(&self) -> usize {
        self.stakers.len()
    }

    pub fn position(&self, user: &str) -> Option<&FarmPosition> {
        self.stakers.get(user)
    }

    /// Sum of all position stakes; equals `total_staked_lp` when the
    /// invariant holds
    pub fn staked_sum(&self) -> f64 {
        self.stakers.values().map(|p| p.staked_lp).sum()
    }

    /// Pending rewards for a user at `now`; pure function of elapsed time,
    /// stake share, the tier multiplier and TVL
    pub fn pending_rewards(&self, user: &str, now: DateTime<Utc>) -> f64 {
        let Some(position) = self.stakers.get(user) else {
            return 0.0;
        };
        if self.total_staked_lp <= 0.0 {
            return 0.0;
        }

        let elapsed_days =
            position.time_since_claim(now).num_milliseconds() as f64 / 86_400_000.0;
        if elapsed_days <= 0.0 {
            return 0.0;
        }

        let share = position.staked_lp / self.total_staked_lp;
        self.base_reward_rate * share * elapsed_days * self.reward_multiplier()
            * self.total_value_locked
    }

    /// Snapshot pending rewards ahead of a stake top-up.
    ///
    /// Always succeeds - a fresh staker snapshots zero pending.
    pub fn preview_stake(&self, user: &str, now: DateTime<Utc>) -> StakeSnapshot {
        StakeSnapshot {
            pool_id: self.pool_id.clone(),
            user: user.to_string(),
            pending_rewards: self.pending_rewards(user, now),
            snapshot_at: now,
            version: self.version,
        }
    }

    /// Apply a stake after its snapshot rewards have settled externally
    pub fn commit_stake(
        &mut self,
        snapshot: StakeSnapshot,
        lp_amount: f64,
        lp_value_nxt: f64,
    ) -> Result<(), FarmError> {
        if !self.is_active {
            return Err(FarmError::FarmInactive(self.pool_id.clone()));
        }
        if lp_amount <= 0.0 {
            return Err(FarmError::InvalidAmount(lp_amount));
        }
        self.check_version(snapshot.version)?;

        match self.stakers.get_mut(&snapshot.user) {
            Some(position) => {
                position.last_reward_claim = snapshot.snapshot_at;
                position.total_rewards_claimed += snapshot.pending_rewards;
                position.staked_lp += lp_amount;
                self.total_rewards_distributed += snapshot.pending_rewards;
            }
            None => {
                self.stakers.insert(
                    snapshot.user.clone(),
                    FarmPosition::new(
                        &snapshot.user,
                        &self.pool_id,
                        lp_amount,
                        snapshot.snapshot_at,
                    ),
                );
            }
        }

        self.total_staked_lp += lp_amount;
        self.total_value_locked += lp_value_nxt;
        self.version += 1;
        Ok(())
    }

    /// Compute an unstake without modifying state
    pub fn preview_unstake(
        &self,
        user: &str,
        lp_amount: f64,
        now: DateTime<Utc>,
    ) -> Result<UnstakeSnapshot, FarmError> {
        if lp_amount <= 0.0 {
            return Err(FarmError::InvalidAmount(lp_amount));
        }
        let position = self.stakers.get(user).ok_or(FarmError::NoStake)?;
        if position.staked_lp < lp_amount {
            return Err(FarmError::InsufficientStake {
                have: position.staked_lp,
                requested: lp_amount,
            });
        }

        let value_to_remove = if self.total_staked_lp > 0.0 {
            lp_amount / self.total_staked_lp * self.total_value_locked
        } else {
            0.0
        };

        Ok(UnstakeSnapshot {
            pool_id: self.pool_id.clone(),
            user: user.to_string(),
            lp_amount,
            pending_rewards: self.pending_rewards(user, now),
            value_to_remove,
            snapshot_at: now,
            version: self.version,
        })
    }

    /// Apply an unstake after its snapshot rewards have settled externally.
    ///
    /// Deletes the position when the remaining stake reaches zero.
    pub fn commit_unstake(&mut self, snapshot: UnstakeSnapshot) -> Result<(), FarmError> {
        self.check_version(snapshot.version)?;

        let position = self
            .stakers
            .get_mut(&snapshot.user)
            .ok_or(FarmError::NoStake)?;

        position.staked_lp -= snapshot.lp_amount;
        position.last_reward_claim = snapshot.snapshot_at;
        position.total_rewards_claimed += snapshot.pending_rewards;
        let emptied = position.staked_lp <= 0.0;

        self.total_staked_lp -= snapshot.lp_amount;
        self.total_value_locked = (self.total_value_locked - snapshot.value_to_remove).max(0.0);
        self.total_rewards_distributed += snapshot.pending_rewards;

        if emptied {
            self.stakers.remove(&snapshot.user);
        }

        self.version += 1;
        Ok(())
    }

    /// Compute a reward claim without modifying state
    pub fn preview_claim(
        &self,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimSnapshot, FarmError> {
        if !self.stakers.contains_key(user) {
            return Err(FarmError::NoStake);
        }

        let rewards = self.pending_rewards(user, now);
        if rewards <= 0.0 {
            return Err(FarmError::NothingToClaim);
        }

        Ok(ClaimSnapshot {
            pool_id: self.pool_id.clone(),
            user: user.to_string(),
            rewards,
            snapshot_at: now,
            version: self.version,
        })
    }

    /// Apply a reward claim after external settlement
    pub fn commit_claim(&mut self, snapshot: ClaimSnapshot) -> Result<(), FarmError> {
        self.check_version(snapshot.version)?;

        let position = self
            .stakers
            .get_mut(&snapshot.user)
            .ok_or(FarmError::NoStake)?;

        position.last_reward_claim = snapshot.snapshot_at;
        position.total_rewards_claimed += snapshot.rewards;
        self.total_rewards_distributed += snapshot.rewards;

        self.version += 1;
        Ok(())
    }

    /// Test-only: backdate a position's claim clock so accrual is owed
    #[cfg(test)]
    pub(crate) fn rewind_claim_clock(&mut self, user: &str, to: DateTime<Utc>) {
        if let Some(position) = self.stakers.get_mut(user) {
            position.last_reward_claim = to;
        }
    }

    fn check_version(&self, snapshot_version: u64) -> Result<(), FarmError> {
        if snapshot_version != self.version {
            return Err(FarmError::Conflict(format!(
                "farm {} moved from version {} to {}",
                self.pool_id, snapshot_version, self.version
            )));
        }
        Ok(())
    }

    /// A user's view of this farm
    pub fn user_info(&self, user: &str, now: DateTime<Utc>) -> Option<FarmUserInfo> {
        let position = self.stakers.get(user)?;

        let share_pct = if self.total_staked_lp > 0.0 {
            position.staked_lp / self.total_staked_lp * 100.0
        } else {
            0.0
        };

        Some(FarmUserInfo {
            pool_id: self.pool_id.clone(),
            staked_lp: position.staked_lp,
            share_pct,
            pending_rewards: self.pending_rewards(user, now),
            total_claimed: position.total_rewards_claimed,
            staked_at: position.staked_at,
            stake_duration_days: position.stake_duration(now).num_milliseconds() as f64
                / 86_400_000.0,
            apy_pct: self.projected_apy(),
        })
    }

    pub fn summary(&self) -> FarmSummary {
        FarmSummary {
            pool_id: self.pool_id.clone(),
            token_a: self.token_a.clone(),
            token_b: self.token_b.clone(),
            total_staked_lp: self.total_staked_lp,
            total_value_locked: self.total_value_locked,
            apy_pct: self.projected_apy(),
            tier: self.tier_name().to_string(),
            reward_multiplier: self.reward_multiplier(),
            staker_count: self.stakers.len(),
            total_rewards_distributed: self.total_rewards_distributed,
            is_active: self.is_active,
        }
    }
}
