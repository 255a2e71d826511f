//! A single user's staked position within one farm

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Stake record for one `(user, pool)` pair.
///
/// Created on first stake, removed when `staked_lp` returns to zero.
/// `total_rewards_claimed` is monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmPosition {
    pub user_address: String,
    pub pool_id: String,
    pub staked_lp: f64,
    pub staked_at: DateTime<Utc>,
    pub last_reward_claim: DateTime<Utc>,
    pub total_rewards_claimed: f64,
}

impl FarmPosition {
    pub fn new(user_address: &str, pool_id: &str, staked_lp: f64, now: DateTime<Utc>) -> Self {
        Self {
            user_address: user_address.to_string(),
            pool_id: pool_id.to_string(),
            staked_lp,
            staked_at: now,
            last_reward_claim: now,
            total_rewards_claimed: 0.0,
        }
    }

    /// How long the position has been open
    pub fn stake_duration(&self, now: DateTime<Utc>) -> Duration {
        now - self.staked_at
    }

    /// Time since rewards were last claimed
    pub fn time_since_claim(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_reward_claim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations() {
        let t0 = Utc::now();
        let position = FarmPosition::new("alice", "TOKEN-NXT", 100.0, t0);

        let later = t0 + Duration::days(3);
        assert_eq!(position.stake_duration(later).num_days(), 3);
        assert_eq!(position.time_since_claim(later).num_days(), 3);
        assert_eq!(position.total_rewards_claimed, 0.0);
    }
}
