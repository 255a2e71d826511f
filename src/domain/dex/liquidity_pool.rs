//! Constant-product AMM liquidity pool

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::tier_schedule::TierSchedule;
use super::{PoolQuote, SwapReceipt};
use crate::shared::errors::DexError;
use crate::shared::types::{is_protected_account, is_valid_account_name};

/// One liquidity-withdrawal request, kept for auditing.
///
/// With a zero withdrawal delay the request executes in the same call that
/// records it; with a non-zero delay it must age before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub provider: String,
    pub lp_tokens: f64,
    pub requested_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Two-asset AMM pool pairing a token against the base currency.
///
/// `token_a` is always the non-base token, `token_b` the base currency.
/// The swap fee rate is a pure function of current TVL and is re-derived
/// after every state-changing operation.
#[derive(Debug, Clone)]
pub struct LiquidityPool {
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: f64,
    pub reserve_b: f64,
    pub lp_token_supply: f64,
    pub fee_rate: f64,

    lp_balances: HashMap<String, f64>,
    pub total_volume_a: f64,
    pub total_volume_b: f64,
    pub total_fees_collected: f64,
    pub created_at: DateTime<Utc>,

    withdrawal_requests: Vec<WithdrawalRequest>,
    withdrawal_delay_secs: u64,
    schedule: TierSchedule,
}

impl LiquidityPool {
    pub fn new(
        token_a: &str,
        token_b: &str,
        schedule: TierSchedule,
        withdrawal_delay_secs: u64,
    ) -> Self {
        let fee_rate = schedule.fee_rate(0.0);
        Self {
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            reserve_a: 0.0,
            reserve_b: 0.0,
            lp_token_supply: 0.0,
            fee_rate,
            lp_balances: HashMap::new(),
            total_volume_a: 0.0,
            total_volume_b: 0.0,
            total_fees_collected: 0.0,
            created_at: Utc::now(),
            withdrawal_requests: Vec::new(),
            withdrawal_delay_secs,
            schedule,
        }
    }

    /// Unique pool ID, always `"{OTHER}-{BASE}"`
    pub fn pool_id(&self) -> String {
        format!("{}-{}", self.token_a, self.token_b)
    }

    /// Total value locked: sum of both reserves
    pub fn tvl(&self) -> f64 {
        self.reserve_a + self.reserve_b
    }

    /// Marginal price of the input token in terms of the other side
    pub fn mid_price(&self, input_token: &str) -> f64 {
        if self.reserve_a == 0.0 || self.reserve_b == 0.0 {
            return 0.0;
        }

        if input_token == self.token_a {
            self.reserve_b / self.reserve_a
        } else {
            self.reserve_a / self.reserve_b
        }
    }

    /// LP balance held by an address (escrowed LP sits under its own entry)
    pub fn lp_balance_of(&self, address: &str) -> f64 {
        self.lp_balances.get(address).copied().unwrap_or(0.0)
    }

    /// Provider's share of the pool, 0-100%
    pub fn pool_share(&self, address: &str) -> f64 {
        if self.lp_token_supply == 0.0 {
            return 0.0;
        }
        self.lp_balance_of(address) / self.lp_token_supply * 100.0
    }

    /// Number of LP holders, escrow entries included
    pub fn provider_count(&self) -> usize {
        self.lp_balances.values().filter(|b| **b > 0.0).count()
    }

    /// Sum of all LP balances; equals `lp_token_supply` when the invariant holds
    pub fn lp_balance_sum(&self) -> f64 {
        self.lp_balances.values().sum()
    }

    pub fn withdrawal_requests(&self) -> &[WithdrawalRequest] {
        &self.withdrawal_requests
    }

    fn other_side(&self, input_token: &str) -> Result<(f64, f64), DexError> {
        if input_token == self.token_a {
            Ok((self.reserve_a, self.reserve_b))
        } else if input_token == self.token_b {
            Ok((self.reserve_b, self.reserve_a))
        } else {
            Err(DexError::InvalidPair(format!(
                "{} is not part of pool {}",
                input_token,
                self.pool_id()
            )))
        }
    }

    /// Re-derive the fee tier from current TVL
    fn retier(&mut self) {
        self.fee_rate = self.schedule.fee_rate(self.tvl());
    }

    /// Quote a swap without mutating state.
    ///
    /// Soft-fails to a zero quote on empty reserves or non-positive input so
    /// callers can render "no liquidity" instead of an error.
    pub fn quote(&self, input_token: &str, input_amount: f64) -> Result<PoolQuote, DexError> {
        let (reserve_in, reserve_out) = self.other_side(input_token)?;

        if input_amount <= 0.0 || reserve_in == 0.0 || reserve_out == 0.0 {
            return Ok(PoolQuote::zero(self.fee_rate));
        }

        let fee_amount = input_amount * self.fee_rate;
        let input_with_fee = input_amount - fee_amount;

        // Constant product: (x + dx')(y - dy) = xy  =>  dy = y*dx' / (x + dx')
        let output_amount = reserve_out * input_with_fee / (reserve_in + input_with_fee);

        let old_price = reserve_out / reserve_in;
        let new_price = (reserve_out - output_amount) / (reserve_in + input_amount);
        let price_impact_pct = ((new_price - old_price) / old_price).abs() * 100.0;

        Ok(PoolQuote {
            output_amount,
            price_impact_pct,
            effective_price: output_amount / input_amount,
            fee_rate: self.fee_rate,
            fee_amount,
        })
    }

    /// Execute a swap against the pool reserves.
    ///
    /// Rejects before any mutation; on success updates reserves, volume and
    /// fee counters, then re-derives the fee tier from the new TVL.
    pub fn swap(
        &mut self,
        input_token: &str,
        input_amount: f64,
        min_output: f64,
    ) -> Result<SwapReceipt, DexError> {
        if input_amount <= 0.0 {
            return Err(DexError::InvalidAmount(input_amount));
        }

        let (reserve_in, reserve_out) = self.other_side(input_token)?;
        if reserve_in == 0.0 || reserve_out == 0.0 {
            return Err(DexError::InsufficientLiquidity(self.pool_id()));
        }

        let quote = self.quote(input_token, input_amount)?;
        if quote.output_amount < min_output {
            return Err(DexError::SlippageExceeded {
                got: quote.output_amount,
                min: min_output,
            });
        }

        let output_token = if input_token == self.token_a {
            self.reserve_a += input_amount;
            self.reserve_b -= quote.output_amount;
            self.total_volume_a += input_amount;
            self.token_b.clone()
        } else {
            self.reserve_b += input_amount;
            self.reserve_a -= quote.output_amount;
            self.total_volume_b += input_amount;
            self.token_a.clone()
        };

        self.total_fees_collected += quote.fee_amount;
        self.retier();

        Ok(SwapReceipt {
            pool_id: self.pool_id(),
            input_token: input_token.to_string(),
            output_token,
            input_amount,
            output_amount: quote.output_amount,
            fee_rate: quote.fee_rate,
            fee_amount: quote.fee_amount,
            price_impact_pct: quote.price_impact_pct,
        })
    }

    /// Add liquidity, minting LP shares to the provider.
    ///
    /// The first deposit bootstraps the reserves and mints `sqrt(a*b)`;
    /// later deposits must match the pool ratio within the configured
    /// tolerance and mint proportionally.
    pub fn add_liquidity(
        &mut self,
        provider: &str,
        amount_a: f64,
        amount_b: f64,
        ratio_tolerance: f64,
    ) -> Result<f64, DexError> {
        if amount_a <= 0.0 {
            return Err(DexError::InvalidAmount(amount_a));
        }
        if amount_b <= 0.0 {
            return Err(DexError::InvalidAmount(amount_b));
        }

        let lp_tokens = if self.lp_token_supply == 0.0 {
            self.reserve_a = amount_a;
            self.reserve_b = amount_b;
            (amount_a * amount_b).sqrt()
        } else {
            let ratio_a = amount_a / self.reserve_a;
            let ratio_b = amount_b / self.reserve_b;

            if (ratio_a - ratio_b).abs() > ratio_tolerance {
                return Err(DexError::UnbalancedDeposit { ratio_a, ratio_b });
            }

            let minted = ratio_a.min(ratio_b) * self.lp_token_supply;
            self.reserve_a += amount_a;
            self.reserve_b += amount_b;
            minted
        };

        *self.lp_balances.entry(provider.to_string()).or_insert(0.0) += lp_tokens;
        self.lp_token_supply += lp_tokens;
        self.retier();

        Ok(lp_tokens)
    }

    /// Remove liquidity, burning the provider's LP shares.
    ///
    /// Providers must be regular user accounts; system accounts (treasury,
    /// validator pool, farm escrow, ...) can never withdraw directly. Staked
    /// LP is invisible to this call because it lives under the farm escrow
    /// entry. Every call records a withdrawal request; when the pool carries
    /// a non-zero withdrawal delay the request must age before it executes.
    pub fn remove_liquidity(
        &mut self,
        provider: &str,
        lp_tokens: f64,
        now: DateTime<Utc>,
    ) -> Result<(f64, f64), DexError> {
        if lp_tokens <= 0.0 {
            return Err(DexError::InvalidAmount(lp_tokens));
        }

        if !is_valid_account_name(provider) || is_protected_account(provider) {
            return Err(DexError::Unauthorized(provider.to_string()));
        }

        let balance = self.lp_balance_of(provider);
        if balance < lp_tokens {
            return Err(DexError::InsufficientLpBalance {
                have: balance,
                need: lp_tokens,
            });
        }

        self.enforce_withdrawal_delay(provider, lp_tokens, now)?;

        let share = lp_tokens / self.lp_token_supply;
        let amount_a = self.reserve_a * share;
        let amount_b = self.reserve_b * share;

        self.reserve_a -= amount_a;
        self.reserve_b -= amount_b;

        self.lp_balances
            .insert(provider.to_string(), balance - lp_tokens);
        self.lp_token_supply -= lp_tokens;
        self.retier();

        tracing::info!(
            pool = %self.pool_id(),
            provider,
            lp_tokens,
            "liquidity withdrawn"
        );

        Ok((amount_a, amount_b))
    }

    /// Record the withdrawal request and, when a delay is configured, gate
    /// execution until a matching request has aged past the delay.
    fn enforce_withdrawal_delay(
        &mut self,
        provider: &str,
        lp_tokens: f64,
        now: DateTime<Utc>,
    ) -> Result<(), DexError> {
        if self.withdrawal_delay_secs == 0 {
            self.withdrawal_requests.push(WithdrawalRequest {
                provider: provider.to_string(),
                lp_tokens,
                requested_at: now,
                executed_at: Some(now),
            });
            return Ok(());
        }

        let delay = Duration::seconds(self.withdrawal_delay_secs as i64);
        let pending = self
            .withdrawal_requests
            .iter_mut()
            .find(|r| r.executed_at.is_none() && r.provider == provider && r.lp_tokens >= lp_tokens);

        match pending {
            Some(request) => {
                let unlock_at = request.requested_at + delay;
                if now < unlock_at {
                    return Err(DexError::WithdrawalPending {
                        remaining_secs: (unlock_at - now).num_seconds().max(1),
                    });
                }
                request.executed_at = Some(now);
                Ok(())
            }
            None => {
                self.withdrawal_requests.push(WithdrawalRequest {
                    provider: provider.to_string(),
                    lp_tokens,
                    requested_at: now,
                    executed_at: None,
                });
                tracing::info!(
                    pool = %self.pool_id(),
                    provider,
                    lp_tokens,
                    delay_secs = self.withdrawal_delay_secs,
                    "withdrawal request registered"
                );
                Err(DexError::WithdrawalPending {
                    remaining_secs: self.withdrawal_delay_secs as i64,
                })
            }
        }
    }

    /// Move LP between two balance entries without touching reserves.
    ///
    /// This is the only way external components may re-home LP, e.g. the
    /// farming engine moving stake into the farm escrow entry.
    pub fn transfer_lp(&mut self, from: &str, to: &str, amount: f64) -> Result<(), DexError> {
        if amount <= 0.0 {
            return Err(DexError::InvalidAmount(amount));
        }

        let from_balance = self.lp_balance_of(from);
        if from_balance < amount {
            return Err(DexError::InsufficientLpBalance {
                have: from_balance,
                need: amount,
            });
        }

        self.lp_balances
            .insert(from.to_string(), from_balance - amount);
        *self.lp_balances.entry(to.to_string()).or_insert(0.0) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(reserve_a: f64, reserve_b: f64) -> LiquidityPool {
        let mut pool = LiquidityPool::new("TOKEN", "NXT", TierSchedule::default(), 0);
        pool.add_liquidity("alice", reserve_a, reserve_b, 0.02)
            .unwrap();
        pool
    }

    #[test]
    fn test_first_deposit_mints_sqrt() {
        let pool = pool_with(10_000.0, 1_000.0);

        let expected = (10_000.0_f64 * 1_000.0).sqrt();
        assert!((pool.lp_token_supply - expected).abs() < 1e-6);
        assert!((pool.lp_balance_of("alice") - expected).abs() < 1e-6);
        assert!((expected - 3_162.2776).abs() < 1e-3);
    }

    #[test]
    fn test_simple_swap_scenario() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        // TVL 11_000 puts the pool in the 0.3% band
        assert_eq!(pool.fee_rate, 0.003);

        let receipt = pool.swap("TOKEN", 100.0, 0.0).unwrap();
        let expected = 1_000.0 * 99.7 / (10_000.0 + 99.7);
        assert!((receipt.output_amount - expected).abs() < 1e-9);
        assert!((receipt.output_amount - 9.87).abs() < 0.01);
    }

    #[test]
    fn test_constant_product_non_decreasing() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        let mut k = pool.reserve_a * pool.reserve_b;

        for i in 1..=20 {
            let (token, amount) = if i % 2 == 0 {
                ("TOKEN", 50.0 * i as f64)
            } else {
                ("NXT", 5.0 * i as f64)
            };
            pool.swap(token, amount, 0.0).unwrap();

            let next_k = pool.reserve_a * pool.reserve_b;
            assert!(next_k >= k - 1e-9, "product shrank on swap {}", i);
            k = next_k;
        }
    }

    #[test]
    fn test_slippage_rejected_without_mutation() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        let before_a = pool.reserve_a;
        let before_b = pool.reserve_b;

        let err = pool.swap("TOKEN", 100.0, 50.0).unwrap_err();
        assert!(matches!(err, DexError::SlippageExceeded { .. }));
        assert_eq!(pool.reserve_a, before_a);
        assert_eq!(pool.reserve_b, before_b);
    }

    #[test]
    fn test_swap_rejects_unknown_token() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        assert!(matches!(
            pool.swap("OTHER", 10.0, 0.0),
            Err(DexError::InvalidPair(_))
        ));
    }

    #[test]
    fn test_quote_soft_fails_on_empty_pool() {
        let pool = LiquidityPool::new("TOKEN", "NXT", TierSchedule::default(), 0);
        let quote = pool.quote("TOKEN", 100.0).unwrap();
        assert_eq!(quote.output_amount, 0.0);
        assert_eq!(quote.price_impact_pct, 0.0);
    }

    #[test]
    fn test_unbalanced_deposit_rejected() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        let supply = pool.lp_token_supply;

        // 10:1 pool, deposit at 5:1 is way past the 2% tolerance
        let err = pool
            .add_liquidity("bob", 500.0, 100.0, 0.02)
            .unwrap_err();
        assert!(matches!(err, DexError::UnbalancedDeposit { .. }));
        assert_eq!(pool.lp_token_supply, supply);
        assert_eq!(pool.reserve_a, 10_000.0);
    }

    #[test]
    fn test_proportional_deposit_mints_share() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        let supply = pool.lp_token_supply;

        let minted = pool.add_liquidity("bob", 1_000.0, 100.0, 0.02).unwrap();
        assert!((minted - supply * 0.1).abs() < 1e-6);
        assert!((pool.lp_balance_sum() - pool.lp_token_supply).abs() < 1e-9);
    }

    #[test]
    fn test_remove_liquidity_proportional() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        let supply = pool.lp_token_supply;

        let (out_a, out_b) = pool
            .remove_liquidity("alice", supply / 2.0, Utc::now())
            .unwrap();
        assert!((out_a - 5_000.0).abs() < 1e-6);
        assert!((out_b - 500.0).abs() < 1e-6);
        assert!((pool.lp_balance_sum() - pool.lp_token_supply).abs() < 1e-9);
    }

    #[test]
    fn test_protected_accounts_cannot_withdraw() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        // even a recorded balance under a system name must not be withdrawable
        pool.transfer_lp("alice", "VALIDATOR_POOL", 100.0).unwrap();

        for name in ["VALIDATOR_POOL", "TREASURY", "FARM_ESCROW_TOKEN-NXT"] {
            let err = pool.remove_liquidity(name, 1.0, Utc::now()).unwrap_err();
            assert!(matches!(err, DexError::Unauthorized(_)), "{}", name);
        }
    }

    #[test]
    fn test_malformed_provider_rejected() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        let err = pool
            .remove_liquidity("alice; drop table", 1.0, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DexError::Unauthorized(_)));
    }

    #[test]
    fn test_withdrawal_delay_gates_execution() {
        let mut pool = LiquidityPool::new("TOKEN", "NXT", TierSchedule::default(), 86_400);
        pool.add_liquidity("alice", 10_000.0, 1_000.0, 0.02)
            .unwrap();

        let t0 = Utc::now();
        // first call registers the request
        let err = pool.remove_liquidity("alice", 100.0, t0).unwrap_err();
        assert!(matches!(err, DexError::WithdrawalPending { .. }));
        assert_eq!(pool.withdrawal_requests().len(), 1);

        // still locked one hour later
        let err = pool
            .remove_liquidity("alice", 100.0, t0 + Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, DexError::WithdrawalPending { .. }));

        // executes once the delay has aged out
        let (out_a, _) = pool
            .remove_liquidity("alice", 100.0, t0 + Duration::hours(25))
            .unwrap();
        assert!(out_a > 0.0);
    }

    #[test]
    fn test_immediate_withdrawal_still_audited() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        pool.remove_liquidity("alice", 100.0, Utc::now()).unwrap();

        assert_eq!(pool.withdrawal_requests().len(), 1);
        assert!(pool.withdrawal_requests()[0].executed_at.is_some());
    }

    #[test]
    fn test_transfer_lp_conserves_supply() {
        let mut pool = pool_with(10_000.0, 1_000.0);
        let supply = pool.lp_token_supply;

        pool.transfer_lp("alice", "FARM_ESCROW_TOKEN-NXT", 1_000.0)
            .unwrap();
        assert_eq!(pool.lp_balance_of("FARM_ESCROW_TOKEN-NXT"), 1_000.0);
        assert_eq!(pool.lp_token_supply, supply);
        assert!((pool.lp_balance_sum() - supply).abs() < 1e-9);

        let err = pool.transfer_lp("alice", "X", supply * 2.0).unwrap_err();
        assert!(matches!(err, DexError::InsufficientLpBalance { .. }));
    }

    #[test]
    fn test_fee_tier_tracks_tvl() {
        let mut pool = LiquidityPool::new("TOKEN", "NXT", TierSchedule::default(), 0);
        pool.add_liquidity("alice", 400.0, 400.0, 0.02).unwrap();
        assert_eq!(pool.fee_rate, 0.005);

        pool.add_liquidity("alice", 40_000.0, 40_000.0, 0.02)
            .unwrap();
        // TVL is now 80_800, inside the 0.2% band
        assert_eq!(pool.fee_rate, 0.002);
    }
}
