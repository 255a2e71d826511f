//! Exchange engine - owns tokens and pools, moves funds, routes fees

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::liquidity_pool::LiquidityPool;
use super::tier_schedule::TierSchedule;
use super::{PoolQuote, SwapReceipt};
use crate::domain::token::Token;
use crate::infrastructure::ledger::{LedgerAdapter, SettlementModule, SettlementRequest};
use crate::shared::errors::{DexError, TokenError};
use crate::shared::types::DexSettings;

/// Global exchange statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexStats {
    pub total_tokens: usize,
    pub total_pools: usize,
    pub total_swaps: u64,
    pub total_volume: f64,
    pub total_liquidity_added: f64,
    pub total_fees_routed: f64,
}

/// Owns every token and pool for the process lifetime.
///
/// The base currency does not live in the token map - its balances belong
/// to the external ledger, and every base-currency leg of an exchange
/// operation moves through the ledger adapter. Non-base tokens are plain
/// in-memory `Token` instances.
///
/// Pool IDs are always `"{OTHER}-{BASE}"`; callers never construct them.
pub struct DexEngine {
    settings: DexSettings,
    tier_schedule: TierSchedule,
    tokens: HashMap<String, Token>,
    pools: HashMap<String, LiquidityPool>,
    ledger: Arc<dyn LedgerAdapter>,

    total_swaps: u64,
    total_volume: f64,
    total_liquidity_added: f64,
    total_fees_routed: f64,
}

impl DexEngine {
    pub fn new(settings: DexSettings, ledger: Arc<dyn LedgerAdapter>) -> Self {
        Self {
            settings,
            tier_schedule: TierSchedule::default(),
            tokens: HashMap::new(),
            pools: HashMap::new(),
            ledger,
            total_swaps: 0,
            total_volume: 0.0,
            total_liquidity_added: 0.0,
            total_fees_routed: 0.0,
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.settings.base_currency
    }

    pub fn tier_schedule(&self) -> &TierSchedule {
        &self.tier_schedule
    }

    /// Pool ID for a non-base token
    pub fn pool_id_for(&self, token: &str) -> String {
        format!("{}-{}", token, self.settings.base_currency)
    }

    /// Create a new non-base token with its initial supply minted to the creator
    pub fn create_token(
        &mut self,
        symbol: &str,
        name: &str,
        initial_supply: f64,
        creator: &str,
        decimals: u8,
    ) -> Result<(), DexError> {
        if symbol == self.settings.base_currency {
            return Err(DexError::TokenExists(symbol.to_string()));
        }
        if self.tokens.contains_key(symbol) {
            return Err(DexError::TokenExists(symbol.to_string()));
        }

        let mut token = Token::new(symbol, name, decimals, creator);
        if initial_supply > 0.0 {
            token.mint(creator, initial_supply)?;
        }
        self.tokens.insert(symbol.to_string(), token);

        tracing::info!(symbol, initial_supply, "token created");
        Ok(())
    }

    /// Transfer a non-base token between two addresses
    pub fn token_transfer(
        &mut self,
        symbol: &str,
        from: &str,
        to: &str,
        amount: f64,
    ) -> Result<(), DexError> {
        self.tokens
            .get_mut(symbol)
            .ok_or_else(|| DexError::Token(TokenError::TokenNotFound(symbol.to_string())))?
            .transfer(from, to, amount)?;
        Ok(())
    }

    pub fn token(&self, symbol: &str) -> Option<&Token> {
        self.tokens.get(symbol)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn pool(&self, pool_id: &str) -> Option<&LiquidityPool> {
        self.pools.get(pool_id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &LiquidityPool> {
        self.pools.values()
    }

    /// Resolve the swap pair to `(pool_id, non_base_token, input_is_base)`.
    ///
    /// Exactly one side of every swap must be the base currency.
    fn resolve_pair(
        &self,
        input_token: &str,
        output_token: &str,
    ) -> Result<(String, String, bool), DexError> {
        let base = &self.settings.base_currency;
        let input_is_base = input_token == base;
        let output_is_base = output_token == base;

        if input_is_base == output_is_base {
            return Err(DexError::InvalidPair(format!(
                "exactly one side must be {}: got {}/{}",
                base, input_token, output_token
            )));
        }

        let other = if input_is_base {
            output_token
        } else {
            input_token
        };
        if !self.tokens.contains_key(other) {
            return Err(DexError::Token(TokenError::TokenNotFound(
                other.to_string(),
            )));
        }

        Ok((self.pool_id_for(other), other.to_string(), input_is_base))
    }

    /// Create a pool for `(token, base)` and seed its initial liquidity.
    ///
    /// All preconditions are validated and the pool object is fully built
    /// before any funds move; the pool becomes visible in the pool map only
    /// after both transfer legs have succeeded, with a compensating refund
    /// if the second leg fails. A failed call leaves no trace.
    pub async fn create_pool(
        &mut self,
        token_a: &str,
        token_b: &str,
        initial_a: f64,
        initial_b: f64,
        provider: &str,
    ) -> Result<String, DexError> {
        let base = self.settings.base_currency.clone();
        let a_is_base = token_a == base;
        let b_is_base = token_b == base;
        if a_is_base == b_is_base {
            return Err(DexError::InvalidPair(format!(
                "exactly one side must be {}: got {}/{}",
                base, token_a, token_b
            )));
        }

        // normalize so the non-base token is side A
        let (other, amount_other, amount_base) = if a_is_base {
            (token_b.to_string(), initial_b, initial_a)
        } else {
            (token_a.to_string(), initial_a, initial_b)
        };

        if amount_other <= 0.0 {
            return Err(DexError::InvalidAmount(amount_other));
        }
        if amount_base <= 0.0 {
            return Err(DexError::InvalidAmount(amount_base));
        }

        if !self.tokens.contains_key(&other) {
            return Err(DexError::Token(TokenError::TokenNotFound(other)));
        }

        let pool_id = self.pool_id_for(&other);
        if self.pools.contains_key(&pool_id) {
            return Err(DexError::PoolExists(pool_id));
        }

        // validate both legs up front
        let token_balance = self.tokens[&other].balance_of(provider);
        if token_balance < amount_other {
            return Err(DexError::Token(TokenError::InsufficientBalance {
                have: token_balance,
                need: amount_other,
            }));
        }
        let base_balance = self.ledger.get_balance(provider).await?;
        if base_balance < amount_base {
            return Err(DexError::Token(TokenError::InsufficientBalance {
                have: base_balance,
                need: amount_base,
            }));
        }

        // build the pool off to the side
        let mut pool = LiquidityPool::new(
            &other,
            &base,
            self.tier_schedule.clone(),
            self.settings.withdrawal_delay_secs,
        );
        let lp_minted =
            pool.add_liquidity(provider, amount_other, amount_base, self.settings.ratio_tolerance)?;

        // move funds: token leg, then base leg with a compensating refund
        self.tokens
            .get_mut(&pool.token_a)
            .ok_or_else(|| DexError::Token(TokenError::TokenNotFound(pool.token_a.clone())))?
            .transfer(provider, &pool_id, amount_other)?;

        if let Err(err) = self.ledger.transfer(provider, &pool_id, amount_base).await {
            if let Some(token) = self.tokens.get_mut(&pool.token_a) {
                let _ = token.transfer(&pool_id, provider, amount_other);
            }
            return Err(err.into());
        }

        self.pools.insert(pool_id.clone(), pool);
        self.total_liquidity_added += amount_other + amount_base;

        tracing::info!(pool = %pool_id, provider, lp_minted, "pool created");
        Ok(pool_id)
    }

    /// Quote a swap without mutating anything
    pub fn get_quote(
        &self,
        input_token: &str,
        output_token: &str,
        input_amount: f64,
    ) -> Result<PoolQuote, DexError> {
        let (pool_id, _, _) = self.resolve_pair(input_token, output_token)?;
        let pool = self
            .pools
            .get(&pool_id)
            .ok_or(DexError::PoolNotFound(pool_id))?;
        pool.quote(input_token, input_amount)
    }

    /// Execute a swap for a user.
    ///
    /// Preconditions (user balance, pool solvency on the output leg) are
    /// validated before any state changes; the pool mutation and both
    /// transfer legs then apply as one staged sequence. When the input leg
    /// is the base currency, the fee portion is forwarded to the validator
    /// pool through the ledger adapter, and the routing counter advances
    /// only when the settlement reports success.
    pub async fn swap_tokens(
        &mut self,
        user: &str,
        input_token: &str,
        output_token: &str,
        input_amount: f64,
        slippage_tolerance: f64,
    ) -> Result<SwapReceipt, DexError> {
        if input_amount <= 0.0 {
            return Err(DexError::InvalidAmount(input_amount));
        }

        let (pool_id, other, input_is_base) = self.resolve_pair(input_token, output_token)?;
        let pool = self
            .pools
            .get(&pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.clone()))?;

        // input-leg balance
        if input_is_base {
            let balance = self.ledger.get_balance(user).await?;
            if balance < input_amount {
                return Err(DexError::Token(TokenError::InsufficientBalance {
                    have: balance,
                    need: input_amount,
                }));
            }
        } else {
            let balance = self.tokens[&other].balance_of(user);
            if balance < input_amount {
                return Err(DexError::Token(TokenError::InsufficientBalance {
                    have: balance,
                    need: input_amount,
                }));
            }
        }

        let quote = pool.quote(input_token, input_amount)?;
        if quote.output_amount <= 0.0 {
            return Err(DexError::InsufficientLiquidity(pool_id));
        }
        let min_output = quote.output_amount * (1.0 - slippage_tolerance);

        // output-leg solvency of the pool account
        if input_is_base {
            let pool_tokens = self.tokens[&other].balance_of(&pool_id);
            if pool_tokens < quote.output_amount {
                return Err(DexError::InvariantViolation(format!(
                    "pool {} holds {:.4} {}, owes {:.4}",
                    pool_id, pool_tokens, other, quote.output_amount
                )));
            }
        } else {
            let pool_base = self.ledger.get_balance(&pool_id).await?;
            if pool_base < quote.output_amount {
                return Err(DexError::InvariantViolation(format!(
                    "pool {} holds {:.4} {}, owes {:.4}",
                    pool_id,
                    pool_base,
                    self.settings.base_currency,
                    quote.output_amount
                )));
            }
        }

        // commit: pool math first, then the two legs
        let receipt = self
            .pools
            .get_mut(&pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.clone()))?
            .swap(input_token, input_amount, min_output)?;

        if input_is_base {
            self.ledger.transfer(user, &pool_id, input_amount).await?;
            self.tokens
                .get_mut(&other)
                .ok_or_else(|| DexError::Token(TokenError::TokenNotFound(other.clone())))?
                .transfer(&pool_id, user, receipt.output_amount)
                .map_err(|e| DexError::InvariantViolation(e.to_string()))?;
        } else {
            self.tokens
                .get_mut(&other)
                .ok_or_else(|| DexError::Token(TokenError::TokenNotFound(other.clone())))?
                .transfer(user, &pool_id, input_amount)
                .map_err(|e| DexError::InvariantViolation(e.to_string()))?;
            self.ledger
                .transfer(&pool_id, user, receipt.output_amount)
                .await?;
        }

        self.total_swaps += 1;
        self.total_volume += input_amount;

        // Fee routing only applies on the base-currency input leg; fees paid
        // in the other token stay in the pool for the LPs.
        if input_is_base && receipt.fee_amount > 0.0 {
            self.route_fee(&pool_id, receipt.fee_amount).await;
        }

        Ok(receipt)
    }

    /// Forward a collected base-currency fee to the validator pool.
    ///
    /// The local routing counter commits only when the ledger reports
    /// `settlement_success`; a failed settlement leaves the fee in the pool.
    async fn route_fee(&mut self, pool_id: &str, fee_nxt: f64) {
        let request = SettlementRequest::new(
            pool_id,
            &self.settings.validator_pool,
            fee_nxt,
            SettlementModule::Dex,
        );

        match self.ledger.settle(request).await {
            Ok(receipt) if receipt.settlement_success => {
                self.total_fees_routed += fee_nxt;
            }
            Ok(receipt) => {
                tracing::warn!(
                    pool = pool_id,
                    fee_nxt,
                    message = %receipt.message,
                    "fee routing settlement failed, fee left in pool"
                );
            }
            Err(err) => {
                tracing::warn!(pool = pool_id, fee_nxt, %err, "fee routing unavailable");
            }
        }
    }

    /// Add liquidity to an existing pool, moving both legs from the provider
    pub async fn add_liquidity(
        &mut self,
        provider: &str,
        pool_id: &str,
        amount_other: f64,
        amount_base: f64,
    ) -> Result<f64, DexError> {
        if amount_other <= 0.0 {
            return Err(DexError::InvalidAmount(amount_other));
        }
        if amount_base <= 0.0 {
            return Err(DexError::InvalidAmount(amount_base));
        }

        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.to_string()))?;
        let other = pool.token_a.clone();

        // the ratio check must run before funds move
        if pool.lp_token_supply > 0.0 {
            let ratio_a = amount_other / pool.reserve_a;
            let ratio_b = amount_base / pool.reserve_b;
            if (ratio_a - ratio_b).abs() > self.settings.ratio_tolerance {
                return Err(DexError::UnbalancedDeposit { ratio_a, ratio_b });
            }
        }

        let token_balance = self.tokens[&other].balance_of(provider);
        if token_balance < amount_other {
            return Err(DexError::Token(TokenError::InsufficientBalance {
                have: token_balance,
                need: amount_other,
            }));
        }
        let base_balance = self.ledger.get_balance(provider).await?;
        if base_balance < amount_base {
            return Err(DexError::Token(TokenError::InsufficientBalance {
                have: base_balance,
                need: amount_base,
            }));
        }

        self.tokens
            .get_mut(&other)
            .ok_or_else(|| DexError::Token(TokenError::TokenNotFound(other.clone())))?
            .transfer(provider, pool_id, amount_other)?;

        if let Err(err) = self.ledger.transfer(provider, pool_id, amount_base).await {
            if let Some(token) = self.tokens.get_mut(&other) {
                let _ = token.transfer(pool_id, provider, amount_other);
            }
            return Err(err.into());
        }

        let deposit = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.to_string()))?
            .add_liquidity(
                provider,
                amount_other,
                amount_base,
                self.settings.ratio_tolerance,
            );
        let minted = match deposit {
            Ok(minted) => minted,
            Err(err) => {
                // compensate both legs; preconditions make this unreachable
                if let Some(token) = self.tokens.get_mut(&other) {
                    let _ = token.transfer(pool_id, provider, amount_other);
                }
                let _ = self.ledger.transfer(pool_id, provider, amount_base).await;
                return Err(err);
            }
        };

        self.total_liquidity_added += amount_other + amount_base;
        Ok(minted)
    }

    /// Burn LP and return both legs to the provider
    pub async fn remove_liquidity(
        &mut self,
        provider: &str,
        pool_id: &str,
        lp_tokens: f64,
    ) -> Result<(f64, f64), DexError> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.to_string()))?;
        let other = pool.token_a.clone();

        let (amount_other, amount_base) =
            pool.remove_liquidity(provider, lp_tokens, chrono::Utc::now())?;

        self.tokens
            .get_mut(&other)
            .ok_or_else(|| DexError::Token(TokenError::TokenNotFound(other.clone())))?
            .transfer(pool_id, provider, amount_other)
            .map_err(|e| DexError::InvariantViolation(e.to_string()))?;
        self.ledger
            .transfer(pool_id, provider, amount_base)
            .await
            .map_err(|e| DexError::InvariantViolation(e.to_string()))?;

        Ok((amount_other, amount_base))
    }

    /// Move LP between balance entries of one pool (the farming engine's
    /// escrow path goes through here, never through the balance map)
    pub fn transfer_lp(
        &mut self,
        pool_id: &str,
        from: &str,
        to: &str,
        amount: f64,
    ) -> Result<(), DexError> {
        self.pools
            .get_mut(pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.to_string()))?
            .transfer_lp(from, to, amount)
    }

    /// Unescrowed LP balance of an address in a pool
    pub fn lp_balance(&self, pool_id: &str, address: &str) -> Result<f64, DexError> {
        Ok(self
            .pools
            .get(pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.to_string()))?
            .lp_balance_of(address))
    }

    /// NXT-denominated value of an LP amount: share of twice the base reserve
    pub fn lp_value_nxt(&self, pool_id: &str, lp_amount: f64) -> Result<f64, DexError> {
        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| DexError::PoolNotFound(pool_id.to_string()))?;

        if pool.lp_token_supply <= 0.0 {
            return Ok(0.0);
        }
        let share = lp_amount / pool.lp_token_supply;
        Ok(share * (pool.reserve_b * 2.0))
    }

    /// All balances visible to a user: every token plus the base currency
    pub async fn user_balances(&self, user: &str) -> Result<HashMap<String, f64>, DexError> {
        let mut balances = HashMap::new();

        let base_balance = self.ledger.get_balance(user).await?;
        if base_balance > 0.0 {
            balances.insert(self.settings.base_currency.clone(), base_balance);
        }

        for (symbol, token) in &self.tokens {
            let balance = token.balance_of(user);
            if balance > 0.0 {
                balances.insert(symbol.clone(), balance);
            }
        }

        Ok(balances)
    }

    pub fn stats(&self) -> DexStats {
        DexStats {
            total_tokens: self.tokens.len(),
            total_pools: self.pools.len(),
            total_swaps: self.total_swaps,
            total_volume: self.total_volume,
            total_liquidity_added: self.total_liquidity_added,
            total_fees_routed: self.total_fees_routed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ledger::InMemoryLedger;
    use crate::shared::types::EngineConfig;

    fn setup() -> (DexEngine, Arc<InMemoryLedger>) {
        let config = EngineConfig::default();
        let ledger = Arc::new(InMemoryLedger::new(config.ledger.clone()));
        let engine = DexEngine::new(config.dex.clone(), ledger.clone());
        (engine, ledger)
    }

    async fn setup_with_pool() -> (DexEngine, Arc<InMemoryLedger>) {
        let (mut engine, ledger) = setup();
        engine
            .create_token("TOKEN", "Test Token", 100_000.0, "alice", 18)
            .unwrap();
        ledger.fund("alice", 50_000.0);
        engine
            .create_pool("TOKEN", "NXT", 10_000.0, 1_000.0, "alice")
            .await
            .unwrap();
        (engine, ledger)
    }

    #[tokio::test]
    async fn test_create_pool_normalizes_sides() {
        let (mut engine, ledger) = setup();
        engine
            .create_token("USDC", "USD Coin", 100_000.0, "alice", 6)
            .unwrap();
        ledger.fund("alice", 10_000.0);

        // base passed first still yields "{OTHER}-{BASE}"
        let pool_id = engine
            .create_pool("NXT", "USDC", 1_000.0, 10_000.0, "alice")
            .await
            .unwrap();
        assert_eq!(pool_id, "USDC-NXT");

        let pool = engine.pool("USDC-NXT").unwrap();
        assert_eq!(pool.token_a, "USDC");
        assert_eq!(pool.reserve_a, 10_000.0);
        assert_eq!(pool.reserve_b, 1_000.0);
    }

    #[tokio::test]
    async fn test_create_pool_rejects_bad_pairs() {
        let (mut engine, _ledger) = setup();
        engine
            .create_token("AAA", "A", 1_000.0, "alice", 18)
            .unwrap();
        engine
            .create_token("BBB", "B", 1_000.0, "alice", 18)
            .unwrap();

        // no base side
        assert!(matches!(
            engine.create_pool("AAA", "BBB", 10.0, 10.0, "alice").await,
            Err(DexError::InvalidPair(_))
        ));
        // both sides base
        assert!(matches!(
            engine.create_pool("NXT", "NXT", 10.0, 10.0, "alice").await,
            Err(DexError::InvalidPair(_))
        ));
    }

    #[tokio::test]
    async fn test_create_pool_rejects_duplicates() {
        let (mut engine, ledger) = setup_with_pool().await;
        ledger.fund("alice", 1_000.0);
        let err = engine
            .create_pool("TOKEN", "NXT", 100.0, 10.0, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, DexError::PoolExists(_)));
    }

    #[tokio::test]
    async fn test_create_pool_moves_both_legs() {
        let (engine, ledger) = setup_with_pool().await;

        assert_eq!(engine.token("TOKEN").unwrap().balance_of("alice"), 90_000.0);
        assert_eq!(
            engine.token("TOKEN").unwrap().balance_of("TOKEN-NXT"),
            10_000.0
        );
        assert_eq!(ledger.get_balance("TOKEN-NXT").await.unwrap(), 1_000.0);
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 49_000.0);
    }

    #[tokio::test]
    async fn test_create_pool_insufficient_base_leaves_no_state() {
        let (mut engine, _ledger) = setup();
        engine
            .create_token("TOKEN", "Test Token", 100_000.0, "alice", 18)
            .unwrap();
        // alice has no NXT on the ledger

        let err = engine
            .create_pool("TOKEN", "NXT", 10_000.0, 1_000.0, "alice")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DexError::Token(TokenError::InsufficientBalance { .. })
        ));
        assert!(engine.pool("TOKEN-NXT").is_none());
        assert_eq!(engine.token("TOKEN").unwrap().balance_of("alice"), 100_000.0);
    }

    #[tokio::test]
    async fn test_swap_token_for_base() {
        let (mut engine, ledger) = setup_with_pool().await;

        let receipt = engine
            .swap_tokens("alice", "TOKEN", "NXT", 100.0, 0.01)
            .await
            .unwrap();

        let expected = 1_000.0 * 99.7 / (10_000.0 + 99.7);
        assert!((receipt.output_amount - expected).abs() < 1e-9);

        // token leg into the pool, base leg out of it
        assert_eq!(
            engine.token("TOKEN").unwrap().balance_of("TOKEN-NXT"),
            10_100.0
        );
        let alice_nxt = ledger.get_balance("alice").await.unwrap();
        assert!((alice_nxt - (49_000.0 + expected)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_swap_base_routes_fee_to_validator_pool() {
        let (mut engine, ledger) = setup_with_pool().await;

        let receipt = engine
            .swap_tokens("alice", "NXT", "TOKEN", 100.0, 0.01)
            .await
            .unwrap();

        let fee = 100.0 * receipt.fee_rate;
        let validator = ledger.get_balance("VALIDATOR_POOL").await.unwrap();
        // validator pool receives the fee net of the settlement fee
        assert!((validator - fee * 0.995).abs() < 1e-9);
        assert!((engine.stats().total_fees_routed - fee).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fee_routing_failure_does_not_block_swap() {
        let (mut engine, ledger) = setup_with_pool().await;
        ledger.set_fail_settlements(true);

        let receipt = engine
            .swap_tokens("alice", "NXT", "TOKEN", 100.0, 0.01)
            .await
            .unwrap();
        assert!(receipt.output_amount > 0.0);

        // no local commit for the failed routing
        assert_eq!(engine.stats().total_fees_routed, 0.0);
        assert_eq!(ledger.get_balance("VALIDATOR_POOL").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_swap_insufficient_balance_rejected() {
        let (mut engine, _ledger) = setup_with_pool().await;

        let err = engine
            .swap_tokens("mallory", "TOKEN", "NXT", 100.0, 0.01)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DexError::Token(TokenError::InsufficientBalance { .. })
        ));
        assert_eq!(engine.stats().total_swaps, 0);
    }

    #[tokio::test]
    async fn test_quote_matches_swap_output() {
        let (mut engine, _ledger) = setup_with_pool().await;

        let quote = engine.get_quote("TOKEN", "NXT", 100.0).unwrap();
        let receipt = engine
            .swap_tokens("alice", "TOKEN", "NXT", 100.0, 0.01)
            .await
            .unwrap();
        assert!((quote.output_amount - receipt.output_amount).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_add_and_remove_liquidity_round_trip() {
        let (mut engine, ledger) = setup_with_pool().await;
        ledger.fund("bob", 1_000.0);
        engine
            .token_transfer("TOKEN", "alice", "bob", 2_000.0)
            .unwrap();

        let minted = engine
            .add_liquidity("bob", "TOKEN-NXT", 1_000.0, 100.0)
            .await
            .unwrap();
        assert!(minted > 0.0);

        let (out_other, out_base) = engine
            .remove_liquidity("bob", "TOKEN-NXT", minted)
            .await
            .unwrap();
        assert!((out_other - 1_000.0).abs() < 1e-6);
        assert!((out_base - 100.0).abs() < 1e-6);
        assert!((engine.token("TOKEN").unwrap().balance_of("bob") - 2_000.0).abs() < 1e-6);
        assert!((ledger.get_balance("bob").await.unwrap() - 1_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unbalanced_add_rejected_before_funds_move() {
        let (mut engine, ledger) = setup_with_pool().await;
        ledger.fund("bob", 10_000.0);
        engine
            .token_transfer("TOKEN", "alice", "bob", 5_000.0)
            .unwrap();

        let err = engine
            .add_liquidity("bob", "TOKEN-NXT", 1_000.0, 500.0)
            .await
            .unwrap_err();
        assert!(matches!(err, DexError::UnbalancedDeposit { .. }));
        assert_eq!(engine.token("TOKEN").unwrap().balance_of("bob"), 5_000.0);
        assert_eq!(ledger.get_balance("bob").await.unwrap(), 10_000.0);
    }

    #[tokio::test]
    async fn test_lp_value_estimate() {
        let (engine, _ledger) = setup_with_pool().await;
        let supply = engine.pool("TOKEN-NXT").unwrap().lp_token_supply;

        // the whole supply is worth twice the base reserve
        let value = engine.lp_value_nxt("TOKEN-NXT", supply).unwrap();
        assert!((value - 2_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_user_balances_include_base_currency() {
        let (engine, _ledger) = setup_with_pool().await;
        let balances = engine.user_balances("alice").await.unwrap();
        assert_eq!(balances["TOKEN"], 90_000.0);
        assert_eq!(balances["NXT"], 49_000.0);
    }
}
