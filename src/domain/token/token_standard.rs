//! Fungible token standard with balance and allowance accounting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shared::errors::TokenError;

/// Token standard types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStandard {
    Fungible,
    NonFungible,
    Wrapped,
}

impl TokenStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStandard::Fungible => "Fungible Token",
            TokenStandard::NonFungible => "Non-Fungible Token",
            TokenStandard::Wrapped => "Wrapped Native Token",
        }
    }
}

/// A named fungible asset with per-address balances and allowances.
///
/// Invariant: the sum of all balances equals `total_supply` at all times.
/// Every mutating operation either applies fully or returns an error with
/// no state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub total_supply: f64,
    pub standard: TokenStandard,
    pub creator: String,
    pub created_at: DateTime<Utc>,

    balances: HashMap<String, f64>,
    // owner -> spender -> amount
    allowances: HashMap<String, HashMap<String, f64>>,
}

impl Token {
    pub fn new(symbol: &str, name: &str, decimals: u8, creator: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            total_supply: 0.0,
            standard: TokenStandard::Fungible,
            creator: creator.to_string(),
            created_at: Utc::now(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Mint new tokens to an address
    pub fn mint(&mut self, to: &str, amount: f64) -> Result<(), TokenError> {
        if amount <= 0.0 {
            return Err(TokenError::InvalidAmount(amount));
        }

        *self.balances.entry(to.to_string()).or_insert(0.0) += amount;
        self.total_supply += amount;
        Ok(())
    }

    /// Burn tokens from an address
    pub fn burn(&mut self, from: &str, amount: f64) -> Result<(), TokenError> {
        if amount <= 0.0 {
            return Err(TokenError::InvalidAmount(amount));
        }

        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }

        self.balances.insert(from.to_string(), balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Transfer tokens between addresses
    pub fn transfer(&mut self, from: &str, to: &str, amount: f64) -> Result<(), TokenError> {
        if amount <= 0.0 {
            return Err(TokenError::InvalidAmount(amount));
        }

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }

        self.balances.insert(from.to_string(), from_balance - amount);
        *self.balances.entry(to.to_string()).or_insert(0.0) += amount;
        Ok(())
    }

    /// Approve a spender to use the owner's tokens
    pub fn approve(&mut self, owner: &str, spender: &str, amount: f64) -> Result<(), TokenError> {
        if amount < 0.0 {
            return Err(TokenError::InvalidAmount(amount));
        }

        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
        Ok(())
    }

    /// Transfer tokens on behalf of an owner, consuming allowance
    pub fn transfer_from(
        &mut self,
        spender: &str,
        from: &str,
        to: &str,
        amount: f64,
    ) -> Result<(), TokenError> {
        if amount <= 0.0 {
            return Err(TokenError::InvalidAmount(amount));
        }

        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                approved: allowed,
                need: amount,
            });
        }

        self.transfer(from, to, amount)?;

        // transfer succeeded, consume the allowance
        self.allowances
            .entry(from.to_string())
            .or_default()
            .insert(spender.to_string(), allowed - amount);
        Ok(())
    }

    /// Get token balance for an address
    pub fn balance_of(&self, address: &str) -> f64 {
        self.balances.get(address).copied().unwrap_or(0.0)
    }

    /// Get allowance granted by an owner to a spender
    pub fn allowance(&self, owner: &str, spender: &str) -> f64 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of addresses holding a balance
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| **b > 0.0).count()
    }

    /// Sum of all balances; equals `total_supply` when the invariant holds
    pub fn balance_sum(&self) -> f64 {
        self.balances.values().sum()
    }
}
