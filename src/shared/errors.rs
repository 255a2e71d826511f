//! Error handling for the application

use thiserror::Error;

/// Token-standard errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Insufficient balance: have {have:.4}, need {need:.4}")]
    InsufficientBalance { have: f64, need: f64 },

    #[error("Insufficient allowance: approved {approved:.4}, need {need:.4}")]
    InsufficientAllowance { approved: f64, need: f64 },

    #[error("Token not found: {0}")]
    TokenNotFound(String),
}

/// DEX-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DexError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Pool already exists: {0}")]
    PoolExists(String),

    #[error("Token already exists: {0}")]
    TokenExists(String),

    #[error("Invalid token pair: {0}")]
    InvalidPair(String),

    #[error("Insufficient liquidity in pool {0}")]
    InsufficientLiquidity(String),

    #[error("Slippage exceeded: got {got:.4}, minimum {min:.4}")]
    SlippageExceeded { got: f64, min: f64 },

    #[error("Unbalanced liquidity: ratio A={ratio_a:.4}, ratio B={ratio_b:.4}")]
    UnbalancedDeposit { ratio_a: f64, ratio_b: f64 },

    #[error("Insufficient LP tokens: have {have:.4}, need {need:.4}")]
    InsufficientLpBalance { have: f64, need: f64 },

    #[error("Unauthorized provider: {0}")]
    Unauthorized(String),

    #[error("Withdrawal pending: {remaining_secs}s until unlock")]
    WithdrawalPending { remaining_secs: i64 },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Farming-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FarmError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Farm not found: {0}")]
    FarmNotFound(String),

    #[error("Farm is not active: {0}")]
    FarmInactive(String),

    #[error("No stake found for user")]
    NoStake,

    #[error("Insufficient stake: have {have:.4}, requested {requested:.4}")]
    InsufficientStake { have: f64, requested: f64 },

    #[error("No rewards to claim")]
    NothingToClaim,

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    #[error("State changed between preview and commit: {0}")]
    Conflict(String),

    #[error(transparent)]
    Dex(#[from] DexError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Ledger adapter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient funds in {address}: have {have:.4}, need {need:.4}")]
    InsufficientFunds {
        address: String,
        have: f64,
        need: f64,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Exchange error: {0}")]
    ExchangeError(String),

    #[error("Farming error: {0}")]
    FarmingError(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::ExchangeError(err.to_string())
    }
}

impl From<DexError> for AppError {
    fn from(err: DexError) -> Self {
        AppError::ExchangeError(err.to_string())
    }
}

impl From<FarmError> for AppError {
    fn from(err: FarmError) -> Self {
        AppError::FarmingError(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::LedgerError(err.to_string())
    }
}
