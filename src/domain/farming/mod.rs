//! Farming domain - LP staking and reward settlement

mod farm_pool;
mod farm_position;
mod farming_engine;

pub use farm_pool::{
    ClaimSnapshot, FarmPool, FarmSummary, FarmUserInfo, StakeSnapshot, UnstakeSnapshot,
};
pub use farm_position::FarmPosition;
pub use farming_engine::{
    ClaimAllOutcome, FarmingEngine, FarmingStats, StakeOutcome, UnstakeOutcome,
};
