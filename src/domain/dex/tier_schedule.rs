//! TVL-keyed tier schedule shared by swap fees and farm reward multipliers

use serde::Serialize;

/// Lowest and highest swap fee rates the schedule may produce
pub const MIN_FEE_RATE: f64 = 0.001;
pub const MAX_FEE_RATE: f64 = 0.005;

/// One TVL band of the schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierBand {
    pub name: &'static str,
    /// Inclusive TVL threshold that activates this band
    pub min_tvl: f64,
    /// Swap fee rate charged while the pool sits in this band
    pub fee_rate: f64,
    /// Farm reward multiplier applied while the farm sits in this band
    pub reward_multiplier: f64,
}

/// Step function from TVL to fee rate and reward multiplier.
///
/// Both the exchange fee tier and the farming reward tier key off the same
/// TVL metric, so they share one table. Bands are ordered highest threshold
/// first; the first band whose threshold the TVL meets wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSchedule {
    bands: Vec<TierBand>,
}

impl Default for TierSchedule {
    fn default() -> Self {
        Self {
            bands: vec![
                TierBand {
                    name: "tier-5",
                    min_tvl: 100_000.0,
                    fee_rate: 0.001,
                    reward_multiplier: 5.0,
                },
                TierBand {
                    name: "tier-4",
                    min_tvl: 50_000.0,
                    fee_rate: 0.002,
                    reward_multiplier: 3.0,
                },
                TierBand {
                    name: "tier-3",
                    min_tvl: 10_000.0,
                    fee_rate: 0.003,
                    reward_multiplier: 2.0,
                },
                TierBand {
                    name: "tier-2",
                    min_tvl: 1_000.0,
                    fee_rate: 0.004,
                    reward_multiplier: 1.0,
                },
                TierBand {
                    name: "tier-1",
                    min_tvl: 0.0,
                    fee_rate: 0.005,
                    reward_multiplier: 0.5,
                },
            ],
        }
    }
}

impl TierSchedule {
    /// Band in effect for the given TVL
    pub fn band_for(&self, tvl: f64) -> TierBand {
        self.bands
            .iter()
            .find(|band| tvl >= band.min_tvl)
            .copied()
            // the table always ends with a zero-threshold band
            .unwrap_or(TierBand {
                name: "tier-1",
                min_tvl: 0.0,
                fee_rate: MAX_FEE_RATE,
                reward_multiplier: 0.5,
            })
    }

    /// Swap fee rate for the given TVL, clamped to [MIN_FEE_RATE, MAX_FEE_RATE]
    pub fn fee_rate(&self, tvl: f64) -> f64 {
        self.band_for(tvl)
            .fee_rate
            .clamp(MIN_FEE_RATE, MAX_FEE_RATE)
    }

    /// Farm reward multiplier for the given TVL
    pub fn reward_multiplier(&self, tvl: f64) -> f64 {
        self.band_for(tvl).reward_multiplier
    }

    pub fn bands(&self) -> &[TierBand] {
        &self.bands
    }
}
