//! Application services and use cases

use rand::Rng;
use std::sync::Arc;

use crate::domain::dex::DexEngine;
use crate::domain::farming::FarmingEngine;
use crate::infrastructure::ledger::InMemoryLedger;
use crate::report::ExchangeReport;
use crate::shared::errors::{AppError, FarmError};
use crate::shared::types::EngineConfig;

const DEMO_USERS: &[&str] = &["alice", "bob", "carol"];

/// A fully wired in-memory exchange session
pub struct ExchangeSession {
    pub ledger: Arc<InMemoryLedger>,
    pub dex: DexEngine,
    pub farming: FarmingEngine,
}

/// Application service running demo sessions against the in-memory ledger
pub struct SimulationService {
    config: EngineConfig,
}

impl SimulationService {
    /// Create new simulation service
    pub fn new(config: &EngineConfig) -> Result<Self, AppError> {
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Bootstrap a session: ledger, engines, demo tokens, pools and balances
    pub async fn bootstrap(&self) -> Result<ExchangeSession, AppError> {
        let ledger = Arc::new(InMemoryLedger::new(self.config.ledger.clone()));
        let mut dex = DexEngine::new(self.config.dex.clone(), ledger.clone());
        let farming = FarmingEngine::new(self.config.farming.clone(), ledger.clone());

        // genesis base currency to the treasury and the reward source
        ledger.fund(&self.config.dex.treasury, self.config.dex.genesis_supply);
        ledger.fund(&self.config.farming.reward_source, 500_000.0);

        dex.create_token("USDC", "USD Coin", 1_000_000.0, "alice", 6)?;
        dex.create_token("GOV", "Governance Token", 100_000.0, "bob", 18)?;

        for user in DEMO_USERS {
            ledger.fund(user, 50_000.0);
        }
        // spread tokens around
        {
            let session_token_moves = [
                ("USDC", "alice", "bob", 200_000.0),
                ("USDC", "alice", "carol", 200_000.0),
                ("GOV", "bob", "carol", 20_000.0),
            ];
            for (symbol, from, to, amount) in session_token_moves {
                dex.token_transfer(symbol, from, to, amount)?;
            }
        }

        dex.create_pool("USDC", "NXT", 100_000.0, 10_000.0, "alice")
            .await?;
        dex.create_pool("GOV", "NXT", 10_000.0, 2_000.0, "bob").await?;

        Ok(ExchangeSession {
            ledger,
            dex,
            farming,
        })
    }

    /// Run a randomized market session and print the final report
    pub async fn run_simulation(&self, rounds: u32, json: bool) -> Result<(), AppError> {
        println!("🚀 Starting NexusOS exchange simulation");
        println!("📊 Rounds: {}", rounds);

        let mut session = self.bootstrap().await?;
        let mut notes = Vec::new();
        let mut rng = rand::thread_rng();

        // liquidity providers open farming positions up front
        session
            .farming
            .stake_lp(&mut session.dex, "alice", "USDC-NXT", 2_000.0)
            .await?;
        session
            .farming
            .stake_lp(&mut session.dex, "bob", "GOV-NXT", 1_000.0)
            .await?;

        for round in 1..=rounds {
            let user = DEMO_USERS[rng.gen_range(0..DEMO_USERS.len())];
            let token = if rng.gen_bool(0.5) { "USDC" } else { "GOV" };
            let to_base = rng.gen_bool(0.5);
            let amount = rng.gen_range(10.0..500.0);

            let (input, output) = if to_base {
                (token, self.config.dex.base_currency.as_str())
            } else {
                (self.config.dex.base_currency.as_str(), token)
            };

            match session
                .dex
                .swap_tokens(user, input, output, amount, self.config.dex.default_slippage)
                .await
            {
                Ok(receipt) => {
                    println!(
                        "🔄 Round {}: {} swapped {:.2} {} -> {:.4} {} (impact {:.2}%)",
                        round,
                        user,
                        amount,
                        input,
                        receipt.output_amount,
                        output,
                        receipt.price_impact_pct
                    );
                }
                Err(e) => {
                    println!("⚠️  Round {}: swap skipped: {}", round, e);
                    notes.push(format!("round {}: {}", round, e));
                }
            }

            // periodic farming traffic
            if round % 5 == 0 {
                match session.farming.claim_all_rewards("alice").await {
                    Ok(outcome) => println!(
                        "💰 alice claimed {:.4} NXT from {} farms",
                        outcome.total_rewards, outcome.farms_claimed
                    ),
                    Err(FarmError::NothingToClaim) => {}
                    Err(e) => notes.push(format!("claim round {}: {}", round, e)),
                }
            }
        }

        let report =
            ExchangeReport::new(&session.dex, &session.farming).with_session_notes(notes);

        if json {
            println!("{}", report.to_json().map_err(|e| AppError::Unknown(e.to_string()))?);
        } else {
            Self::print_summary(&report);
        }

        Ok(())
    }

    /// Bootstrap a session and print its state report
    pub async fn print_report(&self, json: bool) -> Result<(), AppError> {
        let session = self.bootstrap().await?;
        let report = ExchangeReport::new(&session.dex, &session.farming);

        if json {
            println!("{}", report.to_json().map_err(|e| AppError::Unknown(e.to_string()))?);
        } else {
            Self::print_summary(&report);
        }
        Ok(())
    }

    fn print_summary(report: &ExchangeReport) {
        println!("\n📈 Exchange summary");
        println!(
            "   pools: {}  swaps: {}  volume: {:.2}  fees routed: {:.4}",
            report.dex.total_pools,
            report.dex.total_swaps,
            report.dex.total_volume,
            report.dex.total_fees_routed
        );
        for pool in &report.pools {
            println!(
                "   {} reserves {:.2}/{:.2} fee {:.2}% volume {:.2}/{:.2}",
                pool.pool_id,
                pool.reserve_a,
                pool.reserve_b,
                pool.fee_rate * 100.0,
                pool.total_volume_a,
                pool.total_volume_b
            );
        }
        println!(
            "\n🌾 Farming: {} farms, TVL {:.2}, rewards distributed {:.4}",
            report.farming.total_farms,
            report.farming.total_tvl,
            report.farming.total_rewards_distributed
        );
        for farm in &report.farms {
            println!(
                "   {} staked {:.2} LP, tier {} ({}x), APY {:.1}%",
                farm.pool_id,
                farm.total_staked_lp,
                farm.tier,
                farm.reward_multiplier,
                farm.apy_pct
            );
        }
    }
}
