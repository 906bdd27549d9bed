//! Simulation controller.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tokenswap_common::{
    format_units, parse_units, Address, Amount, EscrowStatus, Leg, SwapTerms, DEFAULT_DECIMALS,
};
use tokenswap_escrow::{EscrowBook, EscrowConfig, EscrowEngine, FundingMode};
use tokenswap_ledger::{AssetRegistry, Ledger, TokenConfig};

use crate::metrics::SimulationMetrics;
use crate::party::{Party, PartyFactory, SwapParty};
use crate::scenario::{Action, Scenario, ScenarioStep, Token};

/// Whole tokens minted to each scripted party at deployment.
const INITIAL_SUPPLY: &str = "100";

fn units(text: &str) -> tokenswap_common::Result<Amount> {
    parse_units(text, DEFAULT_DECIMALS)
}

/// How a contention swap is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finalize {
    /// Both legs funded, then execute and cancel race.
    Race,
    /// Only leg A funded, then cancel races a premature execute.
    CancelEarly,
}

#[derive(Debug)]
struct SwapPlan {
    index: usize,
    maker: SwapParty,
    taker: SwapParty,
    amount_a: Amount,
    amount_b: Amount,
    racers: usize,
    finalize: Finalize,
}

#[derive(Debug)]
struct SwapOutcome {
    status: EscrowStatus,
    rejected: u64,
    latency_us: u64,
}

/// Controls the simulation.
pub struct SimulationController {
    /// Deposit mechanism used by every escrow.
    funding_mode: FundingMode,
    /// Random number generator.
    rng: Arc<RwLock<StdRng>>,
    /// Deployed assets.
    registry: Arc<AssetRegistry>,
    /// Open escrows.
    book: Arc<EscrowBook>,
    /// AliceCoin, minted by alice.
    alc: Arc<Ledger>,
    /// BobCoin, minted by bob.
    bob_coin: Arc<Ledger>,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
}

impl SimulationController {
    /// Deploy both tokens and an empty escrow book.
    pub fn new(funding_mode: FundingMode, seed: Option<u64>) -> anyhow::Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let registry = Arc::new(AssetRegistry::new());
        let supply = units(INITIAL_SUPPLY)?;
        let alc = registry
            .deploy(TokenConfig::new("AliceCoin", "ALC", Party::Alice.address(), supply))
            .context("deploying AliceCoin")?;
        let bob_coin = registry
            .deploy(TokenConfig::new("BobCoin", "BOB", Party::Bob.address(), supply))
            .context("deploying BobCoin")?;

        let config = EscrowConfig {
            funding_mode,
            ..EscrowConfig::default()
        };
        let book = Arc::new(EscrowBook::new(Arc::clone(&registry), config)?);

        info!(
            alc = %alc.id(),
            bob = %bob_coin.id(),
            funding_mode = %funding_mode,
            "Simulation initialized"
        );

        Ok(Self {
            funding_mode,
            rng: Arc::new(RwLock::new(rng)),
            registry,
            book,
            alc,
            bob_coin,
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
        })
    }

    fn ledger(&self, token: Token) -> &Arc<Ledger> {
        match token {
            Token::Alc => &self.alc,
            Token::Bob => &self.bob_coin,
        }
    }

    /// Pre-approve custody for every leg when deposits are pulled.
    fn approve_custody(&self, engine: &EscrowEngine) -> anyhow::Result<()> {
        if self.funding_mode != FundingMode::Allowance {
            return Ok(());
        }

        let custody = engine.custody_address();
        for leg in [Leg::A, Leg::B] {
            let terms = engine.terms().leg(leg);
            engine
                .ledger(leg)
                .approve(terms.depositor, custody, terms.amount)?;
        }
        Ok(())
    }

    /// Run a scripted scenario against a fresh escrow between alice and bob.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        let terms = SwapTerms::new(
            self.alc.id(),
            Party::Alice.address(),
            units("10")?,
            self.bob_coin.id(),
            Party::Bob.address(),
            units("20")?,
        );
        let engine = self.book.open(&scenario.name, terms)?;
        self.approve_custody(&engine)?;

        let started = Instant::now();
        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(&engine, step)
                .await
                .with_context(|| format!("step {} ({:?})", index, step))?;
        }

        let mut metrics = self.metrics.write().await;
        match engine.status() {
            status if status.is_final() => metrics.record_finalized(
                status == EscrowStatus::Executed,
                started.elapsed().as_micros() as u64,
            ),
            _ => metrics.record_failure(),
        }

        Ok(())
    }

    fn perform(&self, engine: &EscrowEngine, action: &Action) -> tokenswap_common::Result<()> {
        match action {
            Action::Deposit { party, leg, amount } => {
                engine.deposit(party.address(), *leg, units(amount)?)?;
            }
            Action::Execute { party } => engine.execute(party.address())?,
            Action::Cancel { party } => engine.cancel(party.address())?,
        }
        Ok(())
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, engine: &EscrowEngine, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Act(action) => {
                self.perform(engine, action)?;
                info!(action = ?action, status = %engine.status(), "Action applied");
            }
            ScenarioStep::ExpectError { action, error_code } => {
                match self.perform(engine, action) {
                    Ok(()) => bail!("{:?} succeeded, expected {}", action, error_code),
                    Err(e) if e.error_code() == error_code => {
                        self.metrics.write().await.record_rejections(1);
                        info!(action = ?action, error = %e, "Action rejected as expected");
                    }
                    Err(e) => bail!("{:?} failed with {}, expected {}", action, e, error_code),
                }
            }
            ScenarioStep::AssertStatus { status } => {
                let actual = engine.status();
                if actual != *status {
                    bail!("status is {}, expected {}", actual, status);
                }
            }
            ScenarioStep::AssertBalance {
                party,
                token,
                amount,
            } => {
                let ledger = self.ledger(*token);
                let actual = ledger.balance_of(&party.address());
                let expected = parse_units(amount, ledger.decimals())?;
                if actual != expected {
                    bail!(
                        "{} holds {} {}, expected {}",
                        party.label(),
                        format_units(actual, ledger.decimals())?,
                        ledger.symbol(),
                        amount
                    );
                }
                debug!(party = party.label(), symbol = ledger.symbol(), %amount, "Balance checked");
            }
        }

        Ok(())
    }

    async fn plan_swaps(&self, swaps: usize) -> anyhow::Result<Vec<SwapPlan>> {
        let mut rng = self.rng.write().await;
        let mut plans = Vec::with_capacity(swaps);

        for (index, (maker, taker)) in PartyFactory::create_pairs(swaps).into_iter().enumerate() {
            let amount_a = units(&rng.gen_range(1..=50u32).to_string())?;
            let amount_b = units(&rng.gen_range(1..=50u32).to_string())?;
            let finalize = if rng.gen_bool(0.75) {
                Finalize::Race
            } else {
                Finalize::CancelEarly
            };
            plans.push(SwapPlan {
                index,
                maker,
                taker,
                amount_a,
                amount_b,
                racers: rng.gen_range(2..=4),
                finalize,
            });
        }

        Ok(plans)
    }

    /// Run `swaps` concurrent escrows with racing deposits and finalizers.
    pub async fn run_contention(&self, swaps: usize) -> anyhow::Result<()> {
        info!(swaps, "Running contention scenario");

        let plans = self.plan_swaps(swaps).await?;
        let mut engines = Vec::with_capacity(plans.len());
        let mut tasks = Vec::with_capacity(plans.len());

        for plan in plans {
            self.alc
                .mint(Party::Alice.address(), plan.maker.address, plan.amount_a)?;
            self.bob_coin
                .mint(Party::Bob.address(), plan.taker.address, plan.amount_b)?;

            let terms = SwapTerms::new(
                self.alc.id(),
                plan.maker.address,
                plan.amount_a,
                self.bob_coin.id(),
                plan.taker.address,
                plan.amount_b,
            );
            let engine = self.book.open(&format!("contention-{}", plan.index), terms)?;
            self.approve_custody(&engine)?;

            engines.push(Arc::clone(&engine));
            tasks.push(tokio::spawn(drive_swap(engine, plan)));
        }

        for result in join_all(tasks).await {
            let mut metrics = self.metrics.write().await;
            match result? {
                Ok(outcome) => {
                    metrics.record_rejections(outcome.rejected);
                    metrics.record_finalized(
                        outcome.status == EscrowStatus::Executed,
                        outcome.latency_us,
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Swap did not settle cleanly");
                    metrics.record_failure();
                }
            }
        }

        for engine in &engines {
            let (held_a, held_b) = engine.custody_balances()?;
            if !held_a.is_zero() || !held_b.is_zero() {
                bail!("escrow {} still holds {} / {}", engine.id(), held_a, held_b);
            }
        }
        if !self.registry.verify_integrity() {
            bail!("ledger integrity check failed");
        }
        if self.book.active_count() != 0 {
            bail!("{} escrows left active", self.book.active_count());
        }

        info!(swaps = engines.len(), "Contention scenario settled");
        Ok(())
    }

    /// Get simulation metrics.
    pub async fn metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    /// Shared escrow book.
    pub fn book(&self) -> &Arc<EscrowBook> {
        &self.book
    }
}

async fn drive_swap(engine: Arc<EscrowEngine>, plan: SwapPlan) -> anyhow::Result<SwapOutcome> {
    let started = Instant::now();
    let intruder = Party::Eve.address();
    let legs: &[Leg] = match plan.finalize {
        Finalize::Race => &[Leg::A, Leg::B],
        Finalize::CancelEarly => &[Leg::A],
    };

    let mut deposits = Vec::new();
    for &leg in legs {
        let terms = *engine.terms().leg(leg);
        for _ in 0..plan.racers {
            let engine = Arc::clone(&engine);
            deposits.push(tokio::spawn(async move {
                engine.deposit(terms.depositor, leg, terms.amount)
            }));
        }
    }
    {
        let engine = Arc::clone(&engine);
        let amount = plan.amount_a;
        deposits.push(tokio::spawn(async move {
            engine.deposit(intruder, Leg::A, amount)
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for result in join_all(deposits).await {
        match result? {
            Ok(_) => accepted += 1,
            Err(e) => {
                rejected += 1;
                debug!(swap = plan.index, error = %e, "Deposit rejected");
            }
        }
    }
    if accepted != legs.len() {
        bail!(
            "swap {}: {} deposits accepted for {} legs",
            plan.index,
            accepted,
            legs.len()
        );
    }

    let finalizers: Vec<(Address, bool)> = match plan.finalize {
        Finalize::Race => vec![
            (plan.maker.address, true),
            (plan.taker.address, false),
            (intruder, true),
        ],
        Finalize::CancelEarly => vec![(plan.maker.address, false), (plan.taker.address, true)],
    };

    let handles = finalizers.into_iter().map(|(caller, execute)| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if execute {
                engine.execute(caller)
            } else {
                engine.cancel(caller)
            }
        })
    });

    let mut finalized = 0;
    for result in join_all(handles).await {
        match result? {
            Ok(()) => finalized += 1,
            Err(e) => {
                rejected += 1;
                debug!(swap = plan.index, error = %e, "Finalizer rejected");
            }
        }
    }
    if finalized != 1 {
        bail!("swap {}: {} finalizers succeeded", plan.index, finalized);
    }

    let status = engine.status();
    info!(swap = plan.index, %status, maker = %plan.maker.name, taker = %plan.taker.name, "Swap settled");

    Ok(SwapOutcome {
        status,
        rejected,
        latency_us: started.elapsed().as_micros() as u64,
    })
}
