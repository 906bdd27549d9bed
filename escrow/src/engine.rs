//! Escrow engine: one two-leg swap across two ledgers.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, instrument, warn};

use tokenswap_common::{
    Address, Amount, EscrowAgreement, EscrowId, EscrowStatus, Leg, Result, SwapError, SwapTerms,
};
use tokenswap_ledger::{AssetRegistry, Ledger, LedgerWriteGuard};

use crate::config::{EscrowConfig, FinalizerPolicy, FundingMode};
use crate::metrics::SharedMetrics;

/// Coordinates deposits from two counterparties and releases custody only
/// when both legs are funded.
///
/// Lock order is agreement first, then ledgers in `AssetId` order. Custody
/// movements that touch both ledgers happen while both ledger locks are held,
/// so a reader using [`Ledger::read_pair`] never sees one leg moved without
/// the other.
pub struct EscrowEngine {
    id: EscrowId,
    custody: Address,
    terms: SwapTerms,
    config: EscrowConfig,
    ledger_a: Arc<Ledger>,
    ledger_b: Arc<Ledger>,
    agreement: Mutex<EscrowAgreement>,
    metrics: SharedMetrics,
}

impl EscrowEngine {
    /// Create an agreement over two registered assets.
    pub fn new(
        terms: SwapTerms,
        registry: &AssetRegistry,
        config: EscrowConfig,
        metrics: SharedMetrics,
    ) -> Result<Self> {
        terms.validate()?;
        let ledger_a = registry.get(&terms.leg_a.asset)?;
        let ledger_b = registry.get(&terms.leg_b.asset)?;
        Self::with_ledgers(terms, ledger_a, ledger_b, config, metrics)
    }

    /// Create an agreement over two ledgers held directly.
    pub fn with_ledgers(
        terms: SwapTerms,
        ledger_a: Arc<Ledger>,
        ledger_b: Arc<Ledger>,
        config: EscrowConfig,
        metrics: SharedMetrics,
    ) -> Result<Self> {
        config.validate().map_err(SwapError::ConfigurationError)?;

        if ledger_a.id() != terms.leg_a.asset || ledger_b.id() != terms.leg_b.asset {
            return Err(SwapError::InvalidTerms(
                "ledgers do not match the assets named in the terms".to_string(),
            ));
        }

        let id = EscrowId::new();
        let agreement = EscrowAgreement::new(id, terms)?;
        let custody = agreement.custody_address();

        metrics.escrow_opened();
        info!(
            escrow_id = %id,
            custody = %custody,
            party_a = %terms.leg_a.depositor,
            amount_a = %terms.leg_a.amount,
            asset_a = %ledger_a.symbol(),
            party_b = %terms.leg_b.depositor,
            amount_b = %terms.leg_b.amount,
            asset_b = %ledger_b.symbol(),
            funding_mode = %config.funding_mode,
            "Escrow created"
        );

        Ok(Self {
            id,
            custody,
            terms,
            config,
            ledger_a,
            ledger_b,
            agreement: Mutex::new(agreement),
            metrics,
        })
    }

    pub fn id(&self) -> EscrowId {
        self.id
    }

    pub fn terms(&self) -> &SwapTerms {
        &self.terms
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Address holding deposited funds.
    pub fn custody_address(&self) -> Address {
        self.custody
    }

    /// Current status.
    pub fn status(&self) -> EscrowStatus {
        self.agreement.lock().status
    }

    /// Copy of the agreement.
    pub fn snapshot(&self) -> EscrowAgreement {
        self.agreement.lock().clone()
    }

    /// Ledger moved by a leg.
    pub fn ledger(&self, leg: Leg) -> &Arc<Ledger> {
        match leg {
            Leg::A => &self.ledger_a,
            Leg::B => &self.ledger_b,
        }
    }

    /// Custody balances on both ledgers, read as one consistent pair.
    pub fn custody_balances(&self) -> Result<(Amount, Amount)> {
        let (a, b) = Ledger::read_pair(&self.ledger_a, &self.ledger_b)?;
        Ok((a.balance_of(&self.custody), b.balance_of(&self.custody)))
    }

    /// Deposit a leg's funds into custody.
    ///
    /// Checks run in this order: finalized, caller, already deposited, amount.
    /// Ledger errors from the funding transfer are returned unchanged and leave
    /// the agreement untouched.
    #[instrument(skip(self), fields(escrow_id = %self.id))]
    pub fn deposit(&self, caller: Address, leg: Leg, amount: Amount) -> Result<EscrowStatus> {
        let mut agreement = self.agreement.lock();

        if let Err(e) = agreement.check_deposit(&caller, leg, amount) {
            self.metrics.deposit_rejected();
            warn!(caller = %caller, leg = %leg, error = %e, "Deposit rejected");
            return Err(e);
        }

        let ledger = self.ledger(leg);
        let funded = match self.config.funding_mode {
            FundingMode::Transfer => ledger.transfer(caller, self.custody, amount),
            FundingMode::Allowance => {
                ledger.transfer_from(self.custody, caller, self.custody, amount)
            }
        };
        if let Err(e) = funded {
            self.metrics.deposit_rejected();
            warn!(caller = %caller, leg = %leg, error = %e, "Deposit funding failed");
            return Err(e);
        }

        let status = agreement.record_deposit(leg)?;
        self.metrics.deposit_accepted();
        info!(caller = %caller, leg = %leg, amount = %amount, status = ?status, "Deposit accepted");

        Ok(status)
    }

    /// Release custody: leg A to party B and leg B to party A.
    ///
    /// Either both transfers apply or neither does. On failure the agreement
    /// stays `Funded` and the call may be retried.
    #[instrument(skip(self), fields(escrow_id = %self.id))]
    pub fn execute(&self, caller: Address) -> Result<()> {
        let mut agreement = self.agreement.lock();
        self.check_finalizer(&agreement, caller)?;

        if !agreement.status.can_transition_to(EscrowStatus::Executed) {
            let e = SwapError::InvalidTransition {
                from: agreement.status,
                to: EscrowStatus::Executed,
            };
            warn!(caller = %caller, error = %e, "Execute rejected");
            return Err(e);
        }

        let moves = [
            (Leg::A, self.terms.recipient(Leg::A)),
            (Leg::B, self.terms.recipient(Leg::B)),
        ];
        if let Err(e) = self.release(&moves) {
            self.metrics.execution_failed();
            error!(caller = %caller, error = %e, "Execution failed");
            return Err(e);
        }

        agreement.transition_to(EscrowStatus::Executed)?;
        self.metrics.execution_succeeded();
        info!(
            caller = %caller,
            party_a = %self.terms.leg_a.depositor,
            party_b = %self.terms.leg_b.depositor,
            "Escrow executed"
        );

        Ok(())
    }

    /// Cancel before execution, refunding deposited legs to their depositors.
    #[instrument(skip(self), fields(escrow_id = %self.id))]
    pub fn cancel(&self, caller: Address) -> Result<()> {
        let mut agreement = self.agreement.lock();
        self.check_finalizer(&agreement, caller)?;

        let refunds: Vec<(Leg, Address)> = agreement
            .deposited_legs()
            .into_iter()
            .map(|leg| (leg, self.terms.leg(leg).depositor))
            .collect();

        if let Err(e) = self.release(&refunds) {
            error!(caller = %caller, error = %e, "Refund failed");
            return Err(e);
        }

        agreement.transition_to(EscrowStatus::Cancelled)?;
        self.metrics.cancelled();
        info!(caller = %caller, refunded = refunds.len(), "Escrow cancelled");

        Ok(())
    }

    fn check_finalizer(&self, agreement: &EscrowAgreement, caller: Address) -> Result<()> {
        if agreement.status.is_final() {
            let e = SwapError::AlreadyFinalized(agreement.status);
            warn!(caller = %caller, error = %e, "Finalization rejected");
            return Err(e);
        }

        match self.config.finalizer_policy {
            FinalizerPolicy::Anyone => Ok(()),
            FinalizerPolicy::PartiesOnly if self.terms.is_party(&caller) => Ok(()),
            FinalizerPolicy::PartiesOnly => {
                let e = SwapError::NotAParty(caller);
                warn!(caller = %caller, "Finalization by non-party rejected");
                Err(e)
            }
        }
    }

    /// Move each listed leg's custody balance to its target under both ledger
    /// locks. Nothing moves unless every leg can.
    fn release(&self, moves: &[(Leg, Address)]) -> Result<()> {
        if moves.is_empty() {
            return Ok(());
        }

        let (mut guard_a, mut guard_b) = Ledger::lock_pair(&self.ledger_a, &self.ledger_b)?;

        for (leg, _) in moves {
            let guard = match leg {
                Leg::A => &guard_a,
                Leg::B => &guard_b,
            };
            let required = self.terms.leg(*leg).amount;
            let available = guard.balance_of(&self.custody);
            if available < required {
                return Err(SwapError::ExecutionFailed(format!(
                    "custody holds {} of leg {}, needs {}",
                    available, leg, required
                )));
            }
        }

        let mut applied: Vec<(Leg, Address)> = Vec::with_capacity(moves.len());
        for (leg, target) in moves {
            let amount = self.terms.leg(*leg).amount;
            let guard = select(&mut guard_a, &mut guard_b, *leg);
            if let Err(e) = guard.transfer(self.custody, *target, amount) {
                for (done_leg, done_target) in applied.iter().rev() {
                    let done_amount = self.terms.leg(*done_leg).amount;
                    let guard = select(&mut guard_a, &mut guard_b, *done_leg);
                    if let Err(undo) = guard.transfer(*done_target, self.custody, done_amount) {
                        error!(
                            leg = %done_leg,
                            error = %undo,
                            "Compensating transfer failed"
                        );
                    }
                }
                return Err(SwapError::ExecutionFailed(format!(
                    "leg {} transfer failed: {}",
                    leg, e
                )));
            }
            applied.push((*leg, *target));
        }

        Ok(())
    }
}

fn select<'g, 'a>(
    guard_a: &'g mut LedgerWriteGuard<'a>,
    guard_b: &'g mut LedgerWriteGuard<'a>,
    leg: Leg,
) -> &'g mut LedgerWriteGuard<'a> {
    match leg {
        Leg::A => guard_a,
        Leg::B => guard_b,
    }
}

impl std::fmt::Debug for EscrowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowEngine")
            .field("id", &self.id)
            .field("custody", &self.custody)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EscrowMetrics;
    use std::thread;
    use tokenswap_ledger::TokenConfig;

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn whole(n: u128) -> Amount {
        Amount::new(n * ONE)
    }

    struct Fixture {
        alice: Address,
        bob: Address,
        alc: Arc<Ledger>,
        bob_coin: Arc<Ledger>,
        registry: AssetRegistry,
        metrics: SharedMetrics,
    }

    fn setup() -> Fixture {
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let registry = AssetRegistry::new();
        let alc = registry
            .deploy(TokenConfig::new("AliceCoin", "ALC", alice, whole(100)))
            .unwrap();
        let bob_coin = registry
            .deploy(TokenConfig::new("BobCoin", "BOB", bob, whole(100)))
            .unwrap();

        Fixture {
            alice,
            bob,
            alc,
            bob_coin,
            registry,
            metrics: Arc::new(EscrowMetrics::new()),
        }
    }

    fn create_engine(fx: &Fixture, config: EscrowConfig) -> EscrowEngine {
        let terms = SwapTerms::new(
            fx.alc.id(),
            fx.alice,
            whole(10),
            fx.bob_coin.id(),
            fx.bob,
            whole(20),
        );
        EscrowEngine::new(terms, &fx.registry, config, Arc::clone(&fx.metrics)).unwrap()
    }

    #[test]
    fn test_full_swap() {
        let fx = setup();
        let engine = create_engine(&fx, EscrowConfig::default());
        assert_eq!(engine.status(), EscrowStatus::Created);

        assert_eq!(
            engine.deposit(fx.bob, Leg::B, whole(20)).unwrap(),
            EscrowStatus::AwaitingCounterparty
        );
        assert_eq!(
            engine.deposit(fx.alice, Leg::A, whole(10)).unwrap(),
            EscrowStatus::Funded
        );
        assert_eq!(engine.custody_balances().unwrap(), (whole(10), whole(20)));

        engine.execute(fx.alice).unwrap();

        assert_eq!(engine.status(), EscrowStatus::Executed);
        assert_eq!(fx.bob_coin.balance_of(&fx.alice), whole(20));
        assert_eq!(fx.alc.balance_of(&fx.bob), whole(10));
        assert_eq!(fx.alc.balance_of(&fx.alice), whole(90));
        assert_eq!(fx.bob_coin.balance_of(&fx.bob), whole(80));
        assert_eq!(engine.custody_balances().unwrap(), (Amount::ZERO, Amount::ZERO));
        assert_eq!(
            engine.cancel(fx.alice),
            Err(SwapError::AlreadyFinalized(EscrowStatus::Executed))
        );
        assert_eq!(fx.metrics.snapshot().executions, 1);
    }

    #[test]
    fn test_cancel_refunds_deposited_leg() {
        let fx = setup();
        let engine = create_engine(&fx, EscrowConfig::default());

        engine.deposit(fx.alice, Leg::A, whole(10)).unwrap();
        assert_eq!(fx.alc.balance_of(&fx.alice), whole(90));

        engine.cancel(fx.bob).unwrap();

        assert_eq!(engine.status(), EscrowStatus::Cancelled);
        assert_eq!(fx.alc.balance_of(&fx.alice), whole(100));
        assert_eq!(fx.bob_coin.balance_of(&fx.bob), whole(100));
        assert_eq!(engine.custody_balances().unwrap(), (Amount::ZERO, Amount::ZERO));
        assert!(matches!(
            engine.deposit(fx.bob, Leg::B, whole(20)),
            Err(SwapError::AlreadyFinalized(EscrowStatus::Cancelled))
        ));
    }

    #[test]
    fn test_deposit_rejections_leave_balances() {
        let fx = setup();
        let engine = create_engine(&fx, EscrowConfig::default());

        assert!(matches!(
            engine.deposit(fx.bob, Leg::A, whole(10)),
            Err(SwapError::WrongCaller { .. })
        ));
        assert!(matches!(
            engine.deposit(fx.alice, Leg::A, whole(9)),
            Err(SwapError::AmountMismatch { .. })
        ));

        engine.deposit(fx.alice, Leg::A, whole(10)).unwrap();
        assert_eq!(
            engine.deposit(fx.alice, Leg::A, whole(10)),
            Err(SwapError::AlreadyDeposited(Leg::A))
        );
        assert_eq!(fx.alc.balance_of(&fx.alice), whole(90));
        assert_eq!(fx.metrics.snapshot().deposits_rejected, 3);
    }

    #[test]
    fn test_deposit_without_funds_leaves_agreement() {
        let fx = setup();
        let engine = create_engine(&fx, EscrowConfig::default());

        fx.alc
            .transfer(fx.alice, Address::derive("eve"), whole(95))
            .unwrap();

        assert!(matches!(
            engine.deposit(fx.alice, Leg::A, whole(10)),
            Err(SwapError::InsufficientBalance { .. })
        ));
        assert_eq!(engine.status(), EscrowStatus::Created);
        assert!(!engine.snapshot().deposited_a);
    }

    #[test]
    fn test_execute_before_funded() {
        let fx = setup();
        let engine = create_engine(&fx, EscrowConfig::default());
        engine.deposit(fx.alice, Leg::A, whole(10)).unwrap();

        assert_eq!(
            engine.execute(fx.alice),
            Err(SwapError::InvalidTransition {
                from: EscrowStatus::AwaitingCounterparty,
                to: EscrowStatus::Executed,
            })
        );
        assert_eq!(fx.alc.balance_of(&fx.bob), Amount::ZERO);
    }

    #[test]
    fn test_finalizer_policy() {
        let fx = setup();
        let eve = Address::derive("eve");

        let engine = create_engine(&fx, EscrowConfig::default());
        assert_eq!(engine.cancel(eve), Err(SwapError::NotAParty(eve)));
        assert_eq!(engine.cancel(eve).unwrap_err().error_code(), "NOT_A_PARTY");

        let open = create_engine(
            &fx,
            EscrowConfig {
                finalizer_policy: FinalizerPolicy::Anyone,
                ..EscrowConfig::default()
            },
        );
        open.deposit(fx.alice, Leg::A, whole(10)).unwrap();
        open.deposit(fx.bob, Leg::B, whole(20)).unwrap();
        open.execute(eve).unwrap();
        assert_eq!(fx.alc.balance_of(&fx.bob), whole(10));
    }

    #[test]
    fn test_allowance_funding_mode() {
        let fx = setup();
        let engine = create_engine(
            &fx,
            EscrowConfig {
                funding_mode: FundingMode::Allowance,
                ..EscrowConfig::default()
            },
        );
        let custody = engine.custody_address();

        assert!(matches!(
            engine.deposit(fx.alice, Leg::A, whole(10)),
            Err(SwapError::InsufficientAllowance { .. })
        ));

        fx.alc.approve(fx.alice, custody, whole(10)).unwrap();
        fx.bob_coin.approve(fx.bob, custody, whole(20)).unwrap();
        engine.deposit(fx.alice, Leg::A, whole(10)).unwrap();
        engine.deposit(fx.bob, Leg::B, whole(20)).unwrap();

        assert_eq!(fx.alc.allowance(&fx.alice, &custody), Amount::ZERO);
        engine.execute(fx.bob).unwrap();
        assert_eq!(fx.bob_coin.balance_of(&fx.alice), whole(20));
    }

    #[test]
    fn test_failed_execution_is_retryable() {
        let fx = setup();
        let engine = create_engine(&fx, EscrowConfig::default());
        let custody = engine.custody_address();
        let eve = Address::derive("eve");

        engine.deposit(fx.alice, Leg::A, whole(10)).unwrap();
        engine.deposit(fx.bob, Leg::B, whole(20)).unwrap();

        // Drain leg B's custody from outside the engine.
        fx.bob_coin.transfer(custody, eve, whole(20)).unwrap();

        let err = engine.execute(fx.alice).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(engine.status(), EscrowStatus::Funded);
        assert_eq!(fx.alc.balance_of(&custody), whole(10));
        assert_eq!(fx.alc.balance_of(&fx.bob), Amount::ZERO);

        fx.bob_coin.transfer(eve, custody, whole(20)).unwrap();
        engine.execute(fx.alice).unwrap();

        assert_eq!(engine.status(), EscrowStatus::Executed);
        assert_eq!(fx.bob_coin.balance_of(&fx.alice), whole(20));
        let snapshot = fx.metrics.snapshot();
        assert_eq!(snapshot.execution_failures, 1);
        assert_eq!(snapshot.executions, 1);
    }

    #[test]
    fn test_terms_must_name_registered_assets() {
        let fx = setup();
        let terms = SwapTerms::new(
            fx.alc.id(),
            fx.alice,
            whole(1),
            tokenswap_common::AssetId::new(),
            fx.bob,
            whole(1),
        );

        assert!(matches!(
            EscrowEngine::new(terms, &fx.registry, EscrowConfig::default(), Arc::clone(&fx.metrics)),
            Err(SwapError::UnknownAsset(_))
        ));
    }

    #[test]
    fn test_concurrent_duplicate_deposits_succeed_once() {
        let fx = setup();
        let engine = Arc::new(create_engine(&fx, EscrowConfig::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let alice = fx.alice;
                thread::spawn(move || engine.deposit(alice, Leg::A, whole(10)).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(fx.alc.balance_of(&fx.alice), whole(90));
        assert_eq!(engine.custody_balances().unwrap(), (whole(10), Amount::ZERO));
    }

    #[test]
    fn test_reader_never_sees_half_executed_swap() {
        let fx = setup();
        let engine = Arc::new(create_engine(&fx, EscrowConfig::default()));
        engine.deposit(fx.alice, Leg::A, whole(10)).unwrap();
        engine.deposit(fx.bob, Leg::B, whole(20)).unwrap();

        let reader = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    let pair = engine.custody_balances().unwrap();
                    assert!(
                        pair == (whole(10), whole(20)) || pair == (Amount::ZERO, Amount::ZERO),
                        "observed partial release: {:?}",
                        pair
                    );
                }
            })
        };

        engine.execute(fx.bob).unwrap();
        reader.join().unwrap();
    }
}
