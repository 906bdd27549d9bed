//! End-to-end swap scenarios through the book and the call surface.

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use tokenswap_common::{
    parse_units, Address, Amount, EscrowStatus, Leg, SwapError, SwapTerms,
};
use tokenswap_escrow::{
    Call, Contract, EscrowBook, EscrowCall, EscrowConfig, FinalizerPolicy, FundingMode,
    LedgerCall, Reply,
};
use tokenswap_ledger::{AssetRegistry, Ledger, TokenConfig};

struct Deployment {
    alice: Address,
    bob: Address,
    alc: Arc<Ledger>,
    bob_coin: Arc<Ledger>,
    book: EscrowBook,
}

fn units(text: &str) -> Amount {
    parse_units(text, 18).unwrap()
}

fn deploy(config: EscrowConfig) -> Deployment {
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    let registry = Arc::new(AssetRegistry::new());
    let alc = registry
        .deploy(TokenConfig::new("AliceCoin", "ALC", alice, units("100")))
        .unwrap();
    let bob_coin = registry
        .deploy(TokenConfig::new("BobCoin", "BOB", bob, units("100")))
        .unwrap();

    Deployment {
        alice,
        bob,
        alc,
        bob_coin,
        book: EscrowBook::new(registry, config).unwrap(),
    }
}

fn reference_terms(d: &Deployment) -> SwapTerms {
    SwapTerms::new(
        d.alc.id(),
        d.alice,
        units("10"),
        d.bob_coin.id(),
        d.bob,
        units("20"),
    )
}

#[test]
fn test_reference_swap_through_calls() {
    let d = deploy(EscrowConfig::default());
    let engine = d.book.open("alice-bob", reference_terms(&d)).unwrap();
    let escrow = Contract::Escrow(Arc::clone(&engine));

    let status = escrow
        .call(
            d.bob,
            Call::Escrow(EscrowCall::Deposit {
                leg: Leg::B,
                amount: units("20"),
            }),
        )
        .unwrap();
    assert_eq!(status, Reply::Status(EscrowStatus::AwaitingCounterparty));

    let status = escrow
        .call(
            d.alice,
            Call::Escrow(EscrowCall::Deposit {
                leg: Leg::A,
                amount: units("10"),
            }),
        )
        .unwrap();
    assert_eq!(status, Reply::Status(EscrowStatus::Funded));

    escrow.call(d.alice, Call::Escrow(EscrowCall::Execute)).unwrap();

    let bob_coin = Contract::Ledger(Arc::clone(&d.bob_coin));
    assert_eq!(
        bob_coin
            .call(d.alice, Call::Ledger(LedgerCall::BalanceOf { account: d.alice }))
            .unwrap(),
        Reply::Amount(units("20"))
    );
    assert_eq!(d.alc.balance_of(&d.bob), units("10"));
    assert_eq!(
        escrow
            .call(d.bob, Call::Escrow(EscrowCall::Cancel))
            .unwrap_err(),
        SwapError::AlreadyFinalized(EscrowStatus::Executed)
    );
    assert!(d.alc.verify_integrity());
    assert!(d.bob_coin.verify_integrity());
}

#[test]
fn test_cancel_after_one_leg_refunds_only_that_leg() {
    let d = deploy(EscrowConfig::default());
    let engine = d.book.open("alice-bob", reference_terms(&d)).unwrap();

    engine.deposit(d.alice, Leg::A, units("10")).unwrap();
    engine.cancel(d.alice).unwrap();

    assert_eq!(d.alc.balance_of(&d.alice), units("100"));
    assert_eq!(d.bob_coin.balance_of(&d.bob), units("100"));
    assert_eq!(
        engine.custody_balances().unwrap(),
        (Amount::ZERO, Amount::ZERO)
    );
    assert_eq!(d.book.active_count(), 0);
}

#[test]
fn test_allowance_mode_with_replayed_open() {
    let d = deploy(EscrowConfig {
        funding_mode: FundingMode::Allowance,
        ..EscrowConfig::default()
    });
    let engine = d.book.open("alice-bob", reference_terms(&d)).unwrap();
    let custody = engine.custody_address();

    d.alc.approve(d.alice, custody, units("10")).unwrap();
    d.bob_coin.approve(d.bob, custody, units("20")).unwrap();

    let replayed = d.book.open("alice-bob", reference_terms(&d)).unwrap();
    replayed.deposit(d.alice, Leg::A, units("10")).unwrap();
    engine.deposit(d.bob, Leg::B, units("20")).unwrap();
    replayed.execute(d.bob).unwrap();

    assert_eq!(engine.status(), EscrowStatus::Executed);
    assert_eq!(d.bob_coin.balance_of(&d.alice), units("20"));
    assert_eq!(d.book.len(), 1);
}

#[test]
fn test_racing_finalizers_execute_or_cancel_exactly_once() {
    let d = deploy(EscrowConfig {
        finalizer_policy: FinalizerPolicy::Anyone,
        ..EscrowConfig::default()
    });
    let engine = d.book.open("race", reference_terms(&d)).unwrap();
    engine.deposit(d.alice, Leg::A, units("10")).unwrap();
    engine.deposit(d.bob, Leg::B, units("20")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let caller = Address::derive(&format!("finalizer-{}", i));
                if i % 2 == 0 {
                    engine.execute(caller).is_ok()
                } else {
                    engine.cancel(caller).is_ok()
                }
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert!(engine.status().is_final());
    assert_eq!(
        engine.custody_balances().unwrap(),
        (Amount::ZERO, Amount::ZERO)
    );

    let alc_held = d
        .alc
        .balance_of(&d.alice)
        .checked_add(d.alc.balance_of(&d.bob))
        .unwrap();
    assert_eq!(alc_held, units("100"));
}

#[derive(Debug, Clone)]
enum Action {
    Deposit { by_alice: bool, leg_a: bool, exact: bool },
    Execute { by_party: bool },
    Cancel { by_party: bool },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(by_alice, leg_a, exact)| {
            Action::Deposit {
                by_alice,
                leg_a,
                exact,
            }
        }),
        any::<bool>().prop_map(|by_party| Action::Execute { by_party }),
        any::<bool>().prop_map(|by_party| Action::Cancel { by_party }),
    ]
}

proptest! {
    #[test]
    fn prop_value_is_conserved(actions in proptest::collection::vec(action_strategy(), 1..20)) {
        let d = deploy(EscrowConfig::default());
        let engine = d.book.open("prop", reference_terms(&d)).unwrap();
        let custody = engine.custody_address();
        let eve = Address::derive("eve");

        for action in actions {
            let _ = match action {
                Action::Deposit { by_alice, leg_a, exact } => {
                    let caller = if by_alice { d.alice } else { d.bob };
                    let leg = if leg_a { Leg::A } else { Leg::B };
                    let amount = if exact {
                        engine.terms().leg(leg).amount
                    } else {
                        units("1")
                    };
                    engine.deposit(caller, leg, amount).map(|_| ())
                }
                Action::Execute { by_party } => engine.execute(if by_party { d.alice } else { eve }),
                Action::Cancel { by_party } => engine.cancel(if by_party { d.bob } else { eve }),
            };

            let snapshot = engine.snapshot();
            let (held_a, held_b) = engine.custody_balances().unwrap();
            let expect_held = |deposited: bool, leg: Leg| {
                if deposited && !snapshot.status.is_final() {
                    engine.terms().leg(leg).amount
                } else {
                    Amount::ZERO
                }
            };
            prop_assert_eq!(held_a, expect_held(snapshot.deposited_a, Leg::A));
            prop_assert_eq!(held_b, expect_held(snapshot.deposited_b, Leg::B));
            prop_assert_eq!(d.alc.balance_of(&custody), held_a);
        }

        prop_assert_eq!(d.alc.total_supply(), units("100"));
        prop_assert_eq!(d.bob_coin.total_supply(), units("100"));
        prop_assert!(d.alc.verify_integrity());
        prop_assert!(d.bob_coin.verify_integrity());
    }
}
