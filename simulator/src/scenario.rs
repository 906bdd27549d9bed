//! Simulation scenarios.

use serde::{Deserialize, Serialize};

use tokenswap_common::{EscrowStatus, Leg};

use crate::party::Party;

/// Name of the concurrent scenario, driven by the controller rather than by
/// scripted steps.
pub const CONTENTION: &str = "contention";

/// A scripted scenario run against one escrow between alice and bob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// Which token a balance assertion reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    /// AliceCoin (ALC), leg A.
    Alc,
    /// BobCoin (BOB), leg B.
    Bob,
}

/// An escrow call made by a party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    Deposit {
        party: Party,
        leg: Leg,
        amount: String,
    },
    Execute {
        party: Party,
    },
    Cancel {
        party: Party,
    },
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Perform an action that must succeed.
    Act(Action),
    /// Perform an action that must fail with the given error code.
    ExpectError { action: Action, error_code: String },
    /// Escrow status equals.
    AssertStatus { status: EscrowStatus },
    /// Party balance equals, in whole tokens.
    AssertBalance {
        party: Party,
        token: Token,
        amount: String,
    },
}

fn deposit(party: Party, leg: Leg, amount: &str) -> Action {
    Action::Deposit {
        party,
        leg,
        amount: amount.to_string(),
    }
}

fn balance(party: Party, token: Token, amount: &str) -> ScenarioStep {
    ScenarioStep::AssertBalance {
        party,
        token,
        amount: amount.to_string(),
    }
}

fn expect_error(action: Action, error_code: &str) -> ScenarioStep {
    ScenarioStep::ExpectError {
        action,
        error_code: error_code.to_string(),
    }
}

impl Scenario {
    /// Load a scripted scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "token-swap" => Ok(Self::token_swap()),
            "cancel-refund" => Ok(Self::cancel_refund()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// 10 ALC from alice for 20 BOB from bob, bob funding first.
    fn token_swap() -> Self {
        Self {
            name: "token-swap".to_string(),
            description: "Reference swap of 10 ALC for 20 BOB".to_string(),
            steps: vec![
                ScenarioStep::Act(deposit(Party::Bob, Leg::B, "20")),
                ScenarioStep::AssertStatus {
                    status: EscrowStatus::AwaitingCounterparty,
                },
                expect_error(deposit(Party::Eve, Leg::A, "10"), "WRONG_CALLER"),
                ScenarioStep::Act(deposit(Party::Alice, Leg::A, "10")),
                ScenarioStep::AssertStatus {
                    status: EscrowStatus::Funded,
                },
                expect_error(Action::Execute { party: Party::Eve }, "NOT_A_PARTY"),
                ScenarioStep::Act(Action::Execute { party: Party::Alice }),
                ScenarioStep::AssertStatus {
                    status: EscrowStatus::Executed,
                },
                balance(Party::Alice, Token::Alc, "90"),
                balance(Party::Alice, Token::Bob, "20"),
                balance(Party::Bob, Token::Alc, "10"),
                balance(Party::Bob, Token::Bob, "80"),
                expect_error(Action::Cancel { party: Party::Alice }, "ALREADY_FINALIZED"),
            ],
        }
    }

    /// One leg funded, then cancelled and refunded.
    fn cancel_refund() -> Self {
        Self {
            name: "cancel-refund".to_string(),
            description: "Leg A deposited, swap cancelled, leg A refunded".to_string(),
            steps: vec![
                ScenarioStep::Act(deposit(Party::Alice, Leg::A, "10")),
                balance(Party::Alice, Token::Alc, "90"),
                expect_error(deposit(Party::Alice, Leg::A, "10"), "ALREADY_DEPOSITED"),
                expect_error(Action::Execute { party: Party::Alice }, "INVALID_TRANSITION"),
                ScenarioStep::Act(Action::Cancel { party: Party::Bob }),
                ScenarioStep::AssertStatus {
                    status: EscrowStatus::Cancelled,
                },
                balance(Party::Alice, Token::Alc, "100"),
                balance(Party::Bob, Token::Bob, "100"),
                expect_error(deposit(Party::Bob, Leg::B, "20"), "ALREADY_FINALIZED"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_known_scenarios() {
        assert_eq!(Scenario::load("token-swap").unwrap().name, "token-swap");
        assert_eq!(Scenario::load("cancel-refund").unwrap().name, "cancel-refund");
        assert!(Scenario::load(CONTENTION).is_err());
    }
}
