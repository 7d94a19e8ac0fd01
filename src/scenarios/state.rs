//! Typed scenario state.
//!
//! Each field is produced by one step and read by later ones. Reading a
//! field no step has produced fails with [`HarnessError::MissingState`].

use crate::error::{HarnessError, Result};
use crate::keys::{Actor, SigningPolicy};
use crate::network::TopicMessage;
use crate::receipt::Receipt;
use crate::runtime::Subscription;
use crate::transaction::FrozenTransaction;
use crate::types::{Hbar, TokenId, TopicId};

/// Named actor positions used by scenario steps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActorSlot {
    First,
    Second,
    Third,
    Fourth,
}

impl ActorSlot {
    pub fn field(&self) -> &'static str {
        match self {
            ActorSlot::First => "first_account",
            ActorSlot::Second => "second_account",
            ActorSlot::Third => "third_account",
            ActorSlot::Fourth => "fourth_account",
        }
    }

    fn index(&self) -> usize {
        match self {
            ActorSlot::First => 0,
            ActorSlot::Second => 1,
            ActorSlot::Third => 2,
            ActorSlot::Fourth => 3,
        }
    }
}

/// State carried between the steps of one scenario.
#[derive(Debug, Default)]
pub struct ScenarioState {
    actors: [Option<Actor>; 4],
    /// Set by token creation; read by mint, transfer and balance steps.
    pub token_id: Option<TokenId>,
    /// Set by topic creation; read by publish and observe steps.
    pub topic_id: Option<TopicId>,
    /// Set by the threshold key step; installed as a topic submit key.
    pub threshold_policy: Option<SigningPolicy>,
    /// Policy guarding topic submissions, set at topic creation.
    pub submit_policy: Option<SigningPolicy>,
    /// Frozen transaction created by one step and submitted by another.
    pub stored_transaction: Option<FrozenTransaction>,
    /// Fee payer of the stored transaction and its balance at creation.
    pub fee_payer_snapshot: Option<(ActorSlot, Hbar)>,
    pub last_receipt: Option<Receipt>,
    /// Contents of every message observed so far.
    pub received_messages: Vec<String>,
    pub subscription: Option<Subscription>,
}

impl ScenarioState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_actor(&mut self, slot: ActorSlot, actor: Actor) {
        self.actors[slot.index()] = Some(actor);
    }

    pub fn actor(&self, slot: ActorSlot) -> Result<&Actor> {
        self.actors[slot.index()]
            .as_ref()
            .ok_or(HarnessError::MissingState { field: slot.field() })
    }

    pub fn token_id(&self) -> Result<TokenId> {
        self.token_id
            .ok_or(HarnessError::MissingState { field: "token_id" })
    }

    pub fn topic_id(&self) -> Result<TopicId> {
        self.topic_id
            .ok_or(HarnessError::MissingState { field: "topic_id" })
    }

    pub fn threshold_policy(&self) -> Result<&SigningPolicy> {
        self.threshold_policy.as_ref().ok_or(HarnessError::MissingState {
            field: "threshold_policy",
        })
    }

    pub fn submit_policy(&self) -> Result<&SigningPolicy> {
        self.submit_policy.as_ref().ok_or(HarnessError::MissingState {
            field: "submit_policy",
        })
    }

    pub fn stored_transaction(&self) -> Result<&FrozenTransaction> {
        self.stored_transaction
            .as_ref()
            .ok_or(HarnessError::MissingState {
                field: "stored_transaction",
            })
    }

    pub fn fee_payer_snapshot(&self) -> Result<(ActorSlot, Hbar)> {
        self.fee_payer_snapshot.ok_or(HarnessError::MissingState {
            field: "fee_payer_snapshot",
        })
    }

    pub fn last_receipt(&self) -> Result<&Receipt> {
        self.last_receipt.as_ref().ok_or(HarnessError::MissingState {
            field: "last_receipt",
        })
    }

    pub fn subscription_mut(&mut self) -> Result<&mut Subscription> {
        self.subscription.as_mut().ok_or(HarnessError::MissingState {
            field: "subscription",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_name_themselves() {
        let state = ScenarioState::new();
        assert!(matches!(
            state.token_id(),
            Err(HarnessError::MissingState { field: "token_id" })
        ));
        assert!(matches!(
            state.actor(ActorSlot::Third),
            Err(HarnessError::MissingState {
                field: "third_account"
            })
        ));
        assert!(state.stored_transaction().is_err());
    }
}
