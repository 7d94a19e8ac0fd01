//! Named actors and their signing capabilities.
//!
//! The registry is built once from fixture data and is read-only afterwards,
//! so scenarios share it through an `Arc` without locking.

use std::collections::HashMap;

use crate::config::FixtureSet;
use crate::error::{HarnessError, Result};
use crate::keys::{PublicKey, Signer, SigningPolicy};
use crate::types::AccountId;

/// Registry name of the operator actor.
pub const OPERATOR: &str = "operator";

/// A named identity: an account plus the capability to sign for it.
#[derive(Clone, Debug)]
pub struct Actor {
    pub name: String,
    pub account_id: AccountId,
    pub signer: Signer,
}

impl Actor {
    pub fn new(name: impl Into<String>, account_id: AccountId, signer: Signer) -> Self {
        Self {
            name: name.into(),
            account_id,
            signer,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Single-key policy for this actor.
    pub fn policy(&self) -> SigningPolicy {
        SigningPolicy::single(self.signer.clone())
    }
}

/// Lookup table from actor name to [`Actor`].
#[derive(Clone, Debug)]
pub struct SignerRegistry {
    operator: Actor,
    /// Non-operator actors in fixture order.
    accounts: Vec<Actor>,
    by_name: HashMap<String, usize>,
}

impl SignerRegistry {
    /// Registry holding only the operator.
    pub fn new(operator: Actor) -> Self {
        Self {
            operator,
            accounts: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Build from fixture records. Accounts are named `account0`, `account1`, ...
    pub fn from_fixtures(fixtures: &FixtureSet) -> Result<Self> {
        let operator = fixtures.operator.as_ref().ok_or_else(|| HarnessError::Config {
            reason: "operator credentials are not configured".into(),
        })?;

        let mut registry = Self::new(Actor::new(OPERATOR, operator.id, operator.signer()?));
        for (index, record) in fixtures.accounts.iter().enumerate() {
            registry.insert(Actor::new(
                format!("account{}", index),
                record.id,
                record.signer()?,
            ))?;
        }
        Ok(registry)
    }

    /// Add an actor. Names must be unique.
    pub fn insert(&mut self, actor: Actor) -> Result<()> {
        if actor.name == OPERATOR || self.by_name.contains_key(&actor.name) {
            return Err(HarnessError::Config {
                reason: format!("actor '{}' is already registered", actor.name),
            });
        }
        self.by_name.insert(actor.name.clone(), self.accounts.len());
        self.accounts.push(actor);
        Ok(())
    }

    /// Resolve an actor by name.
    pub fn actor(&self, name: &str) -> Result<&Actor> {
        if name == OPERATOR {
            return Ok(&self.operator);
        }
        self.by_name
            .get(name)
            .map(|&i| &self.accounts[i])
            .ok_or_else(|| HarnessError::UnknownActor {
                name: name.to_string(),
            })
    }

    /// Resolve an actor's signing capability.
    pub fn signer(&self, name: &str) -> Result<Signer> {
        self.actor(name).map(|a| a.signer.clone())
    }

    /// The `index`-th non-operator actor.
    pub fn nth(&self, index: usize) -> Result<&Actor> {
        self.accounts
            .get(index)
            .ok_or_else(|| HarnessError::UnknownActor {
                name: format!("account{}", index),
            })
    }

    pub fn operator(&self) -> &Actor {
        &self.operator
    }

    /// Non-operator actors in registration order.
    pub fn accounts(&self) -> &[Actor] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
