use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::keys::Key;
use crate::transaction::{TransactionData, TransactionDraft};
use crate::types::Hbar;

/// Create a new account guarded by `key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreate {
    pub key: Key,
    pub initial_balance: Hbar,
    pub memo: String,
}

impl AccountCreate {
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            initial_balance: Hbar::ZERO,
            memo: String::new(),
        }
    }

    /// Balance transferred from the payer into the new account.
    pub fn initial_balance(mut self, amount: Hbar) -> Self {
        self.initial_balance = amount;
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_balance.to_tinybars() < 0 {
            return Err(HarnessError::malformed("initial balance must not be negative"));
        }
        super::validate_key(&self.key)
    }

    pub fn build(self) -> Result<TransactionDraft> {
        self.validate()?;
        Ok(TransactionDraft::new(TransactionData::AccountCreate(self)))
    }
}
