//! Consensus topic operations.

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::keys::Key;
use crate::transaction::{validate_key, TransactionData, TransactionDraft};
use crate::types::{AccountId, TopicId};

/// Longest topic memo accepted, in bytes.
pub const MAX_TOPIC_MEMO_BYTES: usize = 100;

/// Largest single message accepted, in bytes. Chunking is not supported.
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Create a consensus topic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCreate {
    pub memo: String,
    pub admin_key: Option<Key>,
    pub submit_key: Option<Key>,
    pub auto_renew_account: Option<AccountId>,
}

impl TopicCreate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn admin_key(mut self, key: impl Into<Key>) -> Self {
        self.admin_key = Some(key.into());
        self
    }

    /// Key that must sign every message submitted to the topic.
    pub fn submit_key(mut self, key: impl Into<Key>) -> Self {
        self.submit_key = Some(key.into());
        self
    }

    pub fn auto_renew_account(mut self, account: AccountId) -> Self {
        self.auto_renew_account = Some(account);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.memo.len() > MAX_TOPIC_MEMO_BYTES {
            return Err(HarnessError::malformed(format!(
                "topic memo is {} bytes, limit {}",
                self.memo.len(),
                MAX_TOPIC_MEMO_BYTES
            )));
        }
        for key in [&self.admin_key, &self.submit_key].into_iter().flatten() {
            validate_key(key)?;
        }
        Ok(())
    }

    pub fn build(self) -> Result<TransactionDraft> {
        self.validate()?;
        Ok(TransactionDraft::new(TransactionData::TopicCreate(self)))
    }
}

/// Submit one message to a topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessageSubmit {
    pub topic_id: TopicId,
    #[serde(with = "crate::utils::serde_hex")]
    pub message: Vec<u8>,
}

impl TopicMessageSubmit {
    pub fn new(topic_id: TopicId, message: impl Into<Vec<u8>>) -> Self {
        Self {
            topic_id,
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.message.is_empty() {
            return Err(HarnessError::malformed("topic message must not be empty"));
        }
        if self.message.len() > MAX_MESSAGE_BYTES {
            return Err(HarnessError::malformed(format!(
                "topic message is {} bytes, limit {}",
                self.message.len(),
                MAX_MESSAGE_BYTES
            )));
        }
        Ok(())
    }

    pub fn build(self) -> Result<TransactionDraft> {
        self.validate()?;
        Ok(TransactionDraft::new(TransactionData::TopicMessageSubmit(self)))
    }
}
