//! Serialized transaction body and envelope.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::SignaturePair;
use crate::transaction::{
    AccountCreate, TokenAssociate, TokenCreate, TokenMint, TopicCreate, TopicMessageSubmit,
    Transfer,
};
use crate::types::{AccountId, Hbar, TransactionId};

/// Typed parameters of one ledger operation. Exactly one kind per draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "camelCase")]
pub enum TransactionData {
    AccountCreate(AccountCreate),
    TokenCreate(TokenCreate),
    TokenMint(TokenMint),
    TokenAssociate(TokenAssociate),
    Transfer(Transfer),
    TopicCreate(TopicCreate),
    TopicMessageSubmit(TopicMessageSubmit),
}

/// Operation kind, used for logging and dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    AccountCreate,
    TokenCreate,
    TokenMint,
    TokenAssociate,
    Transfer,
    TopicCreate,
    TopicMessageSubmit,
}

impl TransactionData {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionData::AccountCreate(_) => TransactionKind::AccountCreate,
            TransactionData::TokenCreate(_) => TransactionKind::TokenCreate,
            TransactionData::TokenMint(_) => TransactionKind::TokenMint,
            TransactionData::TokenAssociate(_) => TransactionKind::TokenAssociate,
            TransactionData::Transfer(_) => TransactionKind::Transfer,
            TransactionData::TopicCreate(_) => TransactionKind::TopicCreate,
            TransactionData::TopicMessageSubmit(_) => TransactionKind::TopicMessageSubmit,
        }
    }

    /// Re-run the builder validation for these parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            TransactionData::AccountCreate(p) => p.validate(),
            TransactionData::TokenCreate(p) => p.validate(),
            TransactionData::TokenMint(p) => p.validate(),
            TransactionData::TokenAssociate(p) => p.validate(),
            TransactionData::Transfer(p) => p.validate(),
            TransactionData::TopicCreate(p) => p.validate(),
            TransactionData::TopicMessageSubmit(p) => p.validate(),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::AccountCreate => "AccountCreate",
            TransactionKind::TokenCreate => "TokenCreate",
            TransactionKind::TokenMint => "TokenMint",
            TransactionKind::TokenAssociate => "TokenAssociate",
            TransactionKind::Transfer => "CryptoTransfer",
            TransactionKind::TopicCreate => "TopicCreate",
            TransactionKind::TopicMessageSubmit => "TopicMessageSubmit",
        };
        f.write_str(name)
    }
}

/// The signed-over portion of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    pub node_account_id: AccountId,
    pub max_transaction_fee: Hbar,
    pub memo: String,
    pub data: TransactionData,
}

impl TransactionBody {
    /// Canonical byte encoding (the bytes every signature covers).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Account paying the fee.
    pub fn payer(&self) -> AccountId {
        self.transaction_id.account_id
    }
}

/// Wire envelope: body bytes plus attached signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    #[serde(with = "crate::utils::serde_hex")]
    pub body_bytes: Vec<u8>,
    pub signatures: Vec<SignaturePair>,
}

impl SignedTransaction {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode the body.
    pub fn body(&self) -> Result<TransactionBody> {
        TransactionBody::from_bytes(&self.body_bytes)
    }
}
