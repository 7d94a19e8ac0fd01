//! Ledger network seam.
//!
//! [`NetworkClient`] is the only path from the harness to a ledger. The
//! in-memory [`simulated::SimulatedLedger`] implements it for tests and for
//! the `run-scenarios` binary.

pub mod simulated;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::HarnessError;
use crate::keys::Key;
use crate::receipt::{Receipt, Status};
use crate::transaction::SupplyType;
use crate::types::{AccountId, Hbar, Timestamp, TokenId, TopicId, TransactionId};

pub use simulated::{LedgerConfig, SimulatedLedger};

/// Errors raised at the network boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The request was sent but no answer arrived in time.
    #[error("request timed out")]
    Timeout,

    /// The node could not be reached; nothing was sent.
    #[error("node unavailable: {0}")]
    Unavailable(String),

    /// The requested entity or receipt does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request could not be decoded.
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl From<NetworkError> for HarnessError {
    fn from(e: NetworkError) -> Self {
        HarnessError::Network {
            reason: e.to_string(),
        }
    }
}

/// Result alias for network calls.
pub type NetworkResult<T> = core::result::Result<T, NetworkError>;

/// Node answer to a submitted transaction (precheck outcome).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitResponse {
    pub transaction_id: TransactionId,
    /// `Ok` when accepted for consensus, otherwise the rejection reason.
    pub precheck: Status,
}

/// Hbar and token balances of an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub hbars: Hbar,
    pub tokens: BTreeMap<TokenId, u64>,
}

/// Relationship between an account and a token it is associated with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRelationship {
    pub token_id: TokenId,
    pub symbol: String,
    pub balance: u64,
    pub decimals: u32,
    pub frozen: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub account_id: AccountId,
    pub key: Key,
    pub balance: Hbar,
    pub token_relationships: BTreeMap<TokenId, TokenRelationship>,
    pub memo: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub total_supply: u64,
    pub max_supply: Option<u64>,
    pub supply_type: SupplyType,
    pub treasury_account_id: AccountId,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
    pub wipe_key: Option<Key>,
    pub kyc_key: Option<Key>,
    pub freeze_default: bool,
    pub memo: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicInfo {
    pub topic_id: TopicId,
    pub memo: String,
    /// Sequence number of the latest message (0 when empty).
    pub sequence_number: u64,
    #[serde(with = "crate::utils::serde_hex")]
    pub running_hash: Vec<u8>,
    pub admin_key: Option<Key>,
    pub submit_key: Option<Key>,
    pub auto_renew_account: Option<AccountId>,
}

/// One consensus-ordered topic message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessage {
    pub topic_id: TopicId,
    pub sequence_number: u64,
    pub consensus_timestamp: Timestamp,
    #[serde(with = "crate::utils::serde_hex")]
    pub contents: Vec<u8>,
    #[serde(with = "crate::utils::serde_hex")]
    pub running_hash: Vec<u8>,
}

impl TopicMessage {
    /// Contents as UTF-8, lossily decoded.
    pub fn contents_utf8(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Where a topic watch starts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StartCursor {
    /// Replay from the first message.
    #[default]
    Beginning,
    /// Only messages with a greater sequence number.
    AfterSequence(u64),
    /// Messages with a consensus timestamp at or after this instant.
    FromTime(Timestamp),
}

impl StartCursor {
    /// Whether `message` falls inside this cursor's window.
    pub fn admits(&self, message: &TopicMessage) -> bool {
        match self {
            StartCursor::Beginning => true,
            StartCursor::AfterSequence(seq) => message.sequence_number > *seq,
            StartCursor::FromTime(ts) => message.consensus_timestamp >= *ts,
        }
    }
}

/// Item pushed into a watch sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    Message(TopicMessage),
    /// The feed failed and will deliver nothing further.
    Error(String),
}

/// Receiving end of a topic watch.
pub type WatchSink = mpsc::UnboundedSender<WatchEvent>;

/// Identifies an open topic watch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(pub u64);

/// Ledger network operations used by the harness.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Send a signed transaction envelope to a node.
    async fn execute_transaction(&self, signed_bytes: Vec<u8>) -> NetworkResult<SubmitResponse>;

    /// Fetch the receipt of a transaction. `Unknown` status while pending.
    async fn fetch_receipt(&self, transaction_id: TransactionId) -> NetworkResult<Receipt>;

    async fn query_balance(&self, account_id: AccountId) -> NetworkResult<AccountBalance>;

    async fn query_account_info(&self, account_id: AccountId) -> NetworkResult<AccountInfo>;

    async fn query_token_info(&self, token_id: TokenId) -> NetworkResult<TokenInfo>;

    async fn query_topic_info(&self, topic_id: TopicId) -> NetworkResult<TopicInfo>;

    /// Start pushing messages of `topic_id` admitted by `start` into `sink`.
    async fn open_topic_watch(
        &self,
        topic_id: TopicId,
        start: StartCursor,
        sink: WatchSink,
    ) -> NetworkResult<WatchHandle>;

    /// Stop a watch. Unknown or already closed handles are ignored.
    fn close_watch(&self, handle: WatchHandle);
}
