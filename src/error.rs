//! Error types for ledger harness operations.
//!
//! Local usage and precondition failures are raised before any network call.
//! Network outcomes surface at the suspension point that resolves them
//! (`submit`, `wait_for`). Business failures reported by the ledger are not
//! errors at all: they arrive as a [`Status`] inside a successful receipt.

use thiserror::Error;

use crate::receipt::Status;

/// Errors that can occur while building, signing, submitting or observing
/// ledger operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Local validation failure; the draft never reaches the network.
    #[error("Malformed draft: {reason}")]
    MalformedDraft { reason: String },

    /// A draft may be frozen at most once.
    #[error("Transaction draft #{draft_id} has already been frozen")]
    AlreadyFrozen { draft_id: u64 },

    /// Threshold policy constraints violated (1 <= t <= n, distinct members).
    #[error("Invalid signing policy: {reason}")]
    InvalidPolicy { reason: String },

    /// Not enough distinct signatures for a registered requirement.
    #[error("Insufficient signatures: {required} required, {provided} provided")]
    InsufficientSignatures { required: usize, provided: usize },

    /// Definite rejection by the network before consensus.
    #[error("Transaction {transaction_id} rejected before consensus: {reason}")]
    Rejected {
        transaction_id: String,
        reason: Status,
    },

    /// The payload was sent but its outcome is unknown; reconcile with a
    /// receipt query, never by resubmitting.
    #[error("Outcome of transaction {transaction_id} is unknown: {reason}")]
    AmbiguousOutcome {
        transaction_id: String,
        reason: String,
    },

    /// The same signed payload was handed to the resolver twice.
    #[error("Transaction {transaction_id} has already been submitted")]
    DuplicateSubmission { transaction_id: String },

    /// Network failure where nothing reached the ledger, or a failed query.
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// Actor name not present in the signer registry.
    #[error("Unknown actor: {name}")]
    UnknownActor { name: String },

    /// Key material could not be decoded.
    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    /// Entity identifier not in `shard.realm.num` form.
    #[error("Invalid entity id '{input}'")]
    InvalidEntityId { input: String },

    /// Environment or fixture configuration problem.
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// A scenario step read a field no earlier step produced.
    #[error("Scenario state '{field}' has not been set")]
    MissingState { field: &'static str },

    /// The topic feed failed; the subscription is now errored.
    #[error("Subscription to topic {topic_id} failed: {reason}")]
    Subscription { topic_id: String, reason: String },

    /// Waiting on a subscription that was already cancelled.
    #[error("Subscription to topic {topic_id} has been cancelled")]
    SubscriptionCancelled { topic_id: String },

    /// A scenario expectation did not hold.
    #[error("Assertion failed in '{step}': {detail}")]
    Assertion { step: &'static str, detail: String },

    /// Encoding or decoding of a transaction envelope failed.
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    /// File I/O error while loading fixtures.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Shorthand for a `MalformedDraft` error.
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDraft {
            reason: reason.into(),
        }
    }

    /// Shorthand for an `Assertion` error.
    pub(crate) fn assertion(step: &'static str, detail: impl Into<String>) -> Self {
        Self::Assertion {
            step,
            detail: detail.into(),
        }
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Result type alias for harness operations.
pub type Result<T> = core::result::Result<T, HarnessError>;
