//! Ledger status codes and transaction receipts.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, TokenId, TopicId, TransactionId};

/// Response codes reported by the ledger, both at precheck and in receipts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Precheck accepted the transaction for consensus.
    Ok,
    /// Consensus reached and the transaction was applied.
    Success,
    /// Receipt not yet available.
    Unknown,
    InvalidSignature,
    InsufficientPayerBalance,
    InsufficientTxFee,
    DuplicateTransaction,
    PayerAccountNotFound,
    InvalidTransactionBody,
    InvalidAccountId,
    InvalidTokenId,
    InvalidTopicId,
    TokenMaxSupplyReached,
    TokenHasNoSupplyKey,
    TokenNotAssociatedToAccount,
    TokenAlreadyAssociatedToAccount,
    InsufficientTokenBalance,
    InsufficientAccountBalance,
}

impl Status {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Success => "SUCCESS",
            Status::Unknown => "UNKNOWN",
            Status::InvalidSignature => "INVALID_SIGNATURE",
            Status::InsufficientPayerBalance => "INSUFFICIENT_PAYER_BALANCE",
            Status::InsufficientTxFee => "INSUFFICIENT_TX_FEE",
            Status::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            Status::PayerAccountNotFound => "PAYER_ACCOUNT_NOT_FOUND",
            Status::InvalidTransactionBody => "INVALID_TRANSACTION_BODY",
            Status::InvalidAccountId => "INVALID_ACCOUNT_ID",
            Status::InvalidTokenId => "INVALID_TOKEN_ID",
            Status::InvalidTopicId => "INVALID_TOPIC_ID",
            Status::TokenMaxSupplyReached => "TOKEN_MAX_SUPPLY_REACHED",
            Status::TokenHasNoSupplyKey => "TOKEN_HAS_NO_SUPPLY_KEY",
            Status::TokenNotAssociatedToAccount => "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT",
            Status::TokenAlreadyAssociatedToAccount => "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
            Status::InsufficientTokenBalance => "INSUFFICIENT_TOKEN_BALANCE",
            Status::InsufficientAccountBalance => "INSUFFICIENT_ACCOUNT_BALANCE",
        }
    }

    /// Whether the transaction was applied.
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    /// Whether a receipt carrying this status is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Unknown | Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finality record of a submitted transaction.
///
/// A receipt with a non-success status is a successful resolution: the
/// transaction reached consensus and the ledger declined to apply it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_id: TransactionId,
    pub status: Status,
    /// Account created by an account-create transaction.
    pub account_id: Option<AccountId>,
    /// Token created by a token-create transaction.
    pub token_id: Option<TokenId>,
    /// Topic created by a topic-create transaction.
    pub topic_id: Option<TopicId>,
    /// Sequence number assigned to a submitted topic message.
    pub topic_sequence_number: Option<u64>,
    /// Token supply after a create or mint.
    pub total_supply: Option<u64>,
}

impl Receipt {
    /// A receipt with `status` and no created entities.
    pub fn new(transaction_id: TransactionId, status: Status) -> Self {
        Self {
            transaction_id,
            status,
            account_id: None,
            token_id: None,
            topic_id: None,
            topic_sequence_number: None,
            total_supply: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names_match_serde() {
        for status in [
            Status::Success,
            Status::TokenMaxSupplyReached,
            Status::TokenAlreadyAssociatedToAccount,
            Status::InsufficientPayerBalance,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!Status::Unknown.is_terminal());
        assert!(!Status::Ok.is_terminal());
        assert!(Status::Success.is_terminal());
        assert!(Status::TokenMaxSupplyReached.is_terminal());
        assert!(!Status::TokenMaxSupplyReached.is_success());
    }
}
