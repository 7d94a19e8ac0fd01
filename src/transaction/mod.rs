//! Transaction building, freezing and signing.
//!
//! Each operation kind has a builder that validates eagerly and produces a
//! [`TransactionDraft`]. Freezing a draft binds it to a payer and yields a
//! [`FrozenTransaction`], to which signatures are added until every
//! registered key requirement is satisfied.

mod account;
mod body;
mod draft;
mod frozen;
mod token;
mod topic;
mod transfer;

pub use account::AccountCreate;
pub use body::{SignedTransaction, TransactionBody, TransactionData, TransactionKind};
pub use draft::{PayerContext, TransactionDraft, DEFAULT_MAX_TRANSACTION_FEE, DEFAULT_NODE_ACCOUNT};
pub use frozen::FrozenTransaction;
pub use token::{SupplyType, TokenAssociate, TokenCreate, TokenMint, MAX_TOKEN_DECIMALS};
pub use topic::{TopicCreate, TopicMessageSubmit, MAX_MESSAGE_BYTES, MAX_TOPIC_MEMO_BYTES};
pub use transfer::{HbarTransfer, TokenTransfer, Transfer};

use crate::error::{HarnessError, Result};
use crate::keys::Key;

/// Reject key structures that no set of signatures could ever satisfy.
pub(crate) fn validate_key(key: &Key) -> Result<()> {
    match key {
        Key::Single(_) => Ok(()),
        Key::Threshold { threshold, keys } => {
            if keys.is_empty() || *threshold == 0 || *threshold > keys.len() {
                return Err(HarnessError::malformed(format!(
                    "threshold key {} of {} can never be satisfied",
                    threshold,
                    keys.len()
                )));
            }
            keys.iter().try_for_each(validate_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{build_threshold, Signer, SigningPolicy};
    use crate::types::{AccountId, TopicId};

    fn payer() -> PayerContext {
        PayerContext::new(
            AccountId::from_num(2),
            SigningPolicy::single(Signer::generate()),
        )
    }

    #[test]
    fn test_freeze_attaches_payer_signature() {
        let mut draft = TopicCreate::new().memo("hello").build().unwrap();
        let frozen = draft.freeze(&payer()).unwrap();

        assert!(draft.is_frozen());
        assert_eq!(frozen.signature_count(), 1);
        assert!(frozen.is_signed_enough());
        assert_eq!(frozen.body().payer(), AccountId::from_num(2));
        assert_eq!(frozen.body().node_account_id, DEFAULT_NODE_ACCOUNT);
    }

    #[test]
    fn test_refreeze_fails() {
        let mut draft = TopicCreate::new().build().unwrap();
        let payer = payer();
        draft.freeze(&payer).unwrap();
        assert!(matches!(
            draft.freeze(&payer),
            Err(HarnessError::AlreadyFrozen { .. })
        ));
    }

    #[test]
    fn test_sign_shares_frozen_core() {
        let mut draft = TopicMessageSubmit::new(TopicId::from_num(5), "hi")
            .build()
            .unwrap();
        let frozen = draft.freeze(&payer()).unwrap();
        let members: Vec<Signer> = (0..2).map(|_| Signer::generate()).collect();
        let policy = build_threshold(&members, 2).unwrap();

        let partial = frozen.sign_with(&policy, &members[0]);
        assert!(partial.same_core(&frozen));
        assert_eq!(partial.signature_shortfall(), Some((2, 1)));
        assert!(frozen.is_signed_enough());

        let full = partial.sign_with(&policy, &members[1]);
        assert!(full.is_signed_enough());
        assert_eq!(full.body_bytes(), frozen.body_bytes());
    }

    #[test]
    fn test_signed_envelope_verifies() {
        let mut draft = TopicCreate::new().build().unwrap();
        let frozen = draft.freeze(&payer()).unwrap();
        let bytes = frozen.to_bytes().unwrap();

        let envelope = SignedTransaction::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.body().unwrap(), *frozen.body());
        for pair in &envelope.signatures {
            assert!(pair.public_key.verify(&envelope.body_bytes, &pair.signature));
        }
    }

    #[test]
    fn test_non_positive_fee_rejected_at_freeze() {
        let mut draft = TopicCreate::new().build().unwrap();
        draft.set_max_transaction_fee(crate::types::Hbar::ZERO);
        assert!(matches!(
            draft.freeze(&payer()),
            Err(HarnessError::MalformedDraft { .. })
        ));
        assert!(!draft.is_frozen());
    }
}
