//! # Ledger Harness
//!
//! Scenario-driven verification harness for a distributed ledger's token
//! and consensus-topic services.
//!
//! The harness drives multi-party workflows end to end: it builds typed
//! transactions, collects single-key and M-of-N threshold signatures,
//! submits them, resolves their final outcome and observes topic messages.
//!
//! ## Features
//!
//! - **Signer Registry**: named actors loaded from fixture configuration
//! - **Threshold Policies**: M-of-N keys usable anywhere a single key is
//! - **Freeze and Sign**: bodies are immutable once frozen; signing is additive
//! - **Finality Resolution**: every submission ends in a receipt or a typed error
//! - **Topic Subscriptions**: ordered, deduplicated, cancellable message feeds
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledger_harness::keys::{build_threshold, Signer};
//! use ledger_harness::transaction::TopicCreate;
//!
//! let members = [Signer::generate(), Signer::generate()];
//! let policy = build_threshold(&members, 2).unwrap();
//!
//! let draft = TopicCreate::new()
//!     .memo("multi-party topic")
//!     .submit_key(&policy)
//!     .build()
//!     .unwrap();
//! assert!(!draft.is_frozen());
//! ```
//!
//! With the `runtime` feature the [`runtime`] module wires a
//! [`network::NetworkClient`] into a [`runtime::ScenarioHarness`], and the
//! [`scenarios`] module exposes the token and topic scenario steps.

pub mod config;
pub mod error;
pub mod keys;
pub mod receipt;
pub mod transaction;
pub mod types;
pub mod utils;

#[cfg(feature = "runtime")]
pub mod network;
#[cfg(feature = "runtime")]
pub mod runtime;
#[cfg(feature = "runtime")]
pub mod scenarios;

// Re-export the building blocks
pub use config::{FixtureAccount, FixtureSet, HarnessConfig};
pub use error::{HarnessError, Result};
pub use keys::{build_threshold, Actor, Key, PrivateKey, PublicKey, Signer, SignerRegistry, SigningPolicy};
pub use receipt::{Receipt, Status};
pub use transaction::{FrozenTransaction, PayerContext, TransactionDraft};
pub use types::{AccountId, Hbar, Timestamp, TokenId, TopicId, TransactionId};

#[cfg(feature = "runtime")]
pub use runtime::{ScenarioHarness, SubmissionResolver, Subscription, SubscriptionEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::transaction::{TopicCreate, TopicMessageSubmit};

    #[test]
    fn test_threshold_topic_flow_offline() {
        let payer = Actor::new("payer", AccountId::from_num(1001), Signer::generate());
        let members = [Signer::generate(), Signer::generate()];
        let policy = build_threshold(&members, 2).unwrap();

        let mut create = TopicCreate::new()
            .admin_key(payer.public_key())
            .submit_key(&policy)
            .build()
            .unwrap();
        let frozen = create.freeze(&PayerContext::for_actor(&payer)).unwrap();
        assert!(frozen.is_signed_enough());

        let mut submit = TopicMessageSubmit::new(TopicId::from_num(1002), "hello")
            .build()
            .unwrap();
        let frozen = submit.freeze(&PayerContext::for_actor(&payer)).unwrap();
        let one = frozen.sign_with(&policy, &members[0]);
        assert_eq!(one.signature_shortfall(), Some((2, 1)));

        let both = one.sign_with(&policy, &members[1]);
        assert!(both.is_signed_enough());
        assert!(both.same_core(&frozen));
    }
}
