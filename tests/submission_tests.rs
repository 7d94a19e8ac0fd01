#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::Duration;

use ledger_harness::config::HarnessConfig;
use ledger_harness::keys::{build_threshold, Signer, SigningPolicy};
use ledger_harness::network::{LedgerConfig, SimulatedLedger};
use ledger_harness::runtime::{
    simulated_harness, simulated_harness_with, ResolverConfig, ScenarioHarness, SubmissionResolver,
};
use ledger_harness::transaction::{
    AccountCreate, PayerContext, SupplyType, TokenCreate, TokenMint, TopicCreate,
    TopicMessageSubmit, Transfer,
};
use ledger_harness::types::{AccountId, Hbar, TokenId, TopicId};
use ledger_harness::{Actor, HarnessError, SignerRegistry, Status};

fn fast_config() -> HarnessConfig {
    HarnessConfig {
        receipt_timeout: Duration::from_millis(500),
        receipt_poll_interval: Duration::from_millis(5),
        ..HarnessConfig::default()
    }
}

async fn setup() -> (Arc<SimulatedLedger>, ScenarioHarness) {
    simulated_harness_with(LedgerConfig::default(), fast_config(), 2, Hbar::from_hbars(100))
        .await
        .unwrap()
}

/// Threshold topic owned by account0, returning its id and submit policy.
async fn threshold_topic(harness: &ScenarioHarness) -> (TopicId, SigningPolicy) {
    let a = harness.registry().nth(0).unwrap().signer.clone();
    let b = harness.registry().nth(1).unwrap().signer.clone();
    let policy = build_threshold(&[a, b], 2).unwrap();

    let mut draft = TopicCreate::new().submit_key(&policy).build().unwrap();
    let receipt = harness.execute(&mut draft, &[]).await.unwrap();
    (receipt.topic_id.unwrap(), policy)
}

fn hbar_transfer(from: AccountId, to: AccountId, hbars: i64) -> Transfer {
    Transfer::new()
        .hbar(from, Hbar::from_hbars(-hbars))
        .hbar(to, Hbar::from_hbars(hbars))
}

#[tokio::test]
async fn test_under_signed_submit_never_reaches_network() {
    let (ledger, harness) = setup().await;
    let (topic_id, policy) = threshold_topic(&harness).await;
    let member = harness.registry().nth(0).unwrap().signer.clone();

    let mut draft = TopicMessageSubmit::new(topic_id, "one of two").build().unwrap();
    let frozen = draft
        .freeze(&harness.payer())
        .unwrap()
        .sign_with(&policy, &member);

    let calls_before = ledger.execute_calls();
    let result = harness.resolver().submit(&frozen).await;

    assert!(matches!(
        result,
        Err(HarnessError::InsufficientSignatures {
            required: 2,
            provided: 1
        })
    ));
    assert_eq!(ledger.execute_calls(), calls_before);
}

#[tokio::test]
async fn test_required_policy_with_no_signatures_fails_fast() {
    let (ledger, harness) = setup().await;
    let (topic_id, policy) = threshold_topic(&harness).await;

    let mut draft = TopicMessageSubmit::new(topic_id, "zero of two").build().unwrap();
    let frozen = draft.freeze(&harness.payer()).unwrap().require_policy(&policy);

    let calls_before = ledger.execute_calls();
    let result = harness.resolver().submit(&frozen).await;

    assert!(matches!(
        result,
        Err(HarnessError::InsufficientSignatures {
            required: 2,
            provided: 0
        })
    ));
    assert_eq!(ledger.execute_calls(), calls_before);
}

#[tokio::test]
async fn test_same_payload_is_never_resubmitted() {
    let (ledger, harness) = setup().await;
    let account0 = harness.registry().nth(0).unwrap().account_id;
    let operator = harness.operator().account_id;

    let mut draft = hbar_transfer(operator, account0, 1).build().unwrap();
    let frozen = draft.freeze(&harness.payer()).unwrap();

    let receipt = harness.resolver().submit(&frozen).await.unwrap();
    assert_eq!(receipt.status, Status::Success);
    let calls = ledger.execute_calls();

    let again = harness.resolver().submit(&frozen).await;
    assert!(matches!(again, Err(HarnessError::DuplicateSubmission { .. })));
    assert_eq!(ledger.execute_calls(), calls);
}

#[tokio::test]
async fn test_expired_submissions_are_forgotten() {
    let (ledger, harness) = setup().await;
    let resolver = SubmissionResolver::new(
        ledger.clone(),
        ResolverConfig {
            receipt_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(5),
            duplicate_window: Duration::ZERO,
        },
    );
    let account0 = harness.registry().nth(0).unwrap().account_id;
    let operator = harness.operator().account_id;

    // 1. Valid starts are backdated, so a zero window expires each id at once
    let mut first = hbar_transfer(operator, account0, 1).build().unwrap();
    let first = first.freeze(&harness.payer()).unwrap();
    resolver.submit(&first).await.unwrap();
    let mut second = hbar_transfer(operator, account0, 1).build().unwrap();
    let second = second.freeze(&harness.payer()).unwrap();
    resolver.submit(&second).await.unwrap();
    assert_eq!(resolver.tracked_submissions(), 1);

    // 2. A forgotten id goes out again and the ledger refuses it
    let calls = ledger.execute_calls();
    let result = resolver.submit(&first).await;
    assert!(matches!(
        result,
        Err(HarnessError::Rejected {
            reason: Status::DuplicateTransaction,
            ..
        })
    ));
    assert_eq!(ledger.execute_calls(), calls + 1);
}

#[tokio::test]
async fn test_timeout_after_send_is_ambiguous_and_reconcilable() {
    let (ledger, harness) = setup().await;
    let account0 = harness.registry().nth(0).unwrap().account_id;
    let operator = harness.operator().account_id;
    let before = harness.query().balance(account0).await.unwrap();

    ledger.inject_submit_timeout(1);
    let mut draft = hbar_transfer(operator, account0, 5).build().unwrap();
    let frozen = draft.freeze(&harness.payer()).unwrap();

    // 1. Outcome unknown at the submit point
    let result = harness.resolver().submit(&frozen).await;
    assert!(matches!(result, Err(HarnessError::AmbiguousOutcome { .. })));
    // Two provisioning calls plus this one
    assert_eq!(ledger.execute_calls(), 3);

    // 2. Reconcile through a fresh receipt query
    let receipt = harness
        .resolver()
        .resolve_receipt(frozen.transaction_id())
        .await
        .unwrap();
    assert_eq!(receipt.status, Status::Success);

    let after = harness.query().balance(account0).await.unwrap();
    assert_eq!(after, before.checked_add(Hbar::from_hbars(5)).unwrap());
}

#[tokio::test]
async fn test_unavailable_node_applies_nothing() {
    let (ledger, harness) = setup().await;
    let account0 = harness.registry().nth(0).unwrap().account_id;
    let operator = harness.operator().account_id;
    let before = harness.query().balance(account0).await.unwrap();

    ledger.inject_unavailable(1);
    let mut draft = hbar_transfer(operator, account0, 5).build().unwrap();
    let result = harness.execute(&mut draft, &[]).await;

    assert!(matches!(result, Err(HarnessError::Network { .. })));
    assert_eq!(harness.query().balance(account0).await.unwrap(), before);
}

#[tokio::test]
async fn test_precheck_failures_are_rejected() {
    let (_ledger, harness) = setup().await;
    let operator = harness.operator().account_id;

    // Unknown payer
    let stranger = Signer::generate();
    let ghost = PayerContext::new(AccountId::from_num(9999), SigningPolicy::single(stranger));
    let mut draft = hbar_transfer(operator, AccountId::from_num(9999), 1)
        .build()
        .unwrap();
    let result = harness.execute_as(&mut draft, &ghost, &[]).await;
    assert!(matches!(
        result,
        Err(HarnessError::Rejected {
            reason: Status::PayerAccountNotFound,
            ..
        })
    ));

    // Empty account as payer
    let broke_key = Signer::generate();
    let mut create = AccountCreate::new(&broke_key).build().unwrap();
    let receipt = harness.execute(&mut create, &[]).await.unwrap();
    let broke = PayerContext::new(receipt.account_id.unwrap(), SigningPolicy::single(broke_key));

    let mut draft = TokenMint::new(TokenId::from_num(1), 1)
        .build()
        .unwrap();
    let result = harness.execute_as(&mut draft, &broke, &[]).await;
    assert!(matches!(
        result,
        Err(HarnessError::Rejected {
            reason: Status::InsufficientPayerBalance,
            ..
        })
    ));

    // Fee ceiling below the ledger's fee
    let mut draft = TokenMint::new(TokenId::from_num(1), 1)
        .build()
        .unwrap();
    draft.set_max_transaction_fee(Hbar::from_tinybars(1));
    let result = harness.execute(&mut draft, &[]).await;
    assert!(matches!(
        result,
        Err(HarnessError::Rejected {
            reason: Status::InsufficientTxFee,
            ..
        })
    ));
}

#[tokio::test]
async fn test_business_failure_is_a_receipt_not_an_error() {
    let (_ledger, harness) = setup().await;
    let operator = harness.operator();

    let mut create = TokenCreate::new("Capped", "CAP")
        .supply_type(SupplyType::Finite)
        .initial_supply(100)
        .max_supply(100)
        .treasury(operator.account_id)
        .supply_key(operator.public_key())
        .build()
        .unwrap();
    let token_id = harness
        .execute(&mut create, &[])
        .await
        .unwrap()
        .token_id
        .unwrap();

    let mut mint = TokenMint::new(token_id, 1).build().unwrap();
    let receipt = harness.execute(&mut mint, &[]).await.unwrap();
    assert_eq!(receipt.status, Status::TokenMaxSupplyReached);

    let info = harness.query().token_info(token_id).await.unwrap();
    assert_eq!(info.total_supply, 100);
}

#[tokio::test]
async fn test_receipt_lag_is_polled_through() {
    let ledger_config = LedgerConfig {
        receipt_lag_polls: 3,
        ..LedgerConfig::default()
    };
    let (_ledger, harness) =
        simulated_harness_with(ledger_config, fast_config(), 1, Hbar::from_hbars(10))
            .await
            .unwrap();

    let account0 = harness.registry().nth(0).unwrap().account_id;
    let mut draft = hbar_transfer(harness.operator().account_id, account0, 1)
        .build()
        .unwrap();
    let receipt = harness.execute(&mut draft, &[]).await.unwrap();
    assert_eq!(receipt.status, Status::Success);
}

#[tokio::test]
async fn test_receipt_never_final_is_ambiguous() {
    let ledger_config = LedgerConfig {
        receipt_lag_polls: 1_000_000,
        ..LedgerConfig::default()
    };
    let ledger = Arc::new(SimulatedLedger::new(ledger_config));
    let operator = Signer::generate();
    ledger.create_genesis_account(
        AccountId::from_num(2),
        operator.public_key().into(),
        Hbar::from_hbars(1000),
    );
    let registry = SignerRegistry::new(Actor::new("operator", AccountId::from_num(2), operator));
    let harness = ScenarioHarness::new(ledger.clone(), Arc::new(registry), fast_config());

    let mut draft = TopicCreate::new().memo("slow").build().unwrap();
    let result = harness.execute(&mut draft, &[]).await;
    assert!(matches!(result, Err(HarnessError::AmbiguousOutcome { .. })));
    assert_eq!(ledger.execute_calls(), 1);
}

#[tokio::test]
async fn test_default_harness_provisions_funded_accounts() {
    let (ledger, harness) = simulated_harness(3, Hbar::from_hbars(100)).await.unwrap();

    assert_eq!(harness.registry().len(), 3);
    assert_eq!(ledger.execute_calls(), 3);
    for actor in harness.registry().accounts() {
        let balance = harness.query().balance(actor.account_id).await.unwrap();
        assert_eq!(balance, Hbar::from_hbars(100));
    }
}
