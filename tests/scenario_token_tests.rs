#![cfg(feature = "runtime")]

use std::time::Duration;

use ledger_harness::config::HarnessConfig;
use ledger_harness::network::LedgerConfig;
use ledger_harness::runtime::{simulated_harness_with, ScenarioHarness};
use ledger_harness::scenarios::{
    ActorSlot, Expectation, TokenScenario, TEST_TOKEN_DECIMALS, TEST_TOKEN_NAME,
    TEST_TOKEN_SYMBOL,
};
use ledger_harness::{Hbar, HarnessError, Status};

const MIN_HBARS: i64 = 10;

async fn harness(accounts: usize) -> ScenarioHarness {
    let config = HarnessConfig {
        receipt_timeout: Duration::from_secs(2),
        receipt_poll_interval: Duration::from_millis(5),
        ..HarnessConfig::default()
    };
    let (_ledger, harness) =
        simulated_harness_with(LedgerConfig::default(), config, accounts, Hbar::from_hbars(100))
            .await
            .unwrap();
    harness
}

#[tokio::test]
async fn test_create_and_mint_reaches_expected_supply() {
    let harness = harness(1).await;
    let mut s = TokenScenario::new(&harness);

    // 1. Create the test token with 1000 units
    s.create_token(1000).await.unwrap();
    s.assert_name(TEST_TOKEN_NAME).await.unwrap();
    s.assert_symbol(TEST_TOKEN_SYMBOL).await.unwrap();
    s.assert_decimals(TEST_TOKEN_DECIMALS).await.unwrap();
    s.assert_owned_by_operator().await.unwrap();
    s.assert_total_supply(1000).await.unwrap();

    // 2. Mint 500 more
    let receipt = s.mint(500, Expectation::Success).await.unwrap().unwrap();
    assert_eq!(receipt.total_supply, Some(1500));

    // 3. Token info reflects the new supply
    s.assert_total_supply(1500).await.unwrap();
}

#[tokio::test]
async fn test_fixed_supply_token_rejects_mint_by_status() {
    let harness = harness(1).await;
    let mut s = TokenScenario::new(&harness);

    s.create_fixed_supply_token(1_000_000).await.unwrap();
    let receipt = s
        .mint(1, Expectation::BusinessFailure)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.status, Status::TokenHasNoSupplyKey);
    s.assert_total_supply(1_000_000).await.unwrap();

    // Expecting success on a failing mint is an assertion failure
    let result = s.mint(1, Expectation::Success).await;
    assert!(matches!(result, Err(HarnessError::Assertion { step: "mint", .. })));
}

#[tokio::test]
async fn test_stored_transfer_paid_by_sender() {
    let harness = harness(2).await;
    let mut s = TokenScenario::new(&harness);
    s.given_funded_account(ActorSlot::First, 0, MIN_HBARS).await.unwrap();
    s.given_funded_account(ActorSlot::Second, 1, MIN_HBARS).await.unwrap();

    s.create_token(1000).await.unwrap();
    s.hold_tokens(ActorSlot::First, 100).await.unwrap();
    s.hold_tokens(ActorSlot::Second, 0).await.unwrap();

    s.create_transfer(ActorSlot::First, ActorSlot::Second, 10, ActorSlot::First)
        .await
        .unwrap();
    s.submit_stored(&[ActorSlot::First], Expectation::Success)
        .await
        .unwrap();

    let fee = s.assert_fee_paid().await.unwrap();
    assert_eq!(fee, LedgerConfig::default().transaction_fee);
    s.assert_token_balance(ActorSlot::First, 90).await.unwrap();
    s.assert_token_balance(ActorSlot::Second, 10).await.unwrap();
}

#[tokio::test]
async fn test_stored_transfer_paid_by_receiver() {
    let harness = harness(2).await;
    let mut s = TokenScenario::new(&harness);
    s.given_funded_account(ActorSlot::First, 0, MIN_HBARS).await.unwrap();
    s.given_funded_account(ActorSlot::Second, 1, MIN_HBARS).await.unwrap();

    s.create_token(1000).await.unwrap();
    s.hold_tokens(ActorSlot::First, 0).await.unwrap();
    s.hold_tokens(ActorSlot::Second, 50).await.unwrap();

    // Second moves tokens to first; first pays the fee
    s.create_transfer(ActorSlot::Second, ActorSlot::First, 10, ActorSlot::First)
        .await
        .unwrap();

    s.submit_stored(&[ActorSlot::Second], Expectation::Success)
        .await
        .unwrap();
    s.assert_fee_paid().await.unwrap();
    s.assert_token_balance(ActorSlot::First, 10).await.unwrap();
    s.assert_token_balance(ActorSlot::Second, 40).await.unwrap();

    // The stored transaction was consumed
    let again = s.submit_stored(&[ActorSlot::Second], Expectation::Success).await;
    assert!(matches!(
        again,
        Err(HarnessError::MissingState {
            field: "stored_transaction"
        })
    ));
}

#[tokio::test]
async fn test_stored_transfer_without_sender_signature_fails_by_status() {
    let harness = harness(2).await;
    let mut s = TokenScenario::new(&harness);
    s.given_funded_account(ActorSlot::First, 0, MIN_HBARS).await.unwrap();
    s.given_funded_account(ActorSlot::Second, 1, MIN_HBARS).await.unwrap();

    s.create_token(1000).await.unwrap();
    s.hold_tokens(ActorSlot::First, 0).await.unwrap();
    s.hold_tokens(ActorSlot::Second, 50).await.unwrap();

    s.create_transfer(ActorSlot::Second, ActorSlot::First, 10, ActorSlot::First)
        .await
        .unwrap();
    s.submit_stored(&[], Expectation::Status(Status::InvalidSignature))
        .await
        .unwrap();
    s.assert_token_balance(ActorSlot::Second, 50).await.unwrap();
}

#[tokio::test]
async fn test_multi_party_transfer() {
    let harness = harness(4).await;
    let mut s = TokenScenario::new(&harness);
    let slots = [
        ActorSlot::First,
        ActorSlot::Second,
        ActorSlot::Third,
        ActorSlot::Fourth,
    ];
    for (index, slot) in slots.iter().enumerate() {
        s.given_funded_account(*slot, index, MIN_HBARS).await.unwrap();
    }

    s.create_token(1000).await.unwrap();
    s.hold_tokens(ActorSlot::First, 100).await.unwrap();
    s.hold_tokens(ActorSlot::Second, 100).await.unwrap();
    s.hold_tokens(ActorSlot::Third, 0).await.unwrap();
    s.hold_tokens(ActorSlot::Fourth, 0).await.unwrap();

    s.create_multi_party_transfer(10, 5, 15).await.unwrap();
    s.submit_stored(&[ActorSlot::First, ActorSlot::Second], Expectation::Success)
        .await
        .unwrap();

    s.assert_token_balance(ActorSlot::First, 90).await.unwrap();
    s.assert_token_balance(ActorSlot::Second, 90).await.unwrap();
    s.assert_token_balance(ActorSlot::Third, 5).await.unwrap();
    s.assert_token_balance(ActorSlot::Fourth, 15).await.unwrap();
}

#[tokio::test]
async fn test_unbalanced_multi_party_transfer_is_malformed() {
    let harness = harness(4).await;
    let mut s = TokenScenario::new(&harness);
    let slots = [
        ActorSlot::First,
        ActorSlot::Second,
        ActorSlot::Third,
        ActorSlot::Fourth,
    ];
    for (index, slot) in slots.iter().enumerate() {
        s.given_funded_account(*slot, index, MIN_HBARS).await.unwrap();
    }
    s.create_token(1000).await.unwrap();

    let result = s.create_multi_party_transfer(10, 5, 10).await;
    assert!(matches!(result, Err(HarnessError::MalformedDraft { .. })));
    assert!(s.state.stored_transaction.is_none());
}

#[tokio::test]
async fn test_steps_require_earlier_state() {
    let harness = harness(1).await;
    let mut s = TokenScenario::new(&harness);

    let result = s.mint(10, Expectation::Success).await;
    assert!(matches!(
        result,
        Err(HarnessError::MissingState { field: "token_id" })
    ));

    let result = s.given_funded_account(ActorSlot::First, 0, 1_000).await;
    assert!(matches!(result, Err(HarnessError::Assertion { .. })));

    let result = s.given_funded_account(ActorSlot::First, 7, MIN_HBARS).await;
    assert!(result.is_err());
}
