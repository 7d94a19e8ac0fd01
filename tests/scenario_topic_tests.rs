#![cfg(feature = "runtime")]

use std::time::Duration;

use ledger_harness::config::HarnessConfig;
use ledger_harness::network::{LedgerConfig, StartCursor};
use ledger_harness::runtime::{simulated_harness_with, ScenarioHarness};
use ledger_harness::scenarios::{ActorSlot, Expectation, TopicScenario};
use ledger_harness::{Hbar, HarnessError, Key, Status};

const MIN_HBARS: i64 = 10;
const OBSERVE: Duration = Duration::from_secs(5);

async fn harness() -> ScenarioHarness {
    let config = HarnessConfig {
        receipt_timeout: Duration::from_secs(2),
        receipt_poll_interval: Duration::from_millis(5),
        message_timeout: OBSERVE,
        ..HarnessConfig::default()
    };
    let (_ledger, harness) =
        simulated_harness_with(LedgerConfig::default(), config, 2, Hbar::from_hbars(100))
            .await
            .unwrap();
    harness
}

async fn two_accounts(harness: &ScenarioHarness) -> TopicScenario<'_> {
    let mut s = TopicScenario::new(harness);
    s.given_funded_account(ActorSlot::First, 0, MIN_HBARS).await.unwrap();
    s.given_funded_account(ActorSlot::Second, 1, MIN_HBARS).await.unwrap();
    s
}

#[tokio::test]
async fn test_threshold_topic_requires_both_signatures() {
    let harness = harness().await;
    let mut s = two_accounts(&harness).await;

    // 1. Topic guarded by a 2-of-2 submit key
    s.threshold_key(2, 2).unwrap();
    let topic_id = s.create_threshold_topic("E2E threshold topic").await.unwrap();
    let info = harness.query().topic_info(topic_id).await.unwrap();
    assert!(matches!(info.submit_key, Some(Key::Threshold { threshold: 2, .. })));

    // 2. One signature is refused before submission
    s.publish("Hello Future", &[ActorSlot::First], Expectation::InsufficientSignatures)
        .await
        .unwrap();
    assert_eq!(
        harness.query().topic_info(topic_id).await.unwrap().sequence_number,
        0
    );

    // 3. Both signatures succeed
    let receipt = s
        .publish(
            "Hello Future",
            &[ActorSlot::First, ActorSlot::Second],
            Expectation::Success,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.topic_sequence_number, Some(1));

    // 4. The message is observed within the bound
    let message = s.expect_message("Hello Future", OBSERVE).await.unwrap();
    assert_eq!(message.contents, b"Hello Future".to_vec());
    assert_eq!(s.state.received_messages, vec!["Hello Future".to_string()]);
    assert!(s.state.subscription.is_none());
}

#[tokio::test]
async fn test_unsigned_publish_is_refused_before_submission() {
    let config = HarnessConfig {
        receipt_poll_interval: Duration::from_millis(5),
        ..HarnessConfig::default()
    };
    let (ledger, harness) =
        simulated_harness_with(LedgerConfig::default(), config, 2, Hbar::from_hbars(100))
            .await
            .unwrap();
    let mut s = two_accounts(&harness).await;
    s.threshold_key(2, 2).unwrap();
    s.create_threshold_topic("unsigned").await.unwrap();

    let calls_before = ledger.execute_calls();
    s.publish("x", &[], Expectation::InsufficientSignatures)
        .await
        .unwrap();
    assert_eq!(ledger.execute_calls(), calls_before);
}

#[tokio::test]
async fn test_single_key_topic_round_trip() {
    let harness = harness().await;
    let mut s = two_accounts(&harness).await;

    let topic_id = s.create_topic("E2E topic").await.unwrap();
    let info = harness.query().topic_info(topic_id).await.unwrap();
    let first = s.state.actor(ActorSlot::First).unwrap().clone();
    assert_eq!(info.admin_key, Some(Key::Single(first.public_key())));
    assert_eq!(info.auto_renew_account, Some(first.account_id));
    assert_eq!(info.memo, "E2E topic");

    s.publish("Hello Future", &[ActorSlot::First], Expectation::Success)
        .await
        .unwrap();
    s.expect_message_default("Hello Future").await.unwrap();
}

#[tokio::test]
async fn test_missing_message_times_out_without_cancelling() {
    let harness = harness().await;
    let mut s = two_accounts(&harness).await;
    s.create_topic("quiet topic").await.unwrap();
    s.publish("first", &[ActorSlot::First], Expectation::Success)
        .await
        .unwrap();

    let result = s
        .expect_message("never sent", Duration::from_millis(50))
        .await;
    assert!(matches!(
        result,
        Err(HarnessError::Assertion {
            step: "expect_message",
            ..
        })
    ));
    assert_eq!(s.state.received_messages, vec!["first".to_string()]);
    assert!(s.state.subscription.is_some());

    // The open subscription still sees a later message
    s.publish("second", &[ActorSlot::First], Expectation::Success)
        .await
        .unwrap();
    s.expect_message("second", OBSERVE).await.unwrap();
}

#[tokio::test]
async fn test_subscription_from_later_cursor() {
    let harness = harness().await;
    let mut s = two_accounts(&harness).await;
    s.create_topic("cursor topic").await.unwrap();
    for message in ["old", "new"] {
        s.publish(message, &[ActorSlot::First], Expectation::Success)
            .await
            .unwrap();
    }

    s.subscribe(StartCursor::AfterSequence(1)).await.unwrap();
    s.expect_message("new", OBSERVE).await.unwrap();
    assert_eq!(s.state.received_messages, vec!["new".to_string()]);
}

#[tokio::test]
async fn test_threshold_key_needs_accounts_and_valid_size() {
    let harness = harness().await;
    let mut s = TopicScenario::new(&harness);
    assert!(matches!(
        s.threshold_key(2, 2),
        Err(HarnessError::MissingState {
            field: "first_account"
        })
    ));

    let mut s = two_accounts(&harness).await;
    assert!(matches!(
        s.threshold_key(3, 2),
        Err(HarnessError::InvalidPolicy { .. })
    ));
    assert!(matches!(
        s.threshold_key(2, 3),
        Err(HarnessError::Assertion { .. })
    ));
    assert!(matches!(
        s.create_threshold_topic("no policy").await,
        Err(HarnessError::MissingState {
            field: "threshold_policy"
        })
    ));
}

#[tokio::test]
async fn test_publish_to_unknown_topic_is_business_failure() {
    let harness = harness().await;
    let mut s = two_accounts(&harness).await;
    s.create_topic("real").await.unwrap();
    s.state.topic_id = Some(ledger_harness::TopicId::from_num(99_999));

    let receipt = s
        .publish("lost", &[ActorSlot::First], Expectation::BusinessFailure)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.status, Status::InvalidTopicId);
}
