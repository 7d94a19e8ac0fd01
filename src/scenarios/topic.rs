//! Consensus topic scenario steps.
//!
//! The first account pays for, administers and auto-renews every topic
//! created here.

use std::time::Duration;

use tracing::info;

use crate::error::{HarnessError, Result};
use crate::keys::{build_threshold, SigningPolicy};
use crate::network::{StartCursor, TopicMessage};
use crate::receipt::Receipt;
use crate::runtime::{ScenarioHarness, WaitOutcome};
use crate::scenarios::{load_funded_actor, ActorSlot, Expectation, ScenarioState};
use crate::transaction::{PayerContext, TopicCreate, TopicMessageSubmit};
use crate::types::TopicId;

/// Drives one topic scenario against a harness.
pub struct TopicScenario<'h> {
    harness: &'h ScenarioHarness,
    pub state: ScenarioState,
}

impl<'h> TopicScenario<'h> {
    pub fn new(harness: &'h ScenarioHarness) -> Self {
        Self {
            harness,
            state: ScenarioState::new(),
        }
    }

    pub fn into_state(self) -> ScenarioState {
        self.state
    }

    pub async fn given_funded_account(
        &mut self,
        slot: ActorSlot,
        index: usize,
        min_hbars: i64,
    ) -> Result<()> {
        load_funded_actor(self.harness, &mut self.state, slot, index, min_hbars).await?;
        Ok(())
    }

    /// Build a `threshold`-of-`members` policy over the first and second
    /// accounts.
    pub fn threshold_key(&mut self, threshold: usize, members: usize) -> Result<()> {
        let signers = [
            self.state.actor(ActorSlot::First)?.signer.clone(),
            self.state.actor(ActorSlot::Second)?.signer.clone(),
        ];
        if members != signers.len() {
            return Err(HarnessError::assertion(
                "threshold_key",
                format!("expected {} members, have {}", members, signers.len()),
            ));
        }
        let policy = build_threshold(&signers, threshold)?;
        info!(threshold, members, "built threshold key");
        self.state.threshold_policy = Some(policy);
        Ok(())
    }

    /// Create a topic whose submit key is the first account's key.
    pub async fn create_topic(&mut self, memo: &str) -> Result<TopicId> {
        let policy = self.state.actor(ActorSlot::First)?.policy();
        self.create_with_submit_policy(memo, policy).await
    }

    /// Create a topic whose submit key is the threshold policy.
    pub async fn create_threshold_topic(&mut self, memo: &str) -> Result<TopicId> {
        let policy = self.state.threshold_policy()?.clone();
        self.create_with_submit_policy(memo, policy).await
    }

    async fn create_with_submit_policy(
        &mut self,
        memo: &str,
        submit_policy: SigningPolicy,
    ) -> Result<TopicId> {
        let first = self.state.actor(ActorSlot::First)?.clone();
        let mut draft = TopicCreate::new()
            .memo(memo)
            .admin_key(first.public_key())
            .submit_key(&submit_policy)
            .auto_renew_account(first.account_id)
            .build()?;

        let outcome = self
            .harness
            .execute_as(&mut draft, &PayerContext::for_actor(&first), &[])
            .await;
        let receipt = Expectation::Success
            .verify("create_topic", outcome)?
            .ok_or_else(|| HarnessError::assertion("create_topic", "no receipt"))?;
        let topic_id = receipt
            .topic_id
            .ok_or_else(|| HarnessError::assertion("create_topic", "receipt carries no topic id"))?;

        info!(%topic_id, memo, "topic created");
        self.state.topic_id = Some(topic_id);
        self.state.submit_policy = Some(submit_policy);
        self.state.last_receipt = Some(receipt);
        Ok(topic_id)
    }

    /// Publish `message` paid by the first account, attaching one submit-key
    /// signature per actor in `signers`.
    pub async fn publish(
        &mut self,
        message: &str,
        signers: &[ActorSlot],
        expect: Expectation,
    ) -> Result<Option<Receipt>> {
        let topic_id = self.state.topic_id()?;
        let first = self.state.actor(ActorSlot::First)?.clone();
        let submit_policy = self.state.submit_policy()?;

        let mut draft = TopicMessageSubmit::new(topic_id, message).build()?;
        let mut frozen = draft
            .freeze(&PayerContext::for_actor(&first))?
            .require_policy(submit_policy);
        for slot in signers {
            frozen = frozen.sign_with(submit_policy, &self.state.actor(*slot)?.signer);
        }

        let outcome = self.harness.resolver().submit(&frozen).await;
        let receipt = expect.verify("publish", outcome)?;
        if let Some(r) = &receipt {
            info!(%topic_id, sequence = ?r.topic_sequence_number, "message published");
            self.state.last_receipt = Some(r.clone());
        }
        Ok(receipt)
    }

    /// Open a subscription on the scenario topic, replacing any open one.
    pub async fn subscribe(&mut self, start: StartCursor) -> Result<()> {
        let topic_id = self.state.topic_id()?;
        let subscription = self.harness.subscribe(topic_id, start).await?;
        self.state.subscription = Some(subscription);
        Ok(())
    }

    /// Wait for a message whose contents equal `expected`, subscribing from
    /// the beginning of the topic if no subscription is open.
    ///
    /// The subscription is cancelled once the message is seen. Not seeing it
    /// within `timeout` is an assertion failure.
    pub async fn expect_message(
        &mut self,
        expected: &str,
        timeout: Duration,
    ) -> Result<TopicMessage> {
        if self.state.subscription.is_none() {
            self.subscribe(StartCursor::Beginning).await?;
        }

        let subscription = self.state.subscription_mut()?;
        let outcome = subscription
            .wait_for(|m| m.contents.as_slice() == expected.as_bytes(), timeout)
            .await?;
        let received: Vec<String> = subscription
            .delivered()
            .map(TopicMessage::contents_utf8)
            .collect();
        self.state.received_messages = received;

        match outcome {
            WaitOutcome::Matched(message) => {
                info!(
                    topic_id = %message.topic_id,
                    sequence = message.sequence_number,
                    "observed expected message"
                );
                if let Some(mut subscription) = self.state.subscription.take() {
                    subscription.cancel();
                }
                Ok(message)
            }
            WaitOutcome::TimedOut => Err(HarnessError::assertion(
                "expect_message",
                format!(
                    "{:?} not observed within {:?}; received {:?}",
                    expected, timeout, self.state.received_messages
                ),
            )),
        }
    }

    /// [`Self::expect_message`] with the configured message timeout.
    pub async fn expect_message_default(&mut self, expected: &str) -> Result<TopicMessage> {
        let timeout = self.harness.config().message_timeout;
        self.expect_message(expected, timeout).await
    }
}
