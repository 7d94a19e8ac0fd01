//! Consensus topic subscriptions.
//!
//! A [`Subscription`] moves through
//! `Idle -> Subscribing -> Streaming -> (Cancelled | Errored)`. Messages are
//! de-duplicated by sequence number so each reaches the consumer exactly
//! once and in increasing order. Dropping a subscription cancels it.

use core::fmt;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, Result};
use crate::network::{NetworkClient, StartCursor, TopicMessage, WatchEvent, WatchHandle};
use crate::types::TopicId;

/// Lifecycle state of a subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Subscribing,
    Streaming,
    Cancelled,
    Errored,
}

impl SubscriptionState {
    /// Whether the subscription can never deliver again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionState::Cancelled | SubscriptionState::Errored)
    }
}

/// Result of [`Subscription::wait_for`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Matched(TopicMessage),
    TimedOut,
}

impl WaitOutcome {
    pub fn matched(self) -> Option<TopicMessage> {
        match self {
            WaitOutcome::Matched(message) => Some(message),
            WaitOutcome::TimedOut => None,
        }
    }
}

type Consumer = Box<dyn FnMut(&TopicMessage) + Send>;

/// Delivered messages kept per subscription for `wait_for` and `delivered`.
pub const DEFAULT_RETAINED_MESSAGES: usize = 1024;

/// Opens topic subscriptions over a network client.
#[derive(Clone)]
pub struct SubscriptionEngine {
    network: Arc<dyn NetworkClient>,
    retained: usize,
}

impl SubscriptionEngine {
    pub fn new(network: Arc<dyn NetworkClient>) -> Self {
        Self {
            network,
            retained: DEFAULT_RETAINED_MESSAGES,
        }
    }

    /// Keep at most `retained` delivered messages per subscription, at
    /// least one.
    pub fn with_retained_messages(mut self, retained: usize) -> Self {
        self.retained = retained.max(1);
        self
    }

    /// Open a watch on `topic_id` starting at `start`.
    ///
    /// The returned subscription is `Streaming`. A failed open returns
    /// [`HarnessError::Subscription`].
    pub async fn open(&self, topic_id: TopicId, start: StartCursor) -> Result<Subscription> {
        let mut subscription =
            Subscription::new(topic_id, Arc::clone(&self.network), start, self.retained);
        subscription.start(start).await?;
        Ok(subscription)
    }
}

impl fmt::Debug for SubscriptionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEngine")
            .field("retained", &self.retained)
            .finish_non_exhaustive()
    }
}

/// A live watch over one topic.
pub struct Subscription {
    topic_id: TopicId,
    network: Arc<dyn NetworkClient>,
    state: SubscriptionState,
    handle: Option<WatchHandle>,
    sender: Option<mpsc::UnboundedSender<WatchEvent>>,
    receiver: mpsc::UnboundedReceiver<WatchEvent>,
    /// Sequence number of the last message handed to the consumer.
    cursor: Option<u64>,
    /// Most recent delivered messages, oldest first.
    delivered: VecDeque<TopicMessage>,
    retained: usize,
    /// Sequence numbers in `delivered` already returned by `wait_for`.
    matched: BTreeSet<u64>,
    duplicates_dropped: usize,
    error: Option<String>,
    consumer: Option<Consumer>,
}

impl Subscription {
    fn new(
        topic_id: TopicId,
        network: Arc<dyn NetworkClient>,
        start: StartCursor,
        retained: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cursor = match start {
            StartCursor::AfterSequence(seq) => Some(seq),
            _ => None,
        };
        Self {
            topic_id,
            network,
            state: SubscriptionState::Idle,
            handle: None,
            sender: Some(sender),
            receiver,
            cursor,
            delivered: VecDeque::new(),
            retained: retained.max(1),
            matched: BTreeSet::new(),
            duplicates_dropped: 0,
            error: None,
            consumer: None,
        }
    }

    async fn start(&mut self, start: StartCursor) -> Result<()> {
        let Some(sender) = self.sender.take() else {
            return Err(self.subscription_error("watch already started"));
        };
        self.state = SubscriptionState::Subscribing;
        debug!(topic_id = %self.topic_id, ?start, "subscribing to topic");

        match self.network.open_topic_watch(self.topic_id, start, sender).await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = SubscriptionState::Streaming;
                info!(topic_id = %self.topic_id, "topic subscription streaming");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(topic_id = %self.topic_id, %reason, "failed to open topic watch");
                self.state = SubscriptionState::Errored;
                self.error = Some(reason.clone());
                Err(self.subscription_error(reason))
            }
        }
    }

    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Sequence number of the last delivered message.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Messages handed to the consumer, in delivery order. Only the most
    /// recent ones are retained.
    pub fn delivered(&self) -> impl Iterator<Item = &TopicMessage> + '_ {
        self.delivered.iter()
    }

    /// Redelivered messages discarded by sequence number.
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    /// Install a callback run once for every newly delivered message.
    pub fn on_message(&mut self, consumer: impl FnMut(&TopicMessage) + Send + 'static) {
        self.consumer = Some(Box::new(consumer));
    }

    /// Wait up to `timeout` for a message satisfying `predicate`.
    ///
    /// Retained messages not returned by an earlier call are checked first,
    /// oldest first. A timeout leaves the subscription streaming; a feed
    /// failure moves it to `Errored` and is returned as an error.
    pub async fn wait_for<P>(&mut self, predicate: P, timeout: Duration) -> Result<WaitOutcome>
    where
        P: Fn(&TopicMessage) -> bool,
    {
        match self.state {
            SubscriptionState::Streaming => {}
            SubscriptionState::Cancelled => {
                return Err(HarnessError::SubscriptionCancelled {
                    topic_id: self.topic_id.to_string(),
                });
            }
            SubscriptionState::Errored => {
                let reason = self.error.clone().unwrap_or_else(|| "feed failed".into());
                return Err(self.subscription_error(reason));
            }
            SubscriptionState::Idle | SubscriptionState::Subscribing => {
                return Err(self.subscription_error("subscription is not streaming"));
            }
        }

        if let Some(message) = self.scan(&predicate) {
            return Ok(WaitOutcome::Matched(message));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let event = match timeout_at(deadline, self.receiver.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    debug!(topic_id = %self.topic_id, cursor = ?self.cursor, "wait_for timed out");
                    return Ok(WaitOutcome::TimedOut);
                }
            };

            match event {
                Some(WatchEvent::Message(message)) => {
                    if self.accept(message) {
                        if let Some(found) = self.claim_latest(&predicate) {
                            return Ok(WaitOutcome::Matched(found));
                        }
                    }
                }
                Some(WatchEvent::Error(reason)) => return Err(self.fail(reason)),
                None => return Err(self.fail("topic feed closed".into())),
            }
        }
    }

    /// Stop the watch. Idempotent; also run on drop.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.network.close_watch(handle);
        }
        self.receiver.close();
        if !self.state.is_terminal() {
            self.state = SubscriptionState::Cancelled;
            info!(
                topic_id = %self.topic_id,
                delivered = self.delivered.len(),
                "topic subscription cancelled"
            );
        }
    }

    /// Oldest retained, unmatched message satisfying `predicate`.
    fn scan<P>(&mut self, predicate: &P) -> Option<TopicMessage>
    where
        P: Fn(&TopicMessage) -> bool,
    {
        let found = self
            .delivered
            .iter()
            .find(|m| !self.matched.contains(&m.sequence_number) && predicate(*m))?
            .clone();
        self.matched.insert(found.sequence_number);
        Some(found)
    }

    /// The newest message, if it satisfies `predicate`.
    fn claim_latest<P>(&mut self, predicate: &P) -> Option<TopicMessage>
    where
        P: Fn(&TopicMessage) -> bool,
    {
        let latest = self.delivered.back().filter(|m| predicate(*m))?.clone();
        self.matched.insert(latest.sequence_number);
        Some(latest)
    }

    /// Record a message unless its sequence number was already delivered.
    fn accept(&mut self, message: TopicMessage) -> bool {
        if self.cursor.is_some_and(|c| message.sequence_number <= c) {
            self.duplicates_dropped += 1;
            debug!(
                topic_id = %self.topic_id,
                sequence_number = message.sequence_number,
                "dropping redelivered topic message"
            );
            return false;
        }

        self.cursor = Some(message.sequence_number);
        debug!(
            topic_id = %self.topic_id,
            sequence_number = message.sequence_number,
            "topic message delivered"
        );
        if let Some(consumer) = self.consumer.as_mut() {
            consumer(&message);
        }
        self.delivered.push_back(message);
        while self.delivered.len() > self.retained {
            if let Some(evicted) = self.delivered.pop_front() {
                self.matched.remove(&evicted.sequence_number);
            }
        }
        true
    }

    fn fail(&mut self, reason: String) -> HarnessError {
        warn!(topic_id = %self.topic_id, %reason, "topic subscription errored");
        if let Some(handle) = self.handle.take() {
            self.network.close_watch(handle);
        }
        self.state = SubscriptionState::Errored;
        self.error = Some(reason.clone());
        self.subscription_error(reason)
    }

    fn subscription_error(&self, reason: impl Into<String>) -> HarnessError {
        HarnessError::Subscription {
            topic_id: self.topic_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
        debug!(topic_id = %self.topic_id, "subscription dropped");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic_id", &self.topic_id)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("delivered", &self.delivered.len())
            .field("duplicates_dropped", &self.duplicates_dropped)
            .finish_non_exhaustive()
    }
}
