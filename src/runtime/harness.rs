//! Wiring of the registry, resolver, subscription engine and query facade
//! around one network client.

use std::sync::Arc;

use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::keys::{Actor, SignerRegistry, SigningPolicy};
use crate::network::{NetworkClient, StartCursor};
use crate::receipt::Receipt;
use crate::runtime::query::StateQuery;
use crate::runtime::resolver::{ResolverConfig, SubmissionResolver};
use crate::runtime::subscription::{Subscription, SubscriptionEngine};
use crate::transaction::{PayerContext, TransactionDraft};
use crate::types::TopicId;

/// Everything a scenario needs to talk to one ledger.
pub struct ScenarioHarness {
    network: Arc<dyn NetworkClient>,
    registry: Arc<SignerRegistry>,
    resolver: Arc<SubmissionResolver>,
    subscriptions: SubscriptionEngine,
    query: StateQuery,
    config: HarnessConfig,
}

impl ScenarioHarness {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        registry: Arc<SignerRegistry>,
        config: HarnessConfig,
    ) -> Self {
        let resolver = SubmissionResolver::new(
            Arc::clone(&network),
            ResolverConfig {
                receipt_timeout: config.receipt_timeout,
                poll_interval: config.receipt_poll_interval,
                ..ResolverConfig::default()
            },
        );
        Self {
            subscriptions: SubscriptionEngine::new(Arc::clone(&network)),
            query: StateQuery::new(Arc::clone(&network), config.receipt_poll_interval),
            resolver: Arc::new(resolver),
            network,
            registry,
            config,
        }
    }

    /// Build the registry from the configured fixtures.
    pub fn from_config(network: Arc<dyn NetworkClient>, config: HarnessConfig) -> Result<Self> {
        let registry = SignerRegistry::from_fixtures(&config.fixtures)?;
        Ok(Self::new(network, Arc::new(registry), config))
    }

    /// Same network and resolver, different actors.
    pub fn with_registry(&self, registry: Arc<SignerRegistry>) -> Self {
        Self {
            network: Arc::clone(&self.network),
            registry,
            resolver: Arc::clone(&self.resolver),
            subscriptions: self.subscriptions.clone(),
            query: self.query.clone(),
            config: self.config.clone(),
        }
    }

    pub fn network(&self) -> &Arc<dyn NetworkClient> {
        &self.network
    }

    pub fn registry(&self) -> &SignerRegistry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<SignerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn resolver(&self) -> &SubmissionResolver {
        &self.resolver
    }

    pub fn subscriptions(&self) -> &SubscriptionEngine {
        &self.subscriptions
    }

    pub fn query(&self) -> &StateQuery {
        &self.query
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn operator(&self) -> &Actor {
        self.registry.operator()
    }

    /// The operator as fee payer.
    pub fn payer(&self) -> PayerContext {
        PayerContext::for_actor(self.registry.operator())
    }

    /// A named actor as fee payer.
    pub fn payer_for(&self, name: &str) -> Result<PayerContext> {
        Ok(PayerContext::for_actor(self.registry.actor(name)?))
    }

    /// Freeze with the operator as payer, sign with `policies`, submit.
    pub async fn execute(
        &self,
        draft: &mut TransactionDraft,
        policies: &[&SigningPolicy],
    ) -> Result<Receipt> {
        self.execute_as(draft, &self.payer(), policies).await
    }

    /// Freeze with `payer`, sign with every policy in `policies`, submit.
    pub async fn execute_as(
        &self,
        draft: &mut TransactionDraft,
        payer: &PayerContext,
        policies: &[&SigningPolicy],
    ) -> Result<Receipt> {
        let mut frozen = draft.freeze(payer)?;
        for policy in policies {
            frozen = frozen.sign(policy);
        }
        debug!(
            transaction_id = %frozen.transaction_id(),
            payer = %payer.account_id,
            policies = policies.len(),
            "executing transaction"
        );
        self.resolver.submit(&frozen).await
    }

    /// Open a subscription on `topic_id`.
    pub async fn subscribe(&self, topic_id: TopicId, start: StartCursor) -> Result<Subscription> {
        self.subscriptions.open(topic_id, start).await
    }
}

impl core::fmt::Debug for ScenarioHarness {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScenarioHarness")
            .field("operator", &self.registry.operator().account_id)
            .field("actors", &self.registry.len())
            .finish_non_exhaustive()
    }
}
