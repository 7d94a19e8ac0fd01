//! Read-only state queries. Nothing is cached; every call hits the network.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::Result;
use crate::network::{AccountBalance, AccountInfo, NetworkClient, TokenInfo, TopicInfo};
use crate::types::{AccountId, Hbar, TokenId, TopicId};

/// Snapshot of one account's holding of one token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TokenBalanceView {
    pub account_id: AccountId,
    pub token_id: TokenId,
    /// `None` when the account is not associated with the token.
    pub amount: Option<u64>,
}

impl TokenBalanceView {
    /// Amount held, treating "not associated" as zero.
    pub fn amount_or_zero(&self) -> u64 {
        self.amount.unwrap_or(0)
    }
}

/// Outcome of [`poll_until`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Polled<T> {
    /// The predicate held for this value.
    Satisfied(T),
    /// The deadline passed; carries the last value fetched.
    Expired(T),
}

impl<T> Polled<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Polled::Satisfied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Polled::Satisfied(v) | Polled::Expired(v) => v,
        }
    }
}

/// Re-run `fetch` every `interval` until `accept` holds or `timeout` passes.
///
/// Fetch errors are returned immediately.
pub async fn poll_until<T, F, Fut, A>(
    mut fetch: F,
    accept: A,
    timeout: Duration,
    interval: Duration,
) -> Result<Polled<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    A: Fn(&T) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        let value = fetch().await?;
        attempts += 1;
        if accept(&value) {
            return Ok(Polled::Satisfied(value));
        }
        if Instant::now() + interval > deadline {
            debug!(attempts, "poll deadline passed");
            return Ok(Polled::Expired(value));
        }
        sleep(interval).await;
    }
}

/// Point queries against the ledger.
#[derive(Clone)]
pub struct StateQuery {
    network: Arc<dyn NetworkClient>,
    poll_interval: Duration,
}

impl StateQuery {
    pub fn new(network: Arc<dyn NetworkClient>, poll_interval: Duration) -> Self {
        Self {
            network,
            poll_interval,
        }
    }

    /// Full balance record.
    pub async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance> {
        Ok(self.network.query_balance(account_id).await?)
    }

    /// Hbar balance.
    pub async fn balance(&self, account_id: AccountId) -> Result<Hbar> {
        Ok(self.account_balance(account_id).await?.hbars)
    }

    pub async fn token_balance(
        &self,
        account_id: AccountId,
        token_id: TokenId,
    ) -> Result<TokenBalanceView> {
        let balance = self.account_balance(account_id).await?;
        Ok(TokenBalanceView {
            account_id,
            token_id,
            amount: balance.tokens.get(&token_id).copied(),
        })
    }

    /// Whether `account_id` has a relationship with `token_id`.
    pub async fn is_associated(&self, account_id: AccountId, token_id: TokenId) -> Result<bool> {
        let info = self.account_info(account_id).await?;
        Ok(info.token_relationships.contains_key(&token_id))
    }

    pub async fn account_info(&self, account_id: AccountId) -> Result<AccountInfo> {
        Ok(self.network.query_account_info(account_id).await?)
    }

    pub async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo> {
        Ok(self.network.query_token_info(token_id).await?)
    }

    pub async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo> {
        Ok(self.network.query_topic_info(topic_id).await?)
    }

    /// Poll until the token balance equals `expected` or `timeout` passes.
    pub async fn wait_for_token_balance(
        &self,
        account_id: AccountId,
        token_id: TokenId,
        expected: u64,
        timeout: Duration,
    ) -> Result<Polled<TokenBalanceView>> {
        poll_until(
            move || self.token_balance(account_id, token_id),
            |view| view.amount == Some(expected),
            timeout,
            self.poll_interval,
        )
        .await
    }
}

impl core::fmt::Debug for StateQuery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateQuery")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
