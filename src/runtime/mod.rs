//! Async runtime: submission, subscriptions, queries and scenario wiring.

pub mod harness;
pub mod provision;
pub mod query;
pub mod resolver;
pub mod subscription;

pub use harness::ScenarioHarness;
pub use provision::{provision_accounts, simulated_harness, simulated_harness_with};
pub use query::{poll_until, Polled, StateQuery, TokenBalanceView};
pub use resolver::{ResolverConfig, SubmissionResolver};
pub use subscription::{Subscription, SubscriptionEngine, SubscriptionState, WaitOutcome};
