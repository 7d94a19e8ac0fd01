//! Scenario runner CLI.
//!
//! Runs the token and topic scenarios against a fresh simulated ledger and
//! reports each outcome.
//!
//! Usage:
//!   cargo run --bin run-scenarios -- [--scenario token|topic|all] [--write-accounts PATH]
//!
//! `HARNESS_LOG` sets the log filter (default `info`).

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use ledger_harness::config::FixtureSet;
use ledger_harness::runtime::{provision_accounts, simulated_harness, ScenarioHarness};
use ledger_harness::scenarios::{
    ActorSlot, Expectation, TokenScenario, TopicScenario, TEST_TOKEN_DECIMALS, TEST_TOKEN_NAME,
    TEST_TOKEN_SYMBOL,
};
use ledger_harness::{Hbar, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ACCOUNT_COUNT: usize = 5;
const ACCOUNT_BALANCE: Hbar = Hbar::from_hbars(100);
const MIN_HBARS: i64 = 10;

async fn token_lifecycle(harness: &ScenarioHarness) -> Result<()> {
    let mut s = TokenScenario::new(harness);
    s.given_funded_account(ActorSlot::First, 0, MIN_HBARS).await?;
    s.given_funded_account(ActorSlot::Second, 1, MIN_HBARS).await?;

    s.create_token(1000).await?;
    s.assert_name(TEST_TOKEN_NAME).await?;
    s.assert_symbol(TEST_TOKEN_SYMBOL).await?;
    s.assert_decimals(TEST_TOKEN_DECIMALS).await?;
    s.assert_owned_by_operator().await?;

    s.mint(500, Expectation::Success).await?;
    s.assert_total_supply(1500).await?;

    s.hold_tokens(ActorSlot::First, 100).await?;
    s.hold_tokens(ActorSlot::Second, 0).await?;
    s.create_transfer(ActorSlot::First, ActorSlot::Second, 10, ActorSlot::First)
        .await?;
    s.submit_stored(&[ActorSlot::First], Expectation::Success)
        .await?;
    s.assert_fee_paid().await?;
    s.assert_token_balance(ActorSlot::First, 90).await?;
    s.assert_token_balance(ActorSlot::Second, 10).await
}

async fn fixed_supply(harness: &ScenarioHarness) -> Result<()> {
    let mut s = TokenScenario::new(harness);
    s.create_fixed_supply_token(1_000_000).await?;
    s.mint(1, Expectation::BusinessFailure).await?;
    s.assert_total_supply(1_000_000).await
}

async fn multi_party_transfer(harness: &ScenarioHarness) -> Result<()> {
    let mut s = TokenScenario::new(harness);
    let slots = [
        ActorSlot::First,
        ActorSlot::Second,
        ActorSlot::Third,
        ActorSlot::Fourth,
    ];
    for (index, slot) in slots.iter().enumerate() {
        s.given_funded_account(*slot, index, MIN_HBARS).await?;
    }

    s.create_token(1000).await?;
    s.hold_tokens(ActorSlot::First, 100).await?;
    s.hold_tokens(ActorSlot::Second, 100).await?;
    s.hold_tokens(ActorSlot::Third, 0).await?;
    s.hold_tokens(ActorSlot::Fourth, 0).await?;

    s.create_multi_party_transfer(10, 5, 15).await?;
    s.submit_stored(&[ActorSlot::First, ActorSlot::Second], Expectation::Success)
        .await?;
    s.assert_token_balance(ActorSlot::First, 90).await?;
    s.assert_token_balance(ActorSlot::Second, 90).await?;
    s.assert_token_balance(ActorSlot::Third, 5).await?;
    s.assert_token_balance(ActorSlot::Fourth, 15).await
}

async fn threshold_topic(harness: &ScenarioHarness) -> Result<()> {
    let mut s = TopicScenario::new(harness);
    s.given_funded_account(ActorSlot::First, 0, MIN_HBARS).await?;
    s.given_funded_account(ActorSlot::Second, 1, MIN_HBARS).await?;

    s.threshold_key(2, 2)?;
    s.create_threshold_topic("E2E threshold topic").await?;
    s.publish(
        "Hello Future",
        &[ActorSlot::First],
        Expectation::InsufficientSignatures,
    )
    .await?;
    s.publish(
        "Hello Future",
        &[ActorSlot::First, ActorSlot::Second],
        Expectation::Success,
    )
    .await?;
    s.expect_message_default("Hello Future").await?;
    Ok(())
}

async fn single_key_topic(harness: &ScenarioHarness) -> Result<()> {
    let mut s = TopicScenario::new(harness);
    s.given_funded_account(ActorSlot::First, 0, MIN_HBARS).await?;

    s.create_topic("E2E topic").await?;
    s.publish("Hello Future", &[ActorSlot::First], Expectation::Success)
        .await?;
    s.expect_message_default("Hello Future").await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = env::var("HARNESS_LOG")
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }

    let args: Vec<String> = env::args().collect();
    let mut scenario = String::from("all");
    let mut write_accounts: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                if i + 1 < args.len() {
                    scenario = args[i + 1].clone();
                    i += 1;
                }
            }
            "--write-accounts" => {
                if i + 1 < args.len() {
                    write_accounts = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!(
                    "Usage: run-scenarios [--scenario token|topic|all] [--write-accounts PATH]"
                );
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let (_ledger, harness) = match simulated_harness(ACCOUNT_COUNT, ACCOUNT_BALANCE).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "failed to provision simulated ledger");
            std::process::exit(1);
        }
    };
    info!(actors = harness.registry().len(), "simulated ledger ready");

    if let Some(path) = write_accounts {
        let written = match provision_accounts(&harness, ACCOUNT_COUNT, ACCOUNT_BALANCE).await {
            Ok(accounts) => FixtureSet::save_accounts(&path, &accounts).map(|_| accounts.len()),
            Err(e) => Err(e),
        };
        match written {
            Ok(count) => info!(count, path = %path.display(), "wrote account fixtures"),
            Err(e) => {
                error!(error = %e, "failed to write account fixtures");
                std::process::exit(1);
            }
        }
    }

    let run_token = matches!(scenario.as_str(), "token" | "all");
    let run_topic = matches!(scenario.as_str(), "topic" | "all");
    if !run_token && !run_topic {
        eprintln!("Unknown scenario: {}", scenario);
        std::process::exit(2);
    }

    let mut results: Vec<(&str, Result<()>)> = Vec::new();
    let started = Instant::now();
    if run_token {
        results.push(("token lifecycle", token_lifecycle(&harness).await));
        results.push(("fixed supply", fixed_supply(&harness).await));
        results.push(("multi-party transfer", multi_party_transfer(&harness).await));
    }
    if run_topic {
        results.push(("single-key topic", single_key_topic(&harness).await));
        results.push(("threshold topic", threshold_topic(&harness).await));
    }

    let mut failed = 0;
    for (name, outcome) in &results {
        match outcome {
            Ok(()) => info!(scenario = *name, "PASS"),
            Err(e) => {
                failed += 1;
                error!(scenario = *name, error = %e, "FAIL");
            }
        }
    }
    info!(
        passed = results.len() - failed,
        failed,
        elapsed = ?started.elapsed(),
        "scenario run complete"
    );

    if failed > 0 {
        std::process::exit(1);
    }
}
