//! Test account provisioning.
//!
//! Creates funded accounts with fresh keys through the regular
//! build, freeze, sign and submit path, and wires up a harness over the
//! simulated ledger.

use std::sync::Arc;

use tracing::info;

use crate::config::{FixtureAccount, HarnessConfig};
use crate::error::{HarnessError, Result};
use crate::keys::{Actor, Key, PrivateKey, SignerRegistry};
use crate::network::{LedgerConfig, NetworkClient, SimulatedLedger};
use crate::runtime::harness::ScenarioHarness;
use crate::transaction::AccountCreate;
use crate::types::{AccountId, Hbar};

/// Operator account installed in a fresh simulated ledger.
pub const GENESIS_ACCOUNT: AccountId = AccountId::from_num(2);

/// Starting balance of the genesis operator.
pub const GENESIS_BALANCE: Hbar = Hbar::from_hbars(1_000_000);

/// Create `count` accounts funded with `initial_balance`, paid by the
/// operator. Returns their credentials in creation order.
pub async fn provision_accounts(
    harness: &ScenarioHarness,
    count: usize,
    initial_balance: Hbar,
) -> Result<Vec<FixtureAccount>> {
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let key = PrivateKey::generate();
        let mut draft = AccountCreate::new(Key::Single(key.public_key()))
            .initial_balance(initial_balance)
            .build()?;
        let receipt = harness.execute(&mut draft, &[]).await?;
        if !receipt.status.is_success() {
            return Err(HarnessError::assertion(
                "provision_accounts",
                format!("account creation returned {}", receipt.status),
            ));
        }
        let account_id = receipt.account_id.ok_or_else(|| {
            HarnessError::assertion("provision_accounts", "receipt carries no account id")
        })?;

        info!(%account_id, %initial_balance, "provisioned account");
        created.push(FixtureAccount::new(account_id, &key));
    }
    Ok(created)
}

/// A copy of `registry` with `accounts` appended as `account{n}` actors.
pub fn register_accounts(
    registry: &SignerRegistry,
    accounts: &[FixtureAccount],
) -> Result<SignerRegistry> {
    let mut extended = registry.clone();
    for record in accounts {
        let name = format!("account{}", extended.len());
        extended.insert(Actor::new(name, record.id, record.signer()?))?;
    }
    Ok(extended)
}

/// Harness over a fresh simulated ledger with `account_count` funded
/// accounts.
pub async fn simulated_harness(
    account_count: usize,
    initial_balance: Hbar,
) -> Result<(Arc<SimulatedLedger>, ScenarioHarness)> {
    simulated_harness_with(
        LedgerConfig::default(),
        HarnessConfig::default(),
        account_count,
        initial_balance,
    )
    .await
}

/// [`simulated_harness`] with explicit ledger and harness settings. Any
/// configured fixtures are replaced by the genesis operator and the
/// provisioned accounts.
pub async fn simulated_harness_with(
    ledger_config: LedgerConfig,
    mut config: HarnessConfig,
    account_count: usize,
    initial_balance: Hbar,
) -> Result<(Arc<SimulatedLedger>, ScenarioHarness)> {
    let ledger = Arc::new(SimulatedLedger::new(ledger_config));
    let operator_key = PrivateKey::generate();
    ledger.create_genesis_account(
        GENESIS_ACCOUNT,
        Key::Single(operator_key.public_key()),
        GENESIS_BALANCE,
    );

    config.fixtures.operator = Some(FixtureAccount::new(GENESIS_ACCOUNT, &operator_key));
    config.fixtures.accounts.clear();

    let network: Arc<dyn NetworkClient> = ledger.clone();
    let harness = ScenarioHarness::from_config(network, config)?;
    let accounts = provision_accounts(&harness, account_count, initial_balance).await?;
    let registry = register_accounts(harness.registry(), &accounts)?;

    Ok((ledger, harness.with_registry(Arc::new(registry))))
}
