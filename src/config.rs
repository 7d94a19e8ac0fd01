//! Harness configuration and fixture loading.
//!
//! Operator credentials come from `MY_ACCOUNT_ID` / `MY_PRIVATE_KEY`; test
//! accounts come from a JSON file of `[{ "id": ..., "privateKey": ... }]`
//! records.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::keys::{PrivateKey, Signer};
use crate::types::AccountId;

pub const ENV_OPERATOR_ID: &str = "MY_ACCOUNT_ID";
pub const ENV_OPERATOR_KEY: &str = "MY_PRIVATE_KEY";
pub const ENV_ACCOUNTS_FILE: &str = "HARNESS_ACCOUNTS_FILE";
pub const ENV_RECEIPT_TIMEOUT_MS: &str = "HARNESS_RECEIPT_TIMEOUT_MS";
pub const ENV_RECEIPT_POLL_MS: &str = "HARNESS_RECEIPT_POLL_MS";
pub const ENV_MESSAGE_TIMEOUT_MS: &str = "HARNESS_MESSAGE_TIMEOUT_MS";

pub const DEFAULT_ACCOUNTS_FILE: &str = "newAccounts.json";
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_RECEIPT_POLL: Duration = Duration::from_millis(250);
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// One account credential record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureAccount {
    pub id: AccountId,
    pub private_key: String,
}

impl FixtureAccount {
    pub fn new(id: AccountId, key: &PrivateKey) -> Self {
        Self {
            id,
            private_key: key.to_string_der(),
        }
    }

    /// Decode the private key into a signing capability.
    pub fn signer(&self) -> Result<Signer> {
        let key: PrivateKey = self.private_key.parse()?;
        Ok(Signer::new(key))
    }
}

/// Operator plus ordered test accounts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FixtureSet {
    pub operator: Option<FixtureAccount>,
    pub accounts: Vec<FixtureAccount>,
}

impl FixtureSet {
    /// Parse an accounts array.
    pub fn accounts_from_json(json: &str) -> Result<Vec<FixtureAccount>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the accounts array in the fixture file format.
    pub fn accounts_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.accounts)?)
    }

    /// Load the accounts file at `path`.
    pub fn load_accounts(path: &Path) -> Result<Vec<FixtureAccount>> {
        let raw = fs::read_to_string(path)?;
        let accounts = Self::accounts_from_json(&raw)?;
        debug!(path = %path.display(), count = accounts.len(), "loaded account fixtures");
        Ok(accounts)
    }

    /// Write `accounts` to `path` in the fixture file format.
    pub fn save_accounts(path: &Path, accounts: &[FixtureAccount]) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(accounts)?)?;
        debug!(path = %path.display(), count = accounts.len(), "saved account fixtures");
        Ok(())
    }
}

/// Process-level harness settings.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub fixtures: FixtureSet,
    pub accounts_file: PathBuf,
    /// Upper bound on receipt polling.
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
    /// Default bound for waiting on topic messages.
    pub message_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fixtures: FixtureSet::default(),
            accounts_file: PathBuf::from(DEFAULT_ACCOUNTS_FILE),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL,
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
        }
    }
}

impl HarnessConfig {
    /// Read configuration from the process environment.
    ///
    /// A missing accounts file is not an error; the fixture set is then empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        config.fixtures.operator = match (lookup(ENV_OPERATOR_ID), lookup(ENV_OPERATOR_KEY)) {
            (Some(id), Some(key)) => {
                let id: AccountId = id.parse()?;
                let key: PrivateKey = key.parse()?;
                Some(FixtureAccount::new(id, &key))
            }
            (None, None) => None,
            (Some(_), None) => return Err(missing(ENV_OPERATOR_KEY)),
            (None, Some(_)) => return Err(missing(ENV_OPERATOR_ID)),
        };

        if let Some(path) = lookup(ENV_ACCOUNTS_FILE) {
            config.accounts_file = PathBuf::from(path);
        }
        if config.accounts_file.exists() {
            config.fixtures.accounts = FixtureSet::load_accounts(&config.accounts_file)?;
        }

        if let Some(ms) = millis(&lookup, ENV_RECEIPT_TIMEOUT_MS)? {
            config.receipt_timeout = ms;
        }
        if let Some(ms) = millis(&lookup, ENV_RECEIPT_POLL_MS)? {
            config.receipt_poll_interval = ms;
        }
        if let Some(ms) = millis(&lookup, ENV_MESSAGE_TIMEOUT_MS)? {
            config.message_timeout = ms;
        }

        Ok(config)
    }
}

fn missing(name: &str) -> HarnessError {
    HarnessError::Config {
        reason: format!("{} is not set", name),
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| HarnessError::Config {
                    reason: format!("{}: {}", name, e),
                })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config =
            HarnessConfig::from_lookup(lookup_from(&[(ENV_ACCOUNTS_FILE, "/nonexistent.json")]))
                .unwrap();
        assert!(config.fixtures.operator.is_none());
        assert!(config.fixtures.accounts.is_empty());
        assert_eq!(config.receipt_timeout, DEFAULT_RECEIPT_TIMEOUT);
        assert_eq!(config.message_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_operator_and_timeouts_from_lookup() {
        let key = PrivateKey::generate();
        let der = key.to_string_der();
        let config = HarnessConfig::from_lookup(lookup_from(&[
            (ENV_OPERATOR_ID, "0.0.2"),
            (ENV_OPERATOR_KEY, der.as_str()),
            (ENV_ACCOUNTS_FILE, "/nonexistent.json"),
            (ENV_RECEIPT_POLL_MS, "10"),
        ]))
        .unwrap();

        let operator = config.fixtures.operator.unwrap();
        assert_eq!(operator.id, AccountId::from_num(2));
        assert_eq!(operator.signer().unwrap().public_key(), key.public_key());
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_half_configured_operator_is_error() {
        let result = HarnessConfig::from_lookup(lookup_from(&[(ENV_OPERATOR_ID, "0.0.2")]));
        assert!(matches!(result, Err(HarnessError::Config { .. })));
    }

    #[test]
    fn test_bad_millis_is_error() {
        let result = HarnessConfig::from_lookup(lookup_from(&[
            (ENV_ACCOUNTS_FILE, "/nonexistent.json"),
            (ENV_MESSAGE_TIMEOUT_MS, "soon"),
        ]));
        assert!(matches!(result, Err(HarnessError::Config { .. })));
    }

    #[test]
    fn test_accounts_json_format() {
        let json = r#"[{"id":"0.0.1001","privateKey":"302e020100300506032b657004220420aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}]"#;
        let accounts = FixtureSet::accounts_from_json(json).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, AccountId::from_num(1001));
        assert!(accounts[0].signer().is_ok());

        let set = FixtureSet {
            operator: None,
            accounts,
        };
        assert!(set.accounts_to_json().unwrap().contains("privateKey"));
    }
}
