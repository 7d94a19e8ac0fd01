//! Fungible token lifecycle operations: create, mint, associate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::keys::Key;
use crate::transaction::{validate_key, TransactionData, TransactionDraft};
use crate::types::{AccountId, TokenId};

/// Largest supported number of decimal places.
pub const MAX_TOKEN_DECIMALS: u32 = 18;

/// Whether a token's supply is capped.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyType {
    #[default]
    Infinite,
    Finite,
}

/// Create a fungible token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreate {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
    pub max_supply: Option<u64>,
    pub supply_type: SupplyType,
    pub treasury: Option<AccountId>,
    pub freeze_default: bool,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
    pub wipe_key: Option<Key>,
    pub kyc_key: Option<Key>,
    pub auto_renew_account: Option<AccountId>,
    pub memo: String,
}

impl TokenCreate {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: 0,
            initial_supply: 0,
            max_supply: None,
            supply_type: SupplyType::Infinite,
            treasury: None,
            freeze_default: false,
            admin_key: None,
            supply_key: None,
            wipe_key: None,
            kyc_key: None,
            auto_renew_account: None,
            memo: String::new(),
        }
    }

    pub fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    /// Supply minted into the treasury at creation, in the smallest unit.
    pub fn initial_supply(mut self, amount: u64) -> Self {
        self.initial_supply = amount;
        self
    }

    pub fn max_supply(mut self, amount: u64) -> Self {
        self.max_supply = Some(amount);
        self
    }

    pub fn supply_type(mut self, supply_type: SupplyType) -> Self {
        self.supply_type = supply_type;
        self
    }

    pub fn treasury(mut self, account: AccountId) -> Self {
        self.treasury = Some(account);
        self
    }

    pub fn freeze_default(mut self, frozen: bool) -> Self {
        self.freeze_default = frozen;
        self
    }

    pub fn admin_key(mut self, key: impl Into<Key>) -> Self {
        self.admin_key = Some(key.into());
        self
    }

    pub fn supply_key(mut self, key: impl Into<Key>) -> Self {
        self.supply_key = Some(key.into());
        self
    }

    pub fn wipe_key(mut self, key: impl Into<Key>) -> Self {
        self.wipe_key = Some(key.into());
        self
    }

    pub fn kyc_key(mut self, key: impl Into<Key>) -> Self {
        self.kyc_key = Some(key.into());
        self
    }

    pub fn auto_renew_account(mut self, account: AccountId) -> Self {
        self.auto_renew_account = Some(account);
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::malformed("token name must not be empty"));
        }
        if self.symbol.trim().is_empty() {
            return Err(HarnessError::malformed("token symbol must not be empty"));
        }
        if self.treasury.is_none() {
            return Err(HarnessError::malformed("token treasury is required"));
        }
        if self.decimals > MAX_TOKEN_DECIMALS {
            return Err(HarnessError::malformed(format!(
                "decimals {} exceeds {}",
                self.decimals, MAX_TOKEN_DECIMALS
            )));
        }

        match (self.supply_type, self.max_supply) {
            (SupplyType::Infinite, Some(_)) => {
                return Err(HarnessError::malformed(
                    "infinite supply tokens cannot set a max supply",
                ));
            }
            (SupplyType::Finite, None) | (SupplyType::Finite, Some(0)) => {
                return Err(HarnessError::malformed(
                    "finite supply tokens need a positive max supply",
                ));
            }
            (SupplyType::Finite, Some(max)) if self.initial_supply > max => {
                return Err(HarnessError::malformed(format!(
                    "initial supply {} exceeds max supply {}",
                    self.initial_supply, max
                )));
            }
            _ => {}
        }

        for key in [&self.admin_key, &self.supply_key, &self.wipe_key, &self.kyc_key]
            .into_iter()
            .flatten()
        {
            validate_key(key)?;
        }
        Ok(())
    }

    pub fn build(self) -> Result<TransactionDraft> {
        self.validate()?;
        Ok(TransactionDraft::new(TransactionData::TokenCreate(self)))
    }
}

/// Mint additional supply into the treasury.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMint {
    pub token_id: TokenId,
    pub amount: u64,
}

impl TokenMint {
    pub fn new(token_id: TokenId, amount: u64) -> Self {
        Self { token_id, amount }
    }

    pub fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(HarnessError::malformed("mint amount must be positive"));
        }
        Ok(())
    }

    pub fn build(self) -> Result<TransactionDraft> {
        self.validate()?;
        Ok(TransactionDraft::new(TransactionData::TokenMint(self)))
    }
}

/// Associate an account with one or more tokens so it can hold them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAssociate {
    pub account_id: AccountId,
    pub token_ids: Vec<TokenId>,
}

impl TokenAssociate {
    pub fn new(account_id: AccountId, token_ids: impl IntoIterator<Item = TokenId>) -> Self {
        Self {
            account_id,
            token_ids: token_ids.into_iter().collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_ids.is_empty() {
            return Err(HarnessError::malformed("association needs at least one token"));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = self.token_ids.iter().find(|t| !seen.insert(**t)) {
            return Err(HarnessError::malformed(format!(
                "token {} listed twice in association",
                dup
            )));
        }
        Ok(())
    }

    pub fn build(self) -> Result<TransactionDraft> {
        self.validate()?;
        Ok(TransactionDraft::new(TransactionData::TokenAssociate(self)))
    }
}
