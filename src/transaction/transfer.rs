//! Multi-leg hbar and token transfers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::transaction::{TransactionData, TransactionDraft};
use crate::types::{AccountId, Hbar, TokenId};

/// One hbar leg. Negative amounts debit the account.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HbarTransfer {
    pub account_id: AccountId,
    pub amount: Hbar,
}

/// One token leg, in the token's smallest unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub token_id: TokenId,
    pub account_id: AccountId,
    pub amount: i64,
}

/// An atomic set of balance changes.
///
/// Legs for each token, and the hbar legs, must net to zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub hbar_transfers: Vec<HbarTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
}

impl Transfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an hbar leg.
    pub fn hbar(mut self, account_id: AccountId, amount: Hbar) -> Self {
        self.hbar_transfers.push(HbarTransfer { account_id, amount });
        self
    }

    /// Add a token leg.
    pub fn token(mut self, token_id: TokenId, account_id: AccountId, amount: i64) -> Self {
        self.token_transfers.push(TokenTransfer {
            token_id,
            account_id,
            amount,
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.hbar_transfers.is_empty() && self.token_transfers.is_empty() {
            return Err(HarnessError::malformed("transfer needs at least one leg"));
        }

        let mut hbar_net: i128 = 0;
        for leg in &self.hbar_transfers {
            if leg.amount.to_tinybars() == 0 {
                return Err(HarnessError::malformed(format!(
                    "zero hbar leg for {}",
                    leg.account_id
                )));
            }
            hbar_net += i128::from(leg.amount.to_tinybars());
        }
        if hbar_net != 0 {
            return Err(HarnessError::malformed(format!(
                "hbar legs net to {} tinybars, expected 0",
                hbar_net
            )));
        }

        let mut token_net: BTreeMap<TokenId, i128> = BTreeMap::new();
        for leg in &self.token_transfers {
            if leg.amount == 0 {
                return Err(HarnessError::malformed(format!(
                    "zero leg for token {} and account {}",
                    leg.token_id, leg.account_id
                )));
            }
            *token_net.entry(leg.token_id).or_default() += i128::from(leg.amount);
        }
        if let Some((token, net)) = token_net.iter().find(|(_, net)| **net != 0) {
            return Err(HarnessError::malformed(format!(
                "legs for token {} net to {}, expected 0",
                token, net
            )));
        }

        let out_of_range = |net: &i128| i64::try_from(*net).is_err();
        if let Some((account, net)) = self
            .net_hbar_changes()
            .into_iter()
            .find(|(_, n)| out_of_range(n))
        {
            return Err(HarnessError::malformed(format!(
                "hbar legs for {} net to {} tinybars, outside the i64 range",
                account, net
            )));
        }
        if let Some(((token, account), net)) = self
            .net_token_changes()
            .into_iter()
            .find(|(_, n)| out_of_range(n))
        {
            return Err(HarnessError::malformed(format!(
                "legs for token {} and account {} net to {}, outside the i64 range",
                token, account, net
            )));
        }
        Ok(())
    }

    pub fn build(self) -> Result<TransactionDraft> {
        self.validate()?;
        Ok(TransactionDraft::new(TransactionData::Transfer(self)))
    }

    /// Accounts with at least one negative leg. Each must sign.
    pub fn debited_accounts(&self) -> BTreeSet<AccountId> {
        let hbar = self
            .hbar_transfers
            .iter()
            .filter(|l| l.amount.to_tinybars() < 0)
            .map(|l| l.account_id);
        let token = self
            .token_transfers
            .iter()
            .filter(|l| l.amount < 0)
            .map(|l| l.account_id);
        hbar.chain(token).collect()
    }

    /// Net hbar change per account, in tinybars.
    pub fn net_hbar_changes(&self) -> BTreeMap<AccountId, i128> {
        let mut net = BTreeMap::new();
        for leg in &self.hbar_transfers {
            *net.entry(leg.account_id).or_insert(0i128) += i128::from(leg.amount.to_tinybars());
        }
        net
    }

    /// Net token change per `(token, account)`.
    pub fn net_token_changes(&self) -> BTreeMap<(TokenId, AccountId), i128> {
        let mut net = BTreeMap::new();
        for leg in &self.token_transfers {
            *net.entry((leg.token_id, leg.account_id)).or_insert(0i128) += i128::from(leg.amount);
        }
        net
    }
}
