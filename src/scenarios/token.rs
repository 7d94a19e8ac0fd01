//! Fungible token scenario steps.
//!
//! The operator is treasury and holds the admin, supply, wipe and KYC keys of
//! every token created here.

use std::time::Duration;

use tracing::info;

use crate::error::{HarnessError, Result};
use crate::network::TokenInfo;
use crate::receipt::Receipt;
use crate::runtime::{Polled, ScenarioHarness};
use crate::scenarios::{load_funded_actor, ActorSlot, Expectation, ScenarioState};
use crate::transaction::{
    PayerContext, SupplyType, TokenAssociate, TokenCreate, TokenMint, Transfer,
};
use crate::types::{Hbar, TokenId};

pub const TEST_TOKEN_NAME: &str = "Test Token";
pub const TEST_TOKEN_SYMBOL: &str = "HTT";
pub const TEST_TOKEN_DECIMALS: u32 = 2;

/// Drives one token scenario against a harness.
pub struct TokenScenario<'h> {
    harness: &'h ScenarioHarness,
    pub state: ScenarioState,
}

impl<'h> TokenScenario<'h> {
    pub fn new(harness: &'h ScenarioHarness) -> Self {
        Self {
            harness,
            state: ScenarioState::new(),
        }
    }

    pub fn into_state(self) -> ScenarioState {
        self.state
    }

    /// Given registry account `index` holds more than `min_hbars`, bind it
    /// to `slot`.
    pub async fn given_funded_account(
        &mut self,
        slot: ActorSlot,
        index: usize,
        min_hbars: i64,
    ) -> Result<()> {
        load_funded_actor(self.harness, &mut self.state, slot, index, min_hbars).await?;
        Ok(())
    }

    fn test_token(&self, initial_supply: u64) -> TokenCreate {
        let operator = self.harness.operator();
        TokenCreate::new(TEST_TOKEN_NAME, TEST_TOKEN_SYMBOL)
            .decimals(TEST_TOKEN_DECIMALS)
            .initial_supply(initial_supply)
            .treasury(operator.account_id)
            .freeze_default(false)
    }

    /// Create the infinite-supply test token with `initial_supply` units.
    pub async fn create_token(&mut self, initial_supply: u64) -> Result<TokenId> {
        let operator = self.harness.operator();
        let key = operator.public_key();
        let mut draft = self
            .test_token(initial_supply)
            .supply_type(SupplyType::Infinite)
            .admin_key(key)
            .supply_key(key)
            .wipe_key(key)
            .kyc_key(key)
            .auto_renew_account(operator.account_id)
            .build()?;
        let receipt = self.harness.execute(&mut draft, &[]).await?;
        self.record_token("create_token", receipt)
    }

    /// Create a finite-supply test token capped at `supply` with no supply key.
    pub async fn create_fixed_supply_token(&mut self, supply: u64) -> Result<TokenId> {
        let mut draft = self
            .test_token(supply)
            .supply_type(SupplyType::Finite)
            .max_supply(supply)
            .build()?;
        let receipt = self.harness.execute(&mut draft, &[]).await?;
        self.record_token("create_fixed_supply_token", receipt)
    }

    fn record_token(&mut self, step: &'static str, receipt: Receipt) -> Result<TokenId> {
        let receipt = Expectation::Success
            .verify(step, Ok(receipt))?
            .ok_or_else(|| HarnessError::assertion(step, "no receipt"))?;
        let token_id = receipt
            .token_id
            .ok_or_else(|| HarnessError::assertion(step, "receipt carries no token id"))?;
        info!(%token_id, "token created");
        self.state.token_id = Some(token_id);
        self.state.last_receipt = Some(receipt);
        Ok(token_id)
    }

    async fn token_info(&self) -> Result<TokenInfo> {
        self.harness.query().token_info(self.state.token_id()?).await
    }

    pub async fn assert_name(&self, expected: &str) -> Result<()> {
        let info = self.token_info().await?;
        check_eq("token_name", info.name.as_str(), expected)
    }

    pub async fn assert_symbol(&self, expected: &str) -> Result<()> {
        let info = self.token_info().await?;
        check_eq("token_symbol", info.symbol.as_str(), expected)
    }

    pub async fn assert_decimals(&self, expected: u32) -> Result<()> {
        let info = self.token_info().await?;
        check_eq("token_decimals", info.decimals, expected)
    }

    /// The operator is the token's treasury.
    pub async fn assert_owned_by_operator(&self) -> Result<()> {
        let info = self.token_info().await?;
        check_eq(
            "token_treasury",
            info.treasury_account_id,
            self.harness.operator().account_id,
        )
    }

    pub async fn assert_total_supply(&self, expected: u64) -> Result<()> {
        let info = self.token_info().await?;
        check_eq("total_supply", info.total_supply, expected)
    }

    /// Mint `amount` units, signed by the operator's supply key.
    pub async fn mint(&mut self, amount: u64, expect: Expectation) -> Result<Option<Receipt>> {
        let token_id = self.state.token_id()?;
        let mut draft = TokenMint::new(token_id, amount).build()?;
        let outcome = self.harness.execute(&mut draft, &[]).await;
        let receipt = expect.verify("mint", outcome)?;
        if let Some(r) = &receipt {
            info!(%token_id, amount, status = %r.status, "mint resolved");
            self.state.last_receipt = Some(r.clone());
        }
        Ok(receipt)
    }

    /// Associate the actor in `slot` with the token unless it already is.
    pub async fn ensure_associated(&mut self, slot: ActorSlot) -> Result<()> {
        let token_id = self.state.token_id()?;
        let actor = self.state.actor(slot)?.clone();
        if self
            .harness
            .query()
            .is_associated(actor.account_id, token_id)
            .await?
        {
            return Ok(());
        }

        let mut draft = TokenAssociate::new(actor.account_id, [token_id]).build()?;
        let outcome = self.harness.execute(&mut draft, &[&actor.policy()]).await;
        Expectation::Success.verify("associate", outcome)?;
        info!(account_id = %actor.account_id, %token_id, "associated account with token");
        Ok(())
    }

    /// Make the actor in `slot` hold exactly `amount` units, moving the
    /// difference to or from the treasury.
    pub async fn hold_tokens(&mut self, slot: ActorSlot, amount: u64) -> Result<()> {
        self.ensure_associated(slot).await?;
        let token_id = self.state.token_id()?;
        let actor = self.state.actor(slot)?.clone();
        let treasury = self.harness.operator().account_id;

        let current = self
            .harness
            .query()
            .token_balance(actor.account_id, token_id)
            .await?
            .amount_or_zero();
        let delta = i64::try_from(amount)
            .ok()
            .zip(i64::try_from(current).ok())
            .map(|(want, have)| want - have)
            .ok_or_else(|| HarnessError::assertion("hold_tokens", "token amount out of range"))?;

        if delta != 0 {
            let mut draft = Transfer::new()
                .token(token_id, treasury, -delta)
                .token(token_id, actor.account_id, delta)
                .build()?;
            let policy = actor.policy();
            let policies = if delta < 0 { vec![&policy] } else { Vec::new() };
            let outcome = self.harness.execute(&mut draft, &policies).await;
            Expectation::Success.verify("hold_tokens", outcome)?;
        }

        self.assert_token_balance(slot, amount).await
    }

    /// Freeze a `from -> to` transfer paid by `payer` and keep it for a
    /// later submit step. Only the payer's signature is attached.
    pub async fn create_transfer(
        &mut self,
        from: ActorSlot,
        to: ActorSlot,
        amount: i64,
        payer: ActorSlot,
    ) -> Result<()> {
        let token_id = self.state.token_id()?;
        let from = self.state.actor(from)?.account_id;
        let to = self.state.actor(to)?.account_id;
        let transfer = Transfer::new()
            .token(token_id, from, -amount)
            .token(token_id, to, amount);
        self.store(transfer, payer).await
    }

    /// Freeze a transfer moving `out_each` out of the first and second
    /// accounts into the third and fourth, paid by the first account.
    pub async fn create_multi_party_transfer(
        &mut self,
        out_each: i64,
        to_third: i64,
        to_fourth: i64,
    ) -> Result<()> {
        let token_id = self.state.token_id()?;
        let first = self.state.actor(ActorSlot::First)?.account_id;
        let second = self.state.actor(ActorSlot::Second)?.account_id;
        let third = self.state.actor(ActorSlot::Third)?.account_id;
        let fourth = self.state.actor(ActorSlot::Fourth)?.account_id;
        let transfer = Transfer::new()
            .token(token_id, first, -out_each)
            .token(token_id, second, -out_each)
            .token(token_id, third, to_third)
            .token(token_id, fourth, to_fourth);
        self.store(transfer, ActorSlot::First).await
    }

    async fn store(&mut self, transfer: Transfer, payer: ActorSlot) -> Result<()> {
        let payer_actor = self.state.actor(payer)?.clone();
        let mut draft = transfer.build()?;
        let frozen = draft.freeze(&PayerContext::for_actor(&payer_actor))?;
        let before = self.harness.query().balance(payer_actor.account_id).await?;

        info!(
            transaction_id = %frozen.transaction_id(),
            payer = %payer_actor.account_id,
            "stored transfer for later submission"
        );
        self.state.fee_payer_snapshot = Some((payer, before));
        self.state.stored_transaction = Some(frozen);
        Ok(())
    }

    /// Sign the stored transaction with every actor in `signers` and submit
    /// it. The stored transaction is consumed.
    pub async fn submit_stored(
        &mut self,
        signers: &[ActorSlot],
        expect: Expectation,
    ) -> Result<Option<Receipt>> {
        let mut frozen = self.state.stored_transaction()?.clone();
        for slot in signers {
            frozen = frozen.sign(&self.state.actor(*slot)?.policy());
        }
        self.state.stored_transaction = None;

        let outcome = self.harness.resolver().submit(&frozen).await;
        let receipt = expect.verify("submit_stored", outcome)?;
        if let Some(r) = &receipt {
            self.state.last_receipt = Some(r.clone());
        }
        Ok(receipt)
    }

    /// The stored transaction's payer balance dropped. Returns the amount.
    pub async fn assert_fee_paid(&self) -> Result<Hbar> {
        let (slot, before) = self.state.fee_payer_snapshot()?;
        let account_id = self.state.actor(slot)?.account_id;
        let after = self.harness.query().balance(account_id).await?;

        let paid = before.checked_sub(after).unwrap_or(Hbar::ZERO);
        if paid.to_tinybars() <= 0 {
            return Err(HarnessError::assertion(
                "fee_paid",
                format!("{} balance did not decrease ({} -> {})", account_id, before, after),
            ));
        }
        info!(%account_id, %paid, "fee payer charged");
        Ok(paid)
    }

    /// The actor in `slot` holds exactly `expected` units, allowing for
    /// propagation delay.
    pub async fn assert_token_balance(&self, slot: ActorSlot, expected: u64) -> Result<()> {
        let token_id = self.state.token_id()?;
        let account_id = self.state.actor(slot)?.account_id;
        let timeout: Duration = self.harness.config().receipt_timeout;

        match self
            .harness
            .query()
            .wait_for_token_balance(account_id, token_id, expected, timeout)
            .await?
        {
            Polled::Satisfied(_) => Ok(()),
            Polled::Expired(view) => Err(HarnessError::assertion(
                "token_balance",
                format!(
                    "{} holds {:?} of {}, expected {}",
                    account_id, view.amount, token_id, expected
                ),
            )),
        }
    }
}

fn check_eq<T>(step: &'static str, actual: T, expected: T) -> Result<()>
where
    T: PartialEq + core::fmt::Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(HarnessError::assertion(
            step,
            format!("expected {:?}, got {:?}", expected, actual),
        ))
    }
}
