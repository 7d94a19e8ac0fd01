//! In-memory ledger implementing [`NetworkClient`].
//!
//! Verifies ed25519 signatures against the key structures it stores, charges
//! a flat fee, orders everything under one lock, and exposes fault injection
//! hooks so the resolver and subscription engine can be exercised against
//! timeouts, lagging receipts, duplicate deliveries and feed failures.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::keys::{Key, PublicKey};
use crate::network::{
    AccountBalance, AccountInfo, NetworkClient, NetworkError, NetworkResult, StartCursor,
    SubmitResponse, TokenInfo, TokenRelationship, TopicInfo, TopicMessage, WatchEvent,
    WatchHandle, WatchSink,
};
use crate::receipt::{Receipt, Status};
use crate::transaction::{
    AccountCreate, SignedTransaction, SupplyType, TokenAssociate, TokenCreate, TokenMint,
    TopicCreate, TopicMessageSubmit, TransactionBody, TransactionData, Transfer,
};
use crate::types::{AccountId, Hbar, Timestamp, TokenId, TopicId, TransactionId};
use crate::utils::next_running_hash;

/// Running hash length (SHA3-384).
const RUNNING_HASH_LEN: usize = 48;

/// Simulated ledger parameters.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Flat fee charged to the payer of every transaction reaching consensus.
    pub transaction_fee: Hbar,
    /// Receipt polls answered with `Unknown` before the real status appears.
    pub receipt_lag_polls: u32,
    /// First number handed out to created entities.
    pub first_entity_num: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            transaction_fee: Hbar::from_tinybars(100_000),
            receipt_lag_polls: 0,
            first_entity_num: 1001,
        }
    }
}

#[derive(Clone, Debug)]
struct SimAccount {
    key: Key,
    balance: i64,
    memo: String,
    tokens: BTreeMap<TokenId, SimRelationship>,
}

#[derive(Clone, Debug, Default)]
struct SimRelationship {
    balance: u64,
    frozen: bool,
}

#[derive(Debug)]
struct SimTopic {
    info: TopicInfo,
    messages: Vec<TopicMessage>,
}

#[derive(Debug)]
struct StoredReceipt {
    receipt: Receipt,
    polls_remaining: u32,
}

#[derive(Debug)]
struct Watch {
    topic_id: TopicId,
    sink: WatchSink,
}

#[derive(Debug, Default)]
struct Faults {
    /// Submissions that are applied but answered with a timeout.
    submit_timeouts: u32,
    /// Submissions refused before anything is applied.
    unavailable: u32,
    /// Reason for failing the next watch open.
    watch_open_failure: Option<String>,
}

#[derive(Debug)]
struct LedgerState {
    accounts: BTreeMap<AccountId, SimAccount>,
    tokens: BTreeMap<TokenId, TokenInfo>,
    topics: BTreeMap<TopicId, SimTopic>,
    receipts: HashMap<TransactionId, StoredReceipt>,
    seen_transactions: HashSet<TransactionId>,
    watches: HashMap<u64, Watch>,
    next_entity_num: u64,
    next_watch_id: u64,
    last_consensus_nanos: i64,
    faults: Faults,
}

/// In-memory ledger network.
#[derive(Debug)]
pub struct SimulatedLedger {
    config: LedgerConfig,
    state: Mutex<LedgerState>,
    execute_calls: AtomicUsize,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl SimulatedLedger {
    pub fn new(config: LedgerConfig) -> Self {
        let state = LedgerState {
            accounts: BTreeMap::new(),
            tokens: BTreeMap::new(),
            topics: BTreeMap::new(),
            receipts: HashMap::new(),
            seen_transactions: HashSet::new(),
            watches: HashMap::new(),
            next_entity_num: config.first_entity_num,
            next_watch_id: 1,
            last_consensus_nanos: 0,
            faults: Faults::default(),
        };
        Self {
            config,
            state: Mutex::new(state),
            execute_calls: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install an account directly, outside the transaction path.
    pub fn create_genesis_account(&self, account_id: AccountId, key: Key, balance: Hbar) {
        self.state().accounts.insert(
            account_id,
            SimAccount {
                key,
                balance: balance.to_tinybars(),
                memo: String::from("genesis"),
                tokens: BTreeMap::new(),
            },
        );
        info!(%account_id, %balance, "created genesis account");
    }

    /// Number of `execute_transaction` calls received.
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// Apply the next `count` submissions but answer them with a timeout.
    pub fn inject_submit_timeout(&self, count: u32) {
        self.state().faults.submit_timeouts += count;
    }

    /// Refuse the next `count` submissions before anything is applied.
    pub fn inject_unavailable(&self, count: u32) {
        self.state().faults.unavailable += count;
    }

    /// Fail the next `open_topic_watch` call.
    pub fn fail_next_watch_open(&self, reason: impl Into<String>) {
        self.state().faults.watch_open_failure = Some(reason.into());
    }

    /// Deliver message `sequence_number` of `topic_id` again to every watch.
    pub fn redeliver_message(&self, topic_id: TopicId, sequence_number: u64) -> bool {
        let mut state = self.state();
        let Some(message) = state
            .topics
            .get(&topic_id)
            .and_then(|t| t.messages.iter().find(|m| m.sequence_number == sequence_number))
            .cloned()
        else {
            return false;
        };
        debug!(%topic_id, sequence_number, "redelivering topic message");
        state.deliver(&message);
        true
    }

    /// Push an error into every watch on `topic_id` and drop those watches.
    pub fn inject_watch_error(&self, topic_id: TopicId, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.state();
        state.watches.retain(|id, watch| {
            if watch.topic_id != topic_id {
                return true;
            }
            warn!(watch_id = id, %topic_id, %reason, "failing topic watch");
            let _ = watch.sink.send(WatchEvent::Error(reason.clone()));
            false
        });
    }

    /// Number of open watches.
    pub fn active_watches(&self) -> usize {
        self.state().watches.len()
    }

    fn precheck(
        &self,
        state: &LedgerState,
        body: &TransactionBody,
        signed: &BTreeSet<PublicKey>,
    ) -> Status {
        let transaction_id = body.transaction_id;
        if state.seen_transactions.contains(&transaction_id) {
            return Status::DuplicateTransaction;
        }
        let Some(payer) = state.accounts.get(&body.payer()) else {
            return Status::PayerAccountNotFound;
        };
        if !payer.key.is_satisfied_by(signed) {
            return Status::InvalidSignature;
        }
        if body.max_transaction_fee < self.config.transaction_fee {
            return Status::InsufficientTxFee;
        }
        if payer.balance < self.config.transaction_fee.to_tinybars() {
            return Status::InsufficientPayerBalance;
        }
        Status::Ok
    }
}

/// Decode an envelope and return its body plus the set of keys whose
/// signatures verify. `None` in the set position means a bad signature.
fn open_envelope(bytes: &[u8]) -> NetworkResult<(TransactionBody, Option<BTreeSet<PublicKey>>)> {
    let envelope = SignedTransaction::from_bytes(bytes)
        .map_err(|e| NetworkError::Malformed(e.to_string()))?;
    let body = envelope
        .body()
        .map_err(|e| NetworkError::Malformed(e.to_string()))?;

    let mut signed = BTreeSet::new();
    for pair in &envelope.signatures {
        if !pair.public_key.verify(&envelope.body_bytes, &pair.signature) {
            return Ok((body, None));
        }
        signed.insert(pair.public_key);
    }
    Ok((body, Some(signed)))
}

impl LedgerState {
    fn allocate_num(&mut self) -> u64 {
        let num = self.next_entity_num;
        self.next_entity_num += 1;
        num
    }

    fn consensus_timestamp(&mut self) -> Timestamp {
        let nanos = Timestamp::now()
            .to_unix_nanos()
            .max(self.last_consensus_nanos + 1);
        self.last_consensus_nanos = nanos;
        Timestamp::from_unix_nanos(nanos)
    }

    fn key_signed(&self, account_id: &AccountId, signed: &BTreeSet<PublicKey>) -> Option<bool> {
        self.accounts
            .get(account_id)
            .map(|a| a.key.is_satisfied_by(signed))
    }

    fn apply(
        &mut self,
        body: &TransactionBody,
        signed: &BTreeSet<PublicKey>,
        consensus: Timestamp,
    ) -> Receipt {
        let mut receipt = Receipt::new(body.transaction_id, Status::Success);
        if body.data.validate().is_err() {
            receipt.status = Status::InvalidTransactionBody;
            return receipt;
        }

        let outcome = match &body.data {
            TransactionData::AccountCreate(p) => self.account_create(body.payer(), p, &mut receipt),
            TransactionData::TokenCreate(p) => self.token_create(p, signed, &mut receipt),
            TransactionData::TokenMint(p) => self.token_mint(p, signed, &mut receipt),
            TransactionData::TokenAssociate(p) => self.token_associate(p, signed),
            TransactionData::Transfer(p) => self.transfer(p, signed),
            TransactionData::TopicCreate(p) => self.topic_create(p, signed, &mut receipt),
            TransactionData::TopicMessageSubmit(p) => {
                self.topic_submit(p, signed, consensus, &mut receipt)
            }
        };
        if let Err(status) = outcome {
            receipt.status = status;
        }
        receipt
    }

    fn account_create(
        &mut self,
        payer: AccountId,
        params: &AccountCreate,
        receipt: &mut Receipt,
    ) -> Result<(), Status> {
        let initial = params.initial_balance.to_tinybars();
        let payer_account = self
            .accounts
            .get_mut(&payer)
            .ok_or(Status::PayerAccountNotFound)?;
        if payer_account.balance < initial {
            return Err(Status::InsufficientPayerBalance);
        }
        payer_account.balance -= initial;

        let account_id = AccountId::from_num(self.allocate_num());
        self.accounts.insert(
            account_id,
            SimAccount {
                key: params.key.clone(),
                balance: initial,
                memo: params.memo.clone(),
                tokens: BTreeMap::new(),
            },
        );
        receipt.account_id = Some(account_id);
        Ok(())
    }

    fn token_create(
        &mut self,
        params: &TokenCreate,
        signed: &BTreeSet<PublicKey>,
        receipt: &mut Receipt,
    ) -> Result<(), Status> {
        let treasury = params.treasury.ok_or(Status::InvalidTransactionBody)?;
        match self.key_signed(&treasury, signed) {
            None => return Err(Status::InvalidAccountId),
            Some(false) => return Err(Status::InvalidSignature),
            Some(true) => {}
        }
        if let Some(auto_renew) = &params.auto_renew_account {
            match self.key_signed(auto_renew, signed) {
                None => return Err(Status::InvalidAccountId),
                Some(false) => return Err(Status::InvalidSignature),
                Some(true) => {}
            }
        }
        if let Some(admin) = &params.admin_key {
            if !admin.is_satisfied_by(signed) {
                return Err(Status::InvalidSignature);
            }
        }

        let token_id = TokenId::from_num(self.allocate_num());
        self.tokens.insert(
            token_id,
            TokenInfo {
                token_id,
                name: params.name.clone(),
                symbol: params.symbol.clone(),
                decimals: params.decimals,
                total_supply: params.initial_supply,
                max_supply: params.max_supply,
                supply_type: params.supply_type,
                treasury_account_id: treasury,
                admin_key: params.admin_key.clone(),
                supply_key: params.supply_key.clone(),
                wipe_key: params.wipe_key.clone(),
                kyc_key: params.kyc_key.clone(),
                freeze_default: params.freeze_default,
                memo: params.memo.clone(),
            },
        );
        if let Some(account) = self.accounts.get_mut(&treasury) {
            account.tokens.insert(
                token_id,
                SimRelationship {
                    balance: params.initial_supply,
                    frozen: false,
                },
            );
        }

        receipt.token_id = Some(token_id);
        receipt.total_supply = Some(params.initial_supply);
        Ok(())
    }

    fn token_mint(
        &mut self,
        params: &TokenMint,
        signed: &BTreeSet<PublicKey>,
        receipt: &mut Receipt,
    ) -> Result<(), Status> {
        let token = self
            .tokens
            .get_mut(&params.token_id)
            .ok_or(Status::InvalidTokenId)?;
        let supply_key = token.supply_key.as_ref().ok_or(Status::TokenHasNoSupplyKey)?;
        if !supply_key.is_satisfied_by(signed) {
            return Err(Status::InvalidSignature);
        }

        let new_supply = token
            .total_supply
            .checked_add(params.amount)
            .ok_or(Status::TokenMaxSupplyReached)?;
        if token.supply_type == SupplyType::Finite
            && new_supply > token.max_supply.unwrap_or(0)
        {
            return Err(Status::TokenMaxSupplyReached);
        }
        token.total_supply = new_supply;
        let treasury = token.treasury_account_id;

        if let Some(rel) = self
            .accounts
            .get_mut(&treasury)
            .and_then(|a| a.tokens.get_mut(&params.token_id))
        {
            rel.balance += params.amount;
        }
        receipt.total_supply = Some(new_supply);
        Ok(())
    }

    fn token_associate(
        &mut self,
        params: &TokenAssociate,
        signed: &BTreeSet<PublicKey>,
    ) -> Result<(), Status> {
        match self.key_signed(&params.account_id, signed) {
            None => return Err(Status::InvalidAccountId),
            Some(false) => return Err(Status::InvalidSignature),
            Some(true) => {}
        }
        let mut frozen_defaults = Vec::with_capacity(params.token_ids.len());
        for token_id in &params.token_ids {
            let token = self.tokens.get(token_id).ok_or(Status::InvalidTokenId)?;
            frozen_defaults.push(token.freeze_default);
        }

        let account = self
            .accounts
            .get_mut(&params.account_id)
            .ok_or(Status::InvalidAccountId)?;
        if params
            .token_ids
            .iter()
            .any(|t| account.tokens.contains_key(t))
        {
            return Err(Status::TokenAlreadyAssociatedToAccount);
        }
        for (token_id, frozen) in params.token_ids.iter().zip(frozen_defaults) {
            account.tokens.insert(
                *token_id,
                SimRelationship { balance: 0, frozen },
            );
        }
        Ok(())
    }

    fn transfer(&mut self, params: &Transfer, signed: &BTreeSet<PublicKey>) -> Result<(), Status> {
        let hbar_changes = params.net_hbar_changes();
        let token_changes = params.net_token_changes();

        let involved = hbar_changes
            .keys()
            .chain(token_changes.keys().map(|(_, account)| account));
        for account_id in involved {
            if !self.accounts.contains_key(account_id) {
                return Err(Status::InvalidAccountId);
            }
        }
        for account_id in params.debited_accounts() {
            if self.key_signed(&account_id, signed) != Some(true) {
                return Err(Status::InvalidSignature);
            }
        }

        // Check every leg before touching any balance.
        let mut new_token_balances = Vec::with_capacity(token_changes.len());
        for ((token_id, account_id), change) in &token_changes {
            if !self.tokens.contains_key(token_id) {
                return Err(Status::InvalidTokenId);
            }
            let rel = self
                .accounts
                .get(account_id)
                .and_then(|a| a.tokens.get(token_id))
                .ok_or(Status::TokenNotAssociatedToAccount)?;
            let updated = i128::from(rel.balance)
                .checked_add(*change)
                .and_then(|b| u64::try_from(b).ok())
                .ok_or(Status::InsufficientTokenBalance)?;
            new_token_balances.push((*token_id, *account_id, updated));
        }
        let mut new_hbar_balances = Vec::with_capacity(hbar_changes.len());
        for (account_id, change) in &hbar_changes {
            let current = self.accounts.get(account_id).map_or(0, |a| a.balance);
            let updated = i128::from(current)
                .checked_add(*change)
                .and_then(|b| i64::try_from(b).ok())
                .filter(|b| *b >= 0)
                .ok_or(Status::InsufficientAccountBalance)?;
            new_hbar_balances.push((*account_id, updated));
        }

        for (token_id, account_id, balance) in new_token_balances {
            if let Some(rel) = self
                .accounts
                .get_mut(&account_id)
                .and_then(|a| a.tokens.get_mut(&token_id))
            {
                rel.balance = balance;
            }
        }
        for (account_id, balance) in new_hbar_balances {
            if let Some(account) = self.accounts.get_mut(&account_id) {
                account.balance = balance;
            }
        }
        Ok(())
    }

    fn topic_create(
        &mut self,
        params: &TopicCreate,
        signed: &BTreeSet<PublicKey>,
        receipt: &mut Receipt,
    ) -> Result<(), Status> {
        if let Some(admin) = &params.admin_key {
            if !admin.is_satisfied_by(signed) {
                return Err(Status::InvalidSignature);
            }
        }
        if let Some(auto_renew) = &params.auto_renew_account {
            match self.key_signed(auto_renew, signed) {
                None => return Err(Status::InvalidAccountId),
                Some(false) => return Err(Status::InvalidSignature),
                Some(true) => {}
            }
        }

        let topic_id = TopicId::from_num(self.allocate_num());
        self.topics.insert(
            topic_id,
            SimTopic {
                info: TopicInfo {
                    topic_id,
                    memo: params.memo.clone(),
                    sequence_number: 0,
                    running_hash: vec![0u8; RUNNING_HASH_LEN],
                    admin_key: params.admin_key.clone(),
                    submit_key: params.submit_key.clone(),
                    auto_renew_account: params.auto_renew_account,
                },
                messages: Vec::new(),
            },
        );
        receipt.topic_id = Some(topic_id);
        Ok(())
    }

    fn topic_submit(
        &mut self,
        params: &TopicMessageSubmit,
        signed: &BTreeSet<PublicKey>,
        consensus: Timestamp,
        receipt: &mut Receipt,
    ) -> Result<(), Status> {
        let topic = self
            .topics
            .get_mut(&params.topic_id)
            .ok_or(Status::InvalidTopicId)?;
        if let Some(submit_key) = &topic.info.submit_key {
            if !submit_key.is_satisfied_by(signed) {
                return Err(Status::InvalidSignature);
            }
        }

        let sequence_number = topic.info.sequence_number + 1;
        let running_hash = next_running_hash(
            &topic.info.running_hash,
            params.topic_id.num(),
            sequence_number,
            consensus.to_unix_nanos(),
            &params.message,
        );
        let message = TopicMessage {
            topic_id: params.topic_id,
            sequence_number,
            consensus_timestamp: consensus,
            contents: params.message.clone(),
            running_hash: running_hash.clone(),
        };
        topic.info.sequence_number = sequence_number;
        topic.info.running_hash = running_hash;
        topic.messages.push(message.clone());

        receipt.topic_sequence_number = Some(sequence_number);
        self.deliver(&message);
        Ok(())
    }

    /// Push `message` to every watch on its topic, dropping closed sinks.
    fn deliver(&mut self, message: &TopicMessage) {
        self.watches.retain(|id, watch| {
            if watch.topic_id != message.topic_id {
                return true;
            }
            let delivered = watch
                .sink
                .send(WatchEvent::Message(message.clone()))
                .is_ok();
            if !delivered {
                debug!(watch_id = id, "watch receiver gone, closing");
            }
            delivered
        });
    }
}

#[async_trait]
impl NetworkClient for SimulatedLedger {
    async fn execute_transaction(&self, signed_bytes: Vec<u8>) -> NetworkResult<SubmitResponse> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        if state.faults.unavailable > 0 {
            state.faults.unavailable -= 1;
            return Err(NetworkError::Unavailable("injected outage".into()));
        }

        let (body, signed) = open_envelope(&signed_bytes)?;
        let transaction_id = body.transaction_id;
        let Some(signed) = signed else {
            debug!(%transaction_id, "precheck failed: signature does not verify");
            return Ok(SubmitResponse {
                transaction_id,
                precheck: Status::InvalidSignature,
            });
        };

        let precheck = self.precheck(&state, &body, &signed);
        if precheck != Status::Ok {
            debug!(%transaction_id, %precheck, "precheck rejected transaction");
            return Ok(SubmitResponse {
                transaction_id,
                precheck,
            });
        }

        state.seen_transactions.insert(transaction_id);
        if let Some(payer) = state.accounts.get_mut(&body.payer()) {
            payer.balance -= self.config.transaction_fee.to_tinybars();
        }
        let consensus = state.consensus_timestamp();
        let receipt = state.apply(&body, &signed, consensus);
        debug!(
            %transaction_id,
            kind = %body.data.kind(),
            status = %receipt.status,
            "transaction reached consensus"
        );
        state.receipts.insert(
            transaction_id,
            StoredReceipt {
                receipt,
                polls_remaining: self.config.receipt_lag_polls,
            },
        );

        if state.faults.submit_timeouts > 0 {
            state.faults.submit_timeouts -= 1;
            return Err(NetworkError::Timeout);
        }
        Ok(SubmitResponse {
            transaction_id,
            precheck: Status::Ok,
        })
    }

    async fn fetch_receipt(&self, transaction_id: TransactionId) -> NetworkResult<Receipt> {
        let mut state = self.state();
        let stored = state
            .receipts
            .get_mut(&transaction_id)
            .ok_or_else(|| NetworkError::NotFound(format!("receipt for {}", transaction_id)))?;
        if stored.polls_remaining > 0 {
            stored.polls_remaining -= 1;
            return Ok(Receipt::new(transaction_id, Status::Unknown));
        }
        Ok(stored.receipt.clone())
    }

    async fn query_balance(&self, account_id: AccountId) -> NetworkResult<AccountBalance> {
        let state = self.state();
        let account = state
            .accounts
            .get(&account_id)
            .ok_or_else(|| NetworkError::NotFound(format!("account {}", account_id)))?;
        Ok(AccountBalance {
            account_id,
            hbars: Hbar::from_tinybars(account.balance),
            tokens: account
                .tokens
                .iter()
                .map(|(token_id, rel)| (*token_id, rel.balance))
                .collect(),
        })
    }

    async fn query_account_info(&self, account_id: AccountId) -> NetworkResult<AccountInfo> {
        let state = self.state();
        let account = state
            .accounts
            .get(&account_id)
            .ok_or_else(|| NetworkError::NotFound(format!("account {}", account_id)))?;

        let token_relationships = account
            .tokens
            .iter()
            .map(|(token_id, rel)| {
                let (symbol, decimals) = state
                    .tokens
                    .get(token_id)
                    .map(|t| (t.symbol.clone(), t.decimals))
                    .unwrap_or_default();
                let relationship = TokenRelationship {
                    token_id: *token_id,
                    symbol,
                    balance: rel.balance,
                    decimals,
                    frozen: rel.frozen,
                };
                (*token_id, relationship)
            })
            .collect();

        Ok(AccountInfo {
            account_id,
            key: account.key.clone(),
            balance: Hbar::from_tinybars(account.balance),
            token_relationships,
            memo: account.memo.clone(),
        })
    }

    async fn query_token_info(&self, token_id: TokenId) -> NetworkResult<TokenInfo> {
        self.state()
            .tokens
            .get(&token_id)
            .cloned()
            .ok_or_else(|| NetworkError::NotFound(format!("token {}", token_id)))
    }

    async fn query_topic_info(&self, topic_id: TopicId) -> NetworkResult<TopicInfo> {
        self.state()
            .topics
            .get(&topic_id)
            .map(|t| t.info.clone())
            .ok_or_else(|| NetworkError::NotFound(format!("topic {}", topic_id)))
    }

    async fn open_topic_watch(
        &self,
        topic_id: TopicId,
        start: StartCursor,
        sink: WatchSink,
    ) -> NetworkResult<WatchHandle> {
        let mut state = self.state();
        if let Some(reason) = state.faults.watch_open_failure.take() {
            return Err(NetworkError::Unavailable(reason));
        }
        let topic = state
            .topics
            .get(&topic_id)
            .ok_or_else(|| NetworkError::NotFound(format!("topic {}", topic_id)))?;

        for message in topic.messages.iter().filter(|m| start.admits(m)) {
            if sink.send(WatchEvent::Message(message.clone())).is_err() {
                break;
            }
        }

        let id = state.next_watch_id;
        state.next_watch_id += 1;
        state.watches.insert(id, Watch { topic_id, sink });
        debug!(watch_id = id, %topic_id, ?start, "opened topic watch");
        Ok(WatchHandle(id))
    }

    fn close_watch(&self, handle: WatchHandle) {
        if self.state().watches.remove(&handle.0).is_some() {
            debug!(watch_id = handle.0, "closed topic watch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{Signer, SigningPolicy};
    use crate::transaction::PayerContext;

    const GENESIS: AccountId = AccountId::from_num(2);

    fn ledger_with_operator() -> (SimulatedLedger, PayerContext) {
        let ledger = SimulatedLedger::default();
        let operator = Signer::generate();
        ledger.create_genesis_account(GENESIS, Key::from(&operator), Hbar::from_hbars(1_000));
        (ledger, PayerContext::new(GENESIS, SigningPolicy::single(operator)))
    }

    #[tokio::test]
    async fn test_topic_create_and_message() {
        let (ledger, payer) = ledger_with_operator();

        let mut draft = TopicCreate::new().memo("sim").build().unwrap();
        let frozen = draft.freeze(&payer).unwrap();
        let response = ledger
            .execute_transaction(frozen.to_bytes().unwrap())
            .await
            .unwrap();
        assert_eq!(response.precheck, Status::Ok);

        let receipt = ledger.fetch_receipt(frozen.transaction_id()).await.unwrap();
        assert_eq!(receipt.status, Status::Success);
        let topic_id = receipt.topic_id.unwrap();

        let mut submit = TopicMessageSubmit::new(topic_id, "hello").build().unwrap();
        let frozen = submit.freeze(&payer).unwrap();
        ledger
            .execute_transaction(frozen.to_bytes().unwrap())
            .await
            .unwrap();
        let info = ledger.query_topic_info(topic_id).await.unwrap();
        assert_eq!(info.sequence_number, 1);
        assert_ne!(info.running_hash, vec![0u8; RUNNING_HASH_LEN]);
    }

    #[tokio::test]
    async fn test_fee_charged_to_payer() {
        let (ledger, payer) = ledger_with_operator();
        let mut draft = TopicCreate::new().build().unwrap();
        let frozen = draft.freeze(&payer).unwrap();
        ledger
            .execute_transaction(frozen.to_bytes().unwrap())
            .await
            .unwrap();

        let balance = ledger.query_balance(GENESIS).await.unwrap();
        assert_eq!(
            balance.hbars,
            Hbar::from_hbars(1_000)
                .checked_sub(LedgerConfig::default().transaction_fee)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_precheck_rejects_duplicate_and_unknown_payer() {
        let (ledger, payer) = ledger_with_operator();
        let mut draft = TopicCreate::new().build().unwrap();
        let bytes = draft.freeze(&payer).unwrap().to_bytes().unwrap();

        ledger.execute_transaction(bytes.clone()).await.unwrap();
        let again = ledger.execute_transaction(bytes).await.unwrap();
        assert_eq!(again.precheck, Status::DuplicateTransaction);

        let stranger = PayerContext::new(
            AccountId::from_num(9_999),
            SigningPolicy::single(Signer::generate()),
        );
        let mut draft = TopicCreate::new().build().unwrap();
        let bytes = draft.freeze(&stranger).unwrap().to_bytes().unwrap();
        let response = ledger.execute_transaction(bytes).await.unwrap();
        assert_eq!(response.precheck, Status::PayerAccountNotFound);
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected() {
        let (ledger, payer) = ledger_with_operator();
        let mut draft = TopicCreate::new().build().unwrap();
        let mut envelope = draft.freeze(&payer).unwrap().to_signed();
        envelope.signatures[0].signature[0] ^= 0xFF;

        let response = ledger
            .execute_transaction(envelope.to_bytes().unwrap())
            .await
            .unwrap();
        assert_eq!(response.precheck, Status::InvalidSignature);
    }

    #[tokio::test]
    async fn test_receipt_lag_reports_unknown() {
        let ledger = SimulatedLedger::new(LedgerConfig {
            receipt_lag_polls: 2,
            ..LedgerConfig::default()
        });
        let operator = Signer::generate();
        ledger.create_genesis_account(GENESIS, Key::from(&operator), Hbar::from_hbars(10));
        let payer = PayerContext::new(GENESIS, SigningPolicy::single(operator));

        let mut draft = TopicCreate::new().build().unwrap();
        let frozen = draft.freeze(&payer).unwrap();
        ledger
            .execute_transaction(frozen.to_bytes().unwrap())
            .await
            .unwrap();

        let id = frozen.transaction_id();
        assert_eq!(ledger.fetch_receipt(id).await.unwrap().status, Status::Unknown);
        assert_eq!(ledger.fetch_receipt(id).await.unwrap().status, Status::Unknown);
        assert_eq!(ledger.fetch_receipt(id).await.unwrap().status, Status::Success);
    }

    #[tokio::test]
    async fn test_unavailable_applies_nothing() {
        let (ledger, payer) = ledger_with_operator();
        ledger.inject_unavailable(1);

        let mut draft = TopicCreate::new().build().unwrap();
        let frozen = draft.freeze(&payer).unwrap();
        let result = ledger.execute_transaction(frozen.to_bytes().unwrap()).await;
        assert!(matches!(result, Err(NetworkError::Unavailable(_))));
        assert!(matches!(
            ledger.fetch_receipt(frozen.transaction_id()).await,
            Err(NetworkError::NotFound(_))
        ));
    }
}
