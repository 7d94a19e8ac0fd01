//! Mutable transaction drafts and the freeze step.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::keys::{Actor, SigningPolicy};
use crate::transaction::{FrozenTransaction, TransactionBody, TransactionData, TransactionKind};
use crate::types::{AccountId, Hbar, TransactionId};

/// Fee ceiling applied when the caller sets none.
pub const DEFAULT_MAX_TRANSACTION_FEE: Hbar = Hbar::from_hbars(2);

/// Node that receives transactions unless the payer context says otherwise.
pub const DEFAULT_NODE_ACCOUNT: AccountId = AccountId::from_num(3);

static NEXT_DRAFT_ID: AtomicU64 = AtomicU64::new(1);

/// Fee-paying context bound into a transaction at freeze time.
#[derive(Clone, Debug)]
pub struct PayerContext {
    pub account_id: AccountId,
    /// Policy guarding the payer account; its signatures are attached on freeze.
    pub policy: SigningPolicy,
    pub node_account_id: AccountId,
}

impl PayerContext {
    pub fn new(account_id: AccountId, policy: SigningPolicy) -> Self {
        Self {
            account_id,
            policy,
            node_account_id: DEFAULT_NODE_ACCOUNT,
        }
    }

    /// Payer context for a single-key actor.
    pub fn for_actor(actor: &Actor) -> Self {
        Self::new(actor.account_id, actor.policy())
    }

    pub fn with_node(mut self, node_account_id: AccountId) -> Self {
        self.node_account_id = node_account_id;
        self
    }
}

/// An in-progress, not yet frozen, ledger operation.
#[derive(Clone, Debug)]
pub struct TransactionDraft {
    id: u64,
    data: TransactionData,
    memo: String,
    max_transaction_fee: Hbar,
    frozen: bool,
}

impl TransactionDraft {
    pub(crate) fn new(data: TransactionData) -> Self {
        Self {
            id: NEXT_DRAFT_ID.fetch_add(1, Ordering::Relaxed),
            data,
            memo: String::new(),
            max_transaction_fee: DEFAULT_MAX_TRANSACTION_FEE,
            frozen: false,
        }
    }

    /// Process-unique draft number.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.data.kind()
    }

    pub fn data(&self) -> &TransactionData {
        &self.data
    }

    /// Mutable access to the parameters. Changes made after freezing do not
    /// reach the frozen transaction.
    pub fn data_mut(&mut self) -> &mut TransactionData {
        &mut self.data
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn max_transaction_fee(&self) -> Hbar {
        self.max_transaction_fee
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_memo(&mut self, memo: impl Into<String>) -> &mut Self {
        self.memo = memo.into();
        self
    }

    pub fn set_max_transaction_fee(&mut self, fee: Hbar) -> &mut Self {
        self.max_transaction_fee = fee;
        self
    }

    /// Snapshot the draft into an immutable transaction paid by `payer`.
    ///
    /// Assigns a fresh transaction id, serializes the body and attaches the
    /// payer's signatures. Local only. A draft freezes at most once.
    pub fn freeze(&mut self, payer: &PayerContext) -> Result<FrozenTransaction> {
        if self.frozen {
            return Err(HarnessError::AlreadyFrozen { draft_id: self.id });
        }
        self.data.validate()?;
        if self.max_transaction_fee.to_tinybars() <= 0 {
            return Err(HarnessError::malformed("max transaction fee must be positive"));
        }

        let body = TransactionBody {
            transaction_id: TransactionId::generate(payer.account_id),
            node_account_id: payer.node_account_id,
            max_transaction_fee: self.max_transaction_fee,
            memo: self.memo.clone(),
            data: self.data.clone(),
        };
        let frozen = FrozenTransaction::new(body, &payer.policy)?;
        self.frozen = true;

        debug!(
            draft_id = self.id,
            kind = %self.kind(),
            transaction_id = %frozen.transaction_id(),
            "froze transaction draft"
        );
        Ok(frozen)
    }
}
