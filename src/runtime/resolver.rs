//! Submission and finality resolution.
//!
//! One `submit` call performs at most one network submission. Nothing is
//! retried implicitly: a retry is a fresh draft, freeze, sign and submit.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, Result};
use crate::network::{NetworkClient, NetworkError};
use crate::receipt::{Receipt, Status};
use crate::transaction::FrozenTransaction;
use crate::types::{Timestamp, TransactionId};

/// How long a submitted id is remembered, measured from its valid start.
/// Covers the ledger's 120 second transaction validity window with slack.
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(180);

/// Receipt polling bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
    /// Submitted ids older than this are forgotten.
    pub duplicate_window: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            receipt_timeout: crate::config::DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: crate::config::DEFAULT_RECEIPT_POLL,
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
        }
    }
}

/// Sends signed transactions and resolves their receipts.
pub struct SubmissionResolver {
    network: Arc<dyn NetworkClient>,
    config: ResolverConfig,
    submitted: Mutex<HashSet<TransactionId>>,
}

impl SubmissionResolver {
    pub fn new(network: Arc<dyn NetworkClient>, config: ResolverConfig) -> Self {
        Self {
            network,
            config,
            submitted: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    /// Submit `transaction` and wait for its receipt.
    ///
    /// Business failures come back as `Ok(receipt)` with a non-success
    /// status. Errors:
    /// - `InsufficientSignatures` when a registered key is not satisfied
    ///   (nothing is sent);
    /// - `DuplicateSubmission` when this payload was already submitted
    ///   (nothing is sent);
    /// - `Rejected` for a precheck failure;
    /// - `AmbiguousOutcome` when the send or the receipt wait timed out;
    /// - `Network` when the node could not be reached.
    pub async fn submit(&self, transaction: &FrozenTransaction) -> Result<Receipt> {
        let transaction_id = transaction.transaction_id();

        if let Some((required, provided)) = transaction.signature_shortfall() {
            debug!(%transaction_id, required, provided, "refusing under-signed submission");
            return Err(HarnessError::InsufficientSignatures { required, provided });
        }
        let bytes = transaction.to_bytes()?;

        if !self.claim(transaction_id) {
            return Err(HarnessError::DuplicateSubmission {
                transaction_id: transaction_id.to_string(),
            });
        }

        info!(
            %transaction_id,
            kind = %transaction.body().data.kind(),
            signatures = transaction.signature_count(),
            "submitting transaction"
        );
        let response = match self.network.execute_transaction(bytes).await {
            Ok(response) => response,
            Err(NetworkError::Timeout) => {
                warn!(%transaction_id, "submission timed out, outcome unknown");
                return Err(HarnessError::AmbiguousOutcome {
                    transaction_id: transaction_id.to_string(),
                    reason: "submission timed out after send".into(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if response.precheck != Status::Ok {
            warn!(%transaction_id, status = %response.precheck, "transaction rejected at precheck");
            return Err(HarnessError::Rejected {
                transaction_id: transaction_id.to_string(),
                reason: response.precheck,
            });
        }

        self.resolve_receipt(transaction_id).await
    }

    /// Poll for the receipt of `transaction_id` until it is terminal.
    ///
    /// Also the way to reconcile an `AmbiguousOutcome`.
    pub async fn resolve_receipt(&self, transaction_id: TransactionId) -> Result<Receipt> {
        let deadline = Instant::now() + self.config.receipt_timeout;
        let mut last_error = None;

        loop {
            match self.network.fetch_receipt(transaction_id).await {
                Ok(receipt) if receipt.status.is_terminal() => {
                    info!(%transaction_id, status = %receipt.status, "receipt resolved");
                    return Ok(receipt);
                }
                Ok(_) => {}
                Err(e @ NetworkError::NotFound(_)) | Err(e @ NetworkError::Timeout) => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }

            if Instant::now() + self.config.poll_interval > deadline {
                let reason = match last_error {
                    Some(e) => format!("receipt not available: {}", e),
                    None => "receipt still pending".to_string(),
                };
                warn!(%transaction_id, %reason, "receipt wait expired");
                return Err(HarnessError::AmbiguousOutcome {
                    transaction_id: transaction_id.to_string(),
                    reason,
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Ids currently remembered for duplicate detection.
    pub fn tracked_submissions(&self) -> usize {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Record `transaction_id`, forgetting ids whose validity window has
    /// closed. False if it is still remembered.
    fn claim(&self, transaction_id: TransactionId) -> bool {
        let window = i64::try_from(self.config.duplicate_window.as_nanos()).unwrap_or(i64::MAX);
        let horizon = Timestamp::now().to_unix_nanos().saturating_sub(window);

        let mut submitted = self.submitted.lock().unwrap_or_else(PoisonError::into_inner);
        let before = submitted.len();
        submitted.retain(|id| id.valid_start.to_unix_nanos() >= horizon);
        if submitted.len() < before {
            debug!(expired = before - submitted.len(), "forgot expired submissions");
        }
        submitted.insert(transaction_id)
    }
}

impl core::fmt::Debug for SubmissionResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubmissionResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
