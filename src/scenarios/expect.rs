//! Explicit expected outcomes for steps that may legitimately fail.

use crate::error::{HarnessError, Result};
use crate::receipt::{Receipt, Status};

/// What a submission is expected to produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expectation {
    /// A receipt with `SUCCESS`.
    Success,
    /// A receipt with exactly this status.
    Status(Status),
    /// A receipt with any non-success status.
    BusinessFailure,
    /// A precheck rejection with this reason.
    Rejected(Status),
    /// Refused locally for lack of signatures.
    InsufficientSignatures,
}

impl Expectation {
    /// Check `outcome` against the expectation.
    ///
    /// Returns the receipt when one was produced and expected. Any other
    /// outcome, including an unexpected error, becomes an `Assertion` error
    /// naming `step`.
    pub fn verify(&self, step: &'static str, outcome: Result<Receipt>) -> Result<Option<Receipt>> {
        match (self, outcome) {
            (Expectation::Success, Ok(receipt)) if receipt.status.is_success() => Ok(Some(receipt)),
            (Expectation::Status(expected), Ok(receipt)) if receipt.status == *expected => {
                Ok(Some(receipt))
            }
            (Expectation::BusinessFailure, Ok(receipt)) if !receipt.status.is_success() => {
                Ok(Some(receipt))
            }
            (Expectation::Rejected(expected), Err(HarnessError::Rejected { reason, .. }))
                if reason == *expected =>
            {
                Ok(None)
            }
            (Expectation::InsufficientSignatures, Err(HarnessError::InsufficientSignatures { .. })) => {
                Ok(None)
            }
            (expected, Ok(receipt)) => Err(HarnessError::assertion(
                step,
                format!("expected {:?}, got receipt {}", expected, receipt.status),
            )),
            (expected, Err(e)) => Err(HarnessError::assertion(
                step,
                format!("expected {:?}, got error: {}", expected, e),
            )),
        }
    }
}
