//! Read-only report types returned by the validator and the loan
//! consolidation operations.
//!
//! Everything here serializes cleanly so maintenance tooling can print it
//! as JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of comparing an account's cached balance against the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub account_id: Uuid,
    pub stored_minor: i64,
    pub computed_minor: i64,
    pub is_valid: bool,
}

impl BalanceCheck {
    pub(crate) fn new(account_id: Uuid, stored_minor: i64, computed_minor: i64) -> Self {
        Self {
            account_id,
            stored_minor,
            computed_minor,
            is_valid: stored_minor == computed_minor,
        }
    }
}

/// Snapshot of pending loan repair work for one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanConsistency {
    /// Loan flows with no transfer pairing (legacy records).
    pub unlinked_loan_flows: Vec<Uuid>,
    /// Loan flows already owned by a transfer.
    pub linked_loan_flows: u64,
    /// Flows whose `transfer_id` points at a transfer that no longer exists.
    pub dangling_flows: Vec<Uuid>,
    pub needs_processing: bool,
}

/// Per-flow failure recorded during bulk loan processing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanFlowError {
    pub flow_id: Uuid,
    pub reason: String,
}

/// Outcome of converting legacy unpaired loan flows into transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanProcessing {
    /// Unlinked loan flows considered.
    pub total: usize,
    /// Flows successfully folded into a transfer pair.
    pub success: usize,
    /// Flows left untouched because of an error.
    pub error: usize,
    pub errors: Vec<LoanFlowError>,
}

/// Per-transfer failure recorded during duplicate consolidation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTransferError {
    pub transfer_id: Uuid,
    pub reason: String,
}

/// Outcome of collapsing duplicate loan transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanConsolidation {
    /// Redundant transfer records removed.
    pub total_merged: usize,
    /// Canonical transfers recreated because the surviving record was broken.
    pub created_transfers: usize,
    pub errors: Vec<LoanTransferError>,
}
