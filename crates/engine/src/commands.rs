//! Command structs for engine operations.
//!
//! These types group parameters for write operations
//! (record/transfer/update), keeping call sites readable and avoiding long
//! argument lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{FlowKind, LoanKind};

/// Record a freestanding income/expense flow.
#[derive(Clone, Debug)]
pub struct RecordFlowCmd {
    pub user_id: String,
    pub book_id: String,
    pub date: NaiveDate,
    pub kind: FlowKind,
    pub category: String,
    pub method: Option<String>,
    pub amount_minor: i64,
    pub account_id: Option<Uuid>,
    pub eliminate: bool,
    pub counterparty: Option<String>,
    pub loan_kind: Option<LoanKind>,
    pub note: Option<String>,
}

impl RecordFlowCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        book_id: impl Into<String>,
        date: NaiveDate,
        kind: FlowKind,
        category: impl Into<String>,
        amount_minor: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            book_id: book_id.into(),
            date,
            kind,
            category: category.into(),
            method: None,
            amount_minor,
            account_id: None,
            eliminate: false,
            counterparty: None,
            loan_kind: None,
            note: None,
        }
    }

    #[must_use]
    pub fn account_id(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn eliminate(mut self, eliminate: bool) -> Self {
        self.eliminate = eliminate;
        self
    }

    /// Attach legacy-style loan metadata to the flow row itself.
    #[must_use]
    pub fn loan(mut self, kind: LoanKind, counterparty: impl Into<String>) -> Self {
        self.loan_kind = Some(kind);
        self.counterparty = Some(counterparty.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Create a transfer pair between two accounts.
#[derive(Clone, Debug)]
pub struct CreateTransferCmd {
    pub user_id: String,
    pub book_id: String,
    pub date: NaiveDate,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_minor: i64,
    pub loan_kind: Option<LoanKind>,
    pub counterparty: Option<String>,
    pub name: Option<String>,
    pub note: Option<String>,
}

impl CreateTransferCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        book_id: impl Into<String>,
        date: NaiveDate,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            book_id: book_id.into(),
            date,
            from_account_id,
            to_account_id,
            amount_minor,
            loan_kind: None,
            counterparty: None,
            name: None,
            note: None,
        }
    }

    /// Tag the transfer as a loan movement.
    #[must_use]
    pub fn loan(mut self, kind: LoanKind, counterparty: impl Into<String>) -> Self {
        self.loan_kind = Some(kind);
        self.counterparty = Some(counterparty.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Update an existing transfer pair.
///
/// Unset fields keep their current value. The engine applies the update as a
/// full unwind of the old pair followed by a full application of the merged
/// one, inside a single storage transaction.
#[derive(Clone, Debug)]
pub struct UpdateTransferCmd {
    pub transfer_id: Uuid,
    pub user_id: String,

    pub date: Option<NaiveDate>,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub amount_minor: Option<i64>,
    pub loan_kind: Option<LoanKind>,
    pub counterparty: Option<String>,
    pub name: Option<String>,
    pub note: Option<String>,
}

impl UpdateTransferCmd {
    #[must_use]
    pub fn new(transfer_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            transfer_id,
            user_id: user_id.into(),
            date: None,
            from_account_id: None,
            to_account_id: None,
            amount_minor: None,
            loan_kind: None,
            counterparty: None,
            name: None,
            note: None,
        }
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn from_account_id(mut self, account_id: Uuid) -> Self {
        self.from_account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn to_account_id(mut self, account_id: Uuid) -> Self {
        self.to_account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn loan(mut self, kind: LoanKind, counterparty: impl Into<String>) -> Self {
        self.loan_kind = Some(kind);
        self.counterparty = Some(counterparty.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
