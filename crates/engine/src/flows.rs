//! Flow primitives.
//!
//! A [`Flow`] is one ledger entry: a single-sided money event belonging to a
//! book, optionally moving money on an account. Amounts are stored as a
//! non-negative `i64` magnitude in **minor units**; the sign of the balance
//! contribution is derived from the flow kind (income adds, expense
//! subtracts).
//!
//! A flow carrying a `transfer_id` is one half of a
//! [`Transfer`](crate::Transfer) pair. Such halves are created and destroyed
//! only together with their transfer and are flagged `eliminate` so they stay
//! out of income/expense aggregates while still affecting the balance.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, LoanKind, util::parse_uuid};

/// Category tag carried by loan flows, both legacy unpaired ones and the
/// halves of loan transfers.
pub const LOAN_CATEGORY: &str = "loan";

/// Category tag carried by the halves of a plain (non-loan) transfer.
pub const TRANSFER_CATEGORY: &str = "transfer";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Income,
    Expense,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Income => Self::Expense,
            Self::Expense => Self::Income,
        }
    }
}

impl TryFrom<&str> for FlowKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidArgument(format!(
                "invalid flow kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub user_id: String,
    pub book_id: String,
    pub date: NaiveDate,
    pub kind: FlowKind,
    pub category: String,
    pub method: Option<String>,
    /// Non-negative magnitude; see [`signed_amount_minor`](Flow::signed_amount_minor).
    pub amount_minor: i64,
    pub account_id: Option<Uuid>,
    pub transfer_id: Option<Uuid>,
    /// Excluded from income/expense aggregates, still affects the balance.
    pub eliminate: bool,
    /// Loan metadata, present on legacy unpaired loan flows. The unified
    /// transfer construct owns these fields on the transfer row instead.
    pub counterparty: Option<String>,
    pub loan_kind: Option<LoanKind>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Flow {
    /// The flow's contribution to its account balance.
    pub fn signed_amount_minor(&self) -> i64 {
        match self.kind {
            FlowKind::Income => self.amount_minor,
            FlowKind::Expense => -self.amount_minor,
        }
    }

    pub fn is_loan(&self) -> bool {
        self.category == LOAN_CATEGORY
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "flows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub date: Date,
    pub kind: String,
    pub category: String,
    pub method: Option<String>,
    pub amount_minor: i64,
    pub account_id: Option<String>,
    pub transfer_id: Option<String>,
    pub eliminate: bool,
    pub counterparty: Option<String>,
    pub loan_kind: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::books::Entity",
        from = "Column::BookId",
        to = "super::books::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Books,
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
    #[sea_orm(
        belongs_to = "super::transfers::Entity",
        from = "Column::TransferId",
        to = "super::transfers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Transfers,
}

impl Related<super::books::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Books.def()
    }
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::transfers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transfers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Flow> for ActiveModel {
    fn from(flow: &Flow) -> Self {
        Self {
            id: ActiveValue::Set(flow.id.to_string()),
            user_id: ActiveValue::Set(flow.user_id.clone()),
            book_id: ActiveValue::Set(flow.book_id.clone()),
            date: ActiveValue::Set(flow.date),
            kind: ActiveValue::Set(flow.kind.as_str().to_string()),
            category: ActiveValue::Set(flow.category.clone()),
            method: ActiveValue::Set(flow.method.clone()),
            amount_minor: ActiveValue::Set(flow.amount_minor),
            account_id: ActiveValue::Set(flow.account_id.map(|id| id.to_string())),
            transfer_id: ActiveValue::Set(flow.transfer_id.map(|id| id.to_string())),
            eliminate: ActiveValue::Set(flow.eliminate),
            counterparty: ActiveValue::Set(flow.counterparty.clone()),
            loan_kind: ActiveValue::Set(flow.loan_kind.map(|k| k.as_str().to_string())),
            note: ActiveValue::Set(flow.note.clone()),
            created_at: ActiveValue::Set(flow.created_at),
        }
    }
}

impl TryFrom<Model> for Flow {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "flow")?,
            user_id: model.user_id,
            book_id: model.book_id,
            date: model.date,
            kind: FlowKind::try_from(model.kind.as_str())?,
            category: model.category,
            method: model.method,
            amount_minor: model.amount_minor,
            account_id: model
                .account_id
                .as_deref()
                .map(|id| parse_uuid(id, "account"))
                .transpose()?,
            transfer_id: model
                .transfer_id
                .as_deref()
                .map(|id| parse_uuid(id, "transfer"))
                .transpose()?,
            eliminate: model.eliminate,
            counterparty: model.counterparty,
            loan_kind: model
                .loan_kind
                .as_deref()
                .map(LoanKind::try_from)
                .transpose()?,
            note: model.note,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn flow(kind: FlowKind, amount_minor: i64) -> Flow {
        Flow {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            book_id: Uuid::new_v4().to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            kind,
            category: "groceries".to_string(),
            method: None,
            amount_minor,
            account_id: None,
            transfer_id: None,
            eliminate: false,
            counterparty: None,
            loan_kind: None,
            note: None,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn income_contributes_positive() {
        assert_eq!(flow(FlowKind::Income, 1040).signed_amount_minor(), 1040);
    }

    #[test]
    fn expense_contributes_negative() {
        assert_eq!(flow(FlowKind::Expense, 1040).signed_amount_minor(), -1040);
    }

    #[test]
    fn loan_tag_is_category_based() {
        let mut f = flow(FlowKind::Expense, 50);
        assert!(!f.is_loan());
        f.category = LOAN_CATEGORY.to_string();
        assert!(f.is_loan());
    }
}
