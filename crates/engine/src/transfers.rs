//! Transfer primitives.
//!
//! A [`Transfer`] is the paired construct representing money moving between
//! two accounts. It owns exactly two [`Flow`](crate::Flow) rows: one expense
//! on `from_account_id`, one income on `to_account_id`, both carrying the
//! transfer's id and the same magnitude. The pair is an aggregate: the engine
//! creates, updates and deletes the three rows as one unit, inside one
//! storage transaction.
//!
//! A transfer tagged with a [`LoanKind`] and a counterparty is a loan
//! movement; structurally it is an ordinary transfer.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanKind {
    /// Money borrowed from the counterparty.
    Borrow,
    /// Money lent to the counterparty.
    Lend,
    /// Collecting money previously lent.
    Collect,
    /// Repaying money previously borrowed.
    Repay,
}

impl LoanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borrow => "borrow",
            Self::Lend => "lend",
            Self::Collect => "collect",
            Self::Repay => "repay",
        }
    }
}

impl TryFrom<&str> for LoanKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "borrow" => Ok(Self::Borrow),
            "lend" => Ok(Self::Lend),
            "collect" => Ok(Self::Collect),
            "repay" => Ok(Self::Repay),
            other => Err(EngineError::InvalidArgument(format!(
                "invalid loan kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub user_id: String,
    /// Book the two owned flows are recorded into; kept on the aggregate root
    /// so the pair can be recreated without consulting its halves.
    pub book_id: String,
    pub date: NaiveDate,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_minor: i64,
    pub loan_kind: Option<LoanKind>,
    pub counterparty: Option<String>,
    pub name: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: &str,
        book_id: String,
        date: NaiveDate,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        loan_kind: Option<LoanKind>,
        counterparty: Option<String>,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let transfer = Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            book_id,
            date,
            from_account_id,
            to_account_id,
            amount_minor,
            loan_kind,
            counterparty,
            name: None,
            note: None,
            created_at,
        };
        transfer.validate()?;
        Ok(transfer)
    }

    /// Check the construct invariants: distinct accounts, positive amount,
    /// loan kind and counterparty present together.
    pub(crate) fn validate(&self) -> ResultEngine<()> {
        if self.from_account_id == self.to_account_id {
            return Err(EngineError::InvalidArgument(
                "from_account_id and to_account_id must differ".to_string(),
            ));
        }
        if self.amount_minor <= 0 {
            return Err(EngineError::InvalidArgument(
                "amount_minor must be > 0".to_string(),
            ));
        }
        match (&self.loan_kind, &self.counterparty) {
            (Some(_), None) => Err(EngineError::InvalidArgument(
                "a loan transfer requires a counterparty".to_string(),
            )),
            (None, Some(_)) => Err(EngineError::InvalidArgument(
                "a counterparty requires a loan kind".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn is_loan(&self) -> bool {
        self.loan_kind.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub date: Date,
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount_minor: i64,
    pub loan_kind: Option<String>,
    pub counterparty: Option<String>,
    pub name: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::flows::Entity")]
    Flows,
}

impl Related<super::flows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flows.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transfer> for ActiveModel {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: ActiveValue::Set(transfer.id.to_string()),
            user_id: ActiveValue::Set(transfer.user_id.clone()),
            book_id: ActiveValue::Set(transfer.book_id.clone()),
            date: ActiveValue::Set(transfer.date),
            from_account_id: ActiveValue::Set(transfer.from_account_id.to_string()),
            to_account_id: ActiveValue::Set(transfer.to_account_id.to_string()),
            amount_minor: ActiveValue::Set(transfer.amount_minor),
            loan_kind: ActiveValue::Set(transfer.loan_kind.map(|k| k.as_str().to_string())),
            counterparty: ActiveValue::Set(transfer.counterparty.clone()),
            name: ActiveValue::Set(transfer.name.clone()),
            note: ActiveValue::Set(transfer.note.clone()),
            created_at: ActiveValue::Set(transfer.created_at),
        }
    }
}

impl TryFrom<Model> for Transfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transfer")?,
            user_id: model.user_id,
            book_id: model.book_id,
            date: model.date,
            from_account_id: parse_uuid(&model.from_account_id, "account")?,
            to_account_id: parse_uuid(&model.to_account_id, "account")?,
            amount_minor: model.amount_minor,
            loan_kind: model
                .loan_kind
                .as_deref()
                .map(LoanKind::try_from)
                .transpose()?,
            counterparty: model.counterparty,
            name: model.name,
            note: model.note,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> (Uuid, Uuid, NaiveDate, DateTime<Utc>) {
        (
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn rejects_same_accounts() {
        let (from, _, date, now) = args();
        let err = Transfer::new("alice", "b".into(), date, from, from, 100, None, None, now)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_non_positive_amount() {
        let (from, to, date, now) = args();
        for amount in [0, -100] {
            let err = Transfer::new("alice", "b".into(), date, from, to, amount, None, None, now)
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidArgument(_)));
        }
    }

    #[test]
    fn loan_kind_and_counterparty_come_together() {
        let (from, to, date, now) = args();
        assert!(
            Transfer::new(
                "alice",
                "b".into(),
                date,
                from,
                to,
                100,
                Some(LoanKind::Lend),
                None,
                now,
            )
            .is_err()
        );
        assert!(
            Transfer::new(
                "alice",
                "b".into(),
                date,
                from,
                to,
                100,
                None,
                Some("Bob".to_string()),
                now,
            )
            .is_err()
        );
        let transfer = Transfer::new(
            "alice",
            "b".into(),
            date,
            from,
            to,
            100,
            Some(LoanKind::Lend),
            Some("Bob".to_string()),
            now,
        )
        .unwrap();
        assert!(transfer.is_loan());
    }

    #[test]
    fn loan_kind_round_trips_through_storage_strings() {
        for kind in [
            LoanKind::Borrow,
            LoanKind::Lend,
            LoanKind::Collect,
            LoanKind::Repay,
        ] {
            assert_eq!(LoanKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(LoanKind::try_from("gift").is_err());
    }
}
