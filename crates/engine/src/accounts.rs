//! The module contains the `Account` struct and its implementation.
//!
//! An account is a monetary bucket: a physical wallet, a bank account, a
//! card. Its `balance_minor` field is a **cache** of the sum of every flow
//! referencing the account; the balance reconciler
//! ([`Engine::recompute_balance`](crate::Engine::recompute_balance)) is the
//! authoritative definition of what the value should be. Every write path in
//! the engine either applies the exact matching delta or overwrites the
//! cache from the reconciler; no third path exists.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Cash,
    Bank,
    Card,
    Savings,
    Other,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
            Self::Card => "card",
            Self::Savings => "savings",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            "card" => Ok(Self::Card),
            "savings" => Ok(Self::Savings),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidArgument(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub kind: AccountKind,
    pub currency: Currency,
    /// Cached derived value; see the module docs.
    pub balance_minor: i64,
    /// Whether the account counts toward net-worth totals.
    pub net_worth: bool,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        name: String,
        user_id: &str,
        kind: AccountKind,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name,
            kind,
            currency,
            balance_minor: 0,
            net_worth: true,
            hidden: false,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub currency: String,
    pub balance_minor: i64,
    pub net_worth: bool,
    pub hidden: bool,
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

impl From<&Account> for ActiveModel {
    fn from(value: &Account) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            name: ActiveValue::Set(value.name.clone()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            currency: ActiveValue::Set(value.currency.code().to_string()),
            balance_minor: ActiveValue::Set(value.balance_minor),
            net_worth: ActiveValue::Set(value.net_worth),
            hidden: ActiveValue::Set(value.hidden),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            user_id: model.user_id,
            name: model.name,
            kind: AccountKind::try_from(model.kind.as_str())?,
            currency: Currency::try_from(model.currency.as_str()).unwrap_or_default(),
            balance_minor: model.balance_minor,
            net_worth: model.net_worth,
            hidden: model.hidden,
            created_at: model.created_at,
        })
    }
}
