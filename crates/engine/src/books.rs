//! The module contains the `Book` struct and its implementation.

use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{Currency, EngineError};

/// A book.
///
/// A book is the container users record flows into: one household typically
/// keeps one book per year or one book overall. Accounts live outside books;
/// a flow references both its book and (optionally) an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Book {
    /// Stable identifier, generated once and persisted so the book can be
    /// renamed without breaking references.
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub currency: Currency,
}

impl Book {
    pub fn new(name: String, user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            user_id: user_id.to_string(),
            currency: Currency::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub currency: String,
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

impl From<&Book> for ActiveModel {
    fn from(value: &Book) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            name: ActiveValue::Set(value.name.clone()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            currency: ActiveValue::Set(value.currency.code().to_string()),
        }
    }
}

impl TryFrom<Model> for Book {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            user_id: model.user_id,
            currency: Currency::try_from(model.currency.as_str()).unwrap_or_default(),
        })
    }
}
