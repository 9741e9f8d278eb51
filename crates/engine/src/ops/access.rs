//! Shared row lookups and the incremental balance fast path.

use sea_orm::{ActiveValue, ConnectionTrait, PaginatorTrait, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, accounts, books, flows, transfers};

use super::Engine;

impl Engine {
    /// Load an account and check it belongs to the requesting user.
    pub(crate) async fn require_account<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<accounts::Model> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        if model.user_id != user_id {
            return Err(EngineError::NotFound("account".to_string()));
        }
        Ok(model)
    }

    /// Load a book and check it belongs to the requesting user.
    pub(crate) async fn require_book<C: ConnectionTrait>(
        &self,
        db: &C,
        book_id: &str,
        user_id: &str,
    ) -> ResultEngine<books::Model> {
        let model = books::Entity::find_by_id(book_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("book".to_string()))?;
        if model.user_id != user_id {
            return Err(EngineError::NotFound("book".to_string()));
        }
        Ok(model)
    }

    /// Apply an incremental delta to an account's cached balance.
    ///
    /// This is the fast path. Bulk and repair paths overwrite the cache
    /// through the reconciler instead; those two are the only write paths to
    /// `balance_minor`.
    pub(crate) async fn apply_account_delta<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
        delta_minor: i64,
    ) -> ResultEngine<()> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        let account = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            balance_minor: ActiveValue::Set(model.balance_minor + delta_minor),
            ..Default::default()
        };
        account.update(db).await?;
        Ok(())
    }

    /// Count ledger rows still referencing an account.
    pub(crate) async fn account_reference_count<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
    ) -> ResultEngine<u64> {
        let id = account_id.to_string();
        let flow_refs = flows::Entity::find()
            .filter(flows::Column::AccountId.eq(id.clone()))
            .count(db)
            .await?;
        let transfer_refs = transfers::Entity::find()
            .filter(
                transfers::Column::FromAccountId
                    .eq(id.clone())
                    .or(transfers::Column::ToAccountId.eq(id)),
            )
            .count(db)
            .await?;
        Ok(flow_refs + transfer_refs)
    }
}
