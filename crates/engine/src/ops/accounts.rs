//! Account management.

use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Account, AccountKind, Currency, EngineError, ResultEngine, accounts,
    util::normalize_required_name,
};

use super::{Engine, with_tx};

impl Engine {
    /// Add a new account for a user.
    pub async fn new_account(
        &self,
        user_id: &str,
        name: &str,
        kind: AccountKind,
        currency: Option<Currency>,
    ) -> ResultEngine<Account> {
        let name = normalize_required_name(name, "account")?;
        let account = Account::new(
            name,
            user_id,
            kind,
            currency.unwrap_or_default(),
            Utc::now(),
        );
        accounts::ActiveModel::from(&account)
            .insert(&self.database)
            .await?;
        Ok(account)
    }

    /// Return an [`Account`].
    pub async fn account(&self, account_id: Uuid, user_id: &str) -> ResultEngine<Account> {
        let model = self
            .require_account(&self.database, account_id, user_id)
            .await?;
        Account::try_from(model)
    }

    /// List a user's accounts, oldest first.
    pub async fn accounts(&self, user_id: &str) -> ResultEngine<Vec<Account>> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(accounts::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(Account::try_from).collect()
    }

    /// Delete an account.
    ///
    /// Refused while any flow or transfer still references the account;
    /// ledger history is never silently orphaned.
    pub async fn delete_account(&self, account_id: Uuid, user_id: &str) -> ResultEngine<()> {
        let user_id = user_id.to_string();
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id, &user_id).await?;
            let references = self.account_reference_count(&db_tx, account_id).await?;
            if references > 0 {
                Err(EngineError::InvalidArgument(format!(
                    "account is still referenced by {references} ledger rows"
                )))
            } else {
                accounts::Entity::delete_by_id(account_id.to_string())
                    .exec(&db_tx)
                    .await?;
                Ok(())
            }
        })
    }
}
