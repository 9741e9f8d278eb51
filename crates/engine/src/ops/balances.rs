//! Balance reconciliation.
//!
//! The reconciler is the single authoritative definition of an account
//! balance: the sum of the signed contributions of every flow referencing
//! the account, `eliminate` flag ignored (elimination affects reporting
//! aggregates, not balances). The stored `balance_minor` column is a cache
//! refreshed either by the exact incremental deltas of the write paths or by
//! [`Engine::recalculate_account_balances`] / the internal repair used after
//! an anomaly.

use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{BalanceCheck, EngineError, Flow, ResultEngine, accounts, flows, util::parse_uuid};

use super::{Engine, with_tx};

impl Engine {
    /// Sum the signed contribution of every flow referencing the account.
    pub(crate) async fn computed_balance<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
    ) -> ResultEngine<i64> {
        let flow_models = flows::Entity::find()
            .filter(flows::Column::AccountId.eq(account_id.to_string()))
            .all(db)
            .await?;

        let mut balance_minor = 0i64;
        for model in flow_models {
            let flow = Flow::try_from(model)?;
            balance_minor += flow.signed_amount_minor();
        }
        Ok(balance_minor)
    }

    /// Recompute an account's balance from the ledger.
    ///
    /// Pure read: repeated calls without intervening writes return the same
    /// value, and the cached column is not touched.
    pub async fn recompute_balance(&self, account_id: Uuid, user_id: &str) -> ResultEngine<i64> {
        self.require_account(&self.database, account_id, user_id)
            .await?;
        self.computed_balance(&self.database, account_id).await
    }

    /// Compare the cached balance against the reconciler without mutating.
    pub async fn validate_account_balance(
        &self,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<BalanceCheck> {
        let model = self
            .require_account(&self.database, account_id, user_id)
            .await?;
        let computed_minor = self.computed_balance(&self.database, account_id).await?;
        Ok(BalanceCheck::new(
            account_id,
            model.balance_minor,
            computed_minor,
        ))
    }

    /// Run the read-only balance check over every account of a user.
    ///
    /// Reports drifted caches; the explicit mutation is
    /// [`recalculate_account_balances`](Engine::recalculate_account_balances).
    pub async fn validate_all_account_balances(
        &self,
        user_id: &str,
    ) -> ResultEngine<Vec<BalanceCheck>> {
        let account_models = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.to_string()))
            .all(&self.database)
            .await?;

        let mut checks = Vec::with_capacity(account_models.len());
        for model in account_models {
            let account_id = parse_uuid(&model.id, "account")?;
            let computed_minor = self.computed_balance(&self.database, account_id).await?;
            checks.push(BalanceCheck::new(
                account_id,
                model.balance_minor,
                computed_minor,
            ));
        }
        Ok(checks)
    }

    /// Overwrite an account's cached balance with the recomputed value.
    ///
    /// Used inside an already-open transaction, both by the bulk recalc and
    /// by the anomaly repair paths; incremental math is not trusted once an
    /// inconsistency was observed.
    pub(crate) async fn repair_account_balance<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
    ) -> ResultEngine<i64> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        let computed_minor = self.computed_balance(db, account_id).await?;
        if computed_minor != model.balance_minor {
            tracing::info!(
                account = %account_id,
                stored = model.balance_minor,
                computed = computed_minor,
                "repairing drifted account balance"
            );
        }
        let account = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            balance_minor: ActiveValue::Set(computed_minor),
            ..Default::default()
        };
        account.update(db).await?;
        Ok(computed_minor)
    }

    /// Overwrite the cached balance of every account the user owns.
    ///
    /// Bulk structural changes (loan migration, consolidation) are large
    /// enough that incremental deltas are not trusted afterwards.
    pub async fn recalculate_account_balances(&self, user_id: &str) -> ResultEngine<usize> {
        let user_id = user_id.to_string();
        with_tx!(self, |db_tx| {
            let account_models = accounts::Entity::find()
                .filter(accounts::Column::UserId.eq(user_id.clone()))
                .all(&db_tx)
                .await?;

            let mut repaired = 0usize;
            for model in &account_models {
                let account_id = parse_uuid(&model.id, "account")?;
                self.repair_account_balance(&db_tx, account_id).await?;
                repaired += 1;
            }
            Ok(repaired)
        })
    }
}
