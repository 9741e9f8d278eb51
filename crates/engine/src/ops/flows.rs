//! Freestanding ledger entries.
//!
//! Flows recorded here are the plain income/expense path: one row, one
//! optional balance delta. Flows owned by a transfer never go through these
//! operations; deleting one half of a pair is redirected to the full
//! transfer delete so the aggregate stays whole.

use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Flow, RecordFlowCmd, ResultEngine, flows,
    util::{normalize_optional_text, normalize_required_name, parse_uuid},
};

use super::{Engine, with_tx};

impl Engine {
    /// Record a freestanding income/expense flow.
    pub async fn record_flow(&self, cmd: RecordFlowCmd) -> ResultEngine<Flow> {
        let RecordFlowCmd {
            user_id,
            book_id,
            date,
            kind,
            category,
            method,
            amount_minor,
            account_id,
            eliminate,
            counterparty,
            loan_kind,
            note,
        } = cmd;

        if amount_minor <= 0 {
            return Err(EngineError::InvalidArgument(
                "amount_minor must be > 0".to_string(),
            ));
        }
        let category = normalize_required_name(&category, "category")?;
        let counterparty = normalize_optional_text(counterparty.as_deref());
        if loan_kind.is_some() && counterparty.is_none() {
            return Err(EngineError::InvalidArgument(
                "a loan flow requires a counterparty".to_string(),
            ));
        }

        let flow = Flow {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            book_id,
            date,
            kind,
            category,
            method: normalize_optional_text(method.as_deref()),
            amount_minor,
            account_id,
            transfer_id: None,
            eliminate,
            counterparty,
            loan_kind,
            note: normalize_optional_text(note.as_deref()),
            created_at: Utc::now(),
        };

        with_tx!(self, |db_tx| {
            self.require_book(&db_tx, &flow.book_id, &user_id).await?;
            if let Some(account_id) = flow.account_id {
                self.require_account(&db_tx, account_id, &user_id).await?;
            }

            flows::ActiveModel::from(&flow).insert(&db_tx).await?;
            if let Some(account_id) = flow.account_id {
                self.apply_account_delta(&db_tx, account_id, flow.signed_amount_minor())
                    .await?;
            }
            Ok(flow)
        })
    }

    /// Return a [`Flow`].
    pub async fn flow(&self, flow_id: Uuid, user_id: &str) -> ResultEngine<Flow> {
        let model = flows::Entity::find_by_id(flow_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("flow".to_string()))?;
        if model.user_id != user_id {
            return Err(EngineError::NotFound("flow".to_string()));
        }
        Flow::try_from(model)
    }

    /// Delete a single ledger entry.
    ///
    /// A flow that is one half of a transfer pair cannot be removed on its
    /// own; the call is redirected to
    /// [`delete_transfer`](Engine::delete_transfer) on the owning transfer.
    pub async fn delete_flow(&self, flow_id: Uuid, user_id: &str) -> ResultEngine<()> {
        let model = flows::Entity::find_by_id(flow_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("flow".to_string()))?;
        if model.user_id != user_id {
            return Err(EngineError::NotFound("flow".to_string()));
        }

        if let Some(transfer_id) = model.transfer_id.as_deref() {
            let transfer_id = parse_uuid(transfer_id, "transfer")?;
            tracing::debug!(
                flow = %flow_id,
                transfer = %transfer_id,
                "flow is a transfer half, deleting the owning transfer"
            );
            return self.delete_transfer(transfer_id, user_id).await;
        }

        with_tx!(self, |db_tx| {
            let flow = Flow::try_from(model)?;
            flows::Entity::delete_by_id(flow_id.to_string())
                .exec(&db_tx)
                .await?;
            if let Some(account_id) = flow.account_id {
                self.apply_account_delta(&db_tx, account_id, -flow.signed_amount_minor())
                    .await?;
            }
            Ok(())
        })
    }
}
