//! The unified transfer engine.
//!
//! A transfer and its two flow halves form one aggregate. Every operation
//! here loads the aggregate root and manipulates all three rows plus the two
//! cached balances inside a single storage transaction, so no observer can
//! see a half-applied pair.
//!
//! When the two halves cannot both be located the pair math is no longer
//! trustworthy: the engine removes every row still referencing the transfer,
//! repairs the touched accounts through the reconciler, commits that repair,
//! and only then reports [`EngineError::AmbiguousState`] to the caller.

use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CreateTransferCmd, EngineError, Flow, FlowKind, LOAN_CATEGORY, ResultEngine,
    TRANSFER_CATEGORY, Transfer, UpdateTransferCmd, flows, transfers,
    util::{normalize_optional_text, parse_uuid},
};

use super::{Engine, with_tx};

/// Payment-method tag recorded on the two halves of a pair.
pub(crate) const TRANSFER_METHOD: &str = "transfer";

/// What happened to the aggregate once the transaction committed.
enum PairOutcome<T> {
    Clean(T),
    Repaired(String),
}

/// Build the two flow halves owned by a transfer: the expense debit on
/// `from_account_id` and the income credit on `to_account_id`. Both carry
/// the transfer id and are eliminated from income/expense aggregates.
fn pair_flows(transfer: &Transfer) -> [Flow; 2] {
    let category = if transfer.is_loan() {
        LOAN_CATEGORY
    } else {
        TRANSFER_CATEGORY
    };
    let half = |kind: FlowKind, account_id: Uuid| Flow {
        id: Uuid::new_v4(),
        user_id: transfer.user_id.clone(),
        book_id: transfer.book_id.clone(),
        date: transfer.date,
        kind,
        category: category.to_string(),
        method: Some(TRANSFER_METHOD.to_string()),
        amount_minor: transfer.amount_minor,
        account_id: Some(account_id),
        transfer_id: Some(transfer.id),
        eliminate: true,
        counterparty: None,
        loan_kind: None,
        note: None,
        created_at: transfer.created_at,
    };
    [
        half(FlowKind::Expense, transfer.from_account_id),
        half(FlowKind::Income, transfer.to_account_id),
    ]
}

impl Engine {
    /// Create a transfer pair between two accounts.
    ///
    /// Inserts the transfer row and its two flow halves, then applies the
    /// incremental balance deltas, all in one transaction.
    pub async fn create_transfer(&self, cmd: CreateTransferCmd) -> ResultEngine<Transfer> {
        let CreateTransferCmd {
            user_id,
            book_id,
            date,
            from_account_id,
            to_account_id,
            amount_minor,
            loan_kind,
            counterparty,
            name,
            note,
        } = cmd;

        let mut transfer = Transfer::new(
            &user_id,
            book_id,
            date,
            from_account_id,
            to_account_id,
            amount_minor,
            loan_kind,
            normalize_optional_text(counterparty.as_deref()),
            Utc::now(),
        )?;
        transfer.name = normalize_optional_text(name.as_deref());
        transfer.note = normalize_optional_text(note.as_deref());

        with_tx!(self, |db_tx| {
            self.require_book(&db_tx, &transfer.book_id, &user_id).await?;
            self.require_account(&db_tx, transfer.from_account_id, &user_id)
                .await?;
            self.require_account(&db_tx, transfer.to_account_id, &user_id)
                .await?;

            transfers::ActiveModel::from(&transfer).insert(&db_tx).await?;
            self.apply_pair(&db_tx, &transfer).await?;
            Ok(transfer)
        })
    }

    /// Update an existing transfer pair.
    ///
    /// Applied as the full unwind of the current pair followed by the full
    /// application of the merged one, in one transaction; partial-field
    /// updates can never produce an inconsistent intermediate balance. The
    /// transfer id stays stable.
    pub async fn update_transfer(&self, cmd: UpdateTransferCmd) -> ResultEngine<Transfer> {
        let transfer_id = cmd.transfer_id;
        let user_id = cmd.user_id.clone();

        let outcome = with_tx!(self, |db_tx| {
            let model = self.require_transfer(&db_tx, transfer_id, &user_id).await?;
            let current = Transfer::try_from(model)?;

            if let Some(reason) = self.unwind_pair(&db_tx, &current).await? {
                transfers::Entity::delete_by_id(transfer_id.to_string())
                    .exec(&db_tx)
                    .await?;
                Ok::<_, EngineError>(PairOutcome::Repaired(reason))
            } else {
                let merged = Transfer {
                    id: current.id,
                    user_id: current.user_id.clone(),
                    book_id: current.book_id.clone(),
                    date: cmd.date.unwrap_or(current.date),
                    from_account_id: cmd.from_account_id.unwrap_or(current.from_account_id),
                    to_account_id: cmd.to_account_id.unwrap_or(current.to_account_id),
                    amount_minor: cmd.amount_minor.unwrap_or(current.amount_minor),
                    loan_kind: cmd.loan_kind.or(current.loan_kind),
                    counterparty: normalize_optional_text(cmd.counterparty.as_deref())
                        .or(current.counterparty),
                    name: normalize_optional_text(cmd.name.as_deref()).or(current.name),
                    note: normalize_optional_text(cmd.note.as_deref()).or(current.note),
                    created_at: current.created_at,
                };
                merged.validate()?;
                self.require_account(&db_tx, merged.from_account_id, &user_id)
                    .await?;
                self.require_account(&db_tx, merged.to_account_id, &user_id)
                    .await?;

                transfers::ActiveModel::from(&merged).update(&db_tx).await?;
                self.apply_pair(&db_tx, &merged).await?;
                Ok(PairOutcome::Clean(merged))
            }
        })?;

        match outcome {
            PairOutcome::Clean(transfer) => Ok(transfer),
            PairOutcome::Repaired(reason) => Err(EngineError::AmbiguousState(reason)),
        }
    }

    /// Delete a transfer pair, reversing its balance deltas.
    pub async fn delete_transfer(&self, transfer_id: Uuid, user_id: &str) -> ResultEngine<()> {
        let user_id = user_id.to_string();
        let outcome = with_tx!(self, |db_tx| {
            let model = self.require_transfer(&db_tx, transfer_id, &user_id).await?;
            let transfer = Transfer::try_from(model)?;

            let repaired = self.unwind_pair(&db_tx, &transfer).await?;
            transfers::Entity::delete_by_id(transfer_id.to_string())
                .exec(&db_tx)
                .await?;

            match repaired {
                None => Ok::<_, EngineError>(PairOutcome::Clean(())),
                Some(reason) => Ok(PairOutcome::Repaired(reason)),
            }
        })?;

        match outcome {
            PairOutcome::Clean(()) => Ok(()),
            PairOutcome::Repaired(reason) => Err(EngineError::AmbiguousState(reason)),
        }
    }

    /// Return a [`Transfer`].
    pub async fn transfer(&self, transfer_id: Uuid, user_id: &str) -> ResultEngine<Transfer> {
        let model = self
            .require_transfer(&self.database, transfer_id, user_id)
            .await?;
        Transfer::try_from(model)
    }

    pub(crate) async fn require_transfer<C: ConnectionTrait>(
        &self,
        db: &C,
        transfer_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<transfers::Model> {
        let model = transfers::Entity::find_by_id(transfer_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("transfer".to_string()))?;
        if model.user_id != user_id {
            return Err(EngineError::NotFound("transfer".to_string()));
        }
        Ok(model)
    }

    /// Check that a transfer still owns an intact pair: exactly two halves,
    /// one income on `to`, one expense on `from`, equal magnitudes.
    pub(crate) async fn pair_is_intact<C: ConnectionTrait>(
        &self,
        db: &C,
        transfer: &Transfer,
    ) -> ResultEngine<bool> {
        let halves = flows::Entity::find()
            .filter(flows::Column::TransferId.eq(transfer.id.to_string()))
            .all(db)
            .await?;
        Ok(classify_halves(transfer, &halves).is_some())
    }

    /// Insert the two halves of a transfer and apply the balance deltas.
    pub(crate) async fn apply_pair<C: ConnectionTrait>(
        &self,
        db: &C,
        transfer: &Transfer,
    ) -> ResultEngine<()> {
        for flow in pair_flows(transfer) {
            flows::ActiveModel::from(&flow).insert(db).await?;
        }
        self.apply_account_delta(db, transfer.from_account_id, -transfer.amount_minor)
            .await?;
        self.apply_account_delta(db, transfer.to_account_id, transfer.amount_minor)
            .await?;
        Ok(())
    }

    /// Remove the halves of a transfer and reverse the balance deltas.
    ///
    /// Returns `None` on the happy path. When the pair is not intact the
    /// incremental math is abandoned: every flow still referencing the
    /// transfer is force-deleted and each touched account is repaired via
    /// the reconciler. The returned reason marks the aggregate as repaired;
    /// the caller decides how to surface it.
    pub(crate) async fn unwind_pair<C: ConnectionTrait>(
        &self,
        db: &C,
        transfer: &Transfer,
    ) -> ResultEngine<Option<String>> {
        let halves = flows::Entity::find()
            .filter(flows::Column::TransferId.eq(transfer.id.to_string()))
            .all(db)
            .await?;

        if let Some((expense, income)) = classify_halves(transfer, &halves) {
            flows::Entity::delete_by_id(expense.id.clone())
                .exec(db)
                .await?;
            flows::Entity::delete_by_id(income.id.clone()).exec(db).await?;
            self.apply_account_delta(db, transfer.from_account_id, transfer.amount_minor)
                .await?;
            self.apply_account_delta(db, transfer.to_account_id, -transfer.amount_minor)
                .await?;
            return Ok(None);
        }

        // Anomaly: the pair invariant does not hold. Force-delete what is
        // left and hand the touched accounts to the reconciler.
        tracing::warn!(
            transfer = %transfer.id,
            halves = halves.len(),
            "transfer pair is not intact, falling back to reconciler repair"
        );
        let mut touched = vec![transfer.from_account_id, transfer.to_account_id];
        for model in &halves {
            if let Some(account_id) = model.account_id.as_deref() {
                touched.push(parse_uuid(account_id, "account")?);
            }
            flows::Entity::delete_by_id(model.id.clone()).exec(db).await?;
        }
        touched.sort_unstable();
        touched.dedup();
        for account_id in touched {
            self.repair_account_balance(db, account_id).await?;
        }
        Ok(Some(format!(
            "transfer {} did not own an intact pair ({} flows found); \
             flows removed and account balances recomputed",
            transfer.id,
            halves.len()
        )))
    }
}

/// Find the expense and income halves of an intact pair, or `None` when the
/// invariant does not hold.
fn classify_halves<'a>(
    transfer: &Transfer,
    halves: &'a [flows::Model],
) -> Option<(&'a flows::Model, &'a flows::Model)> {
    if halves.len() != 2 {
        return None;
    }
    let from = transfer.from_account_id.to_string();
    let to = transfer.to_account_id.to_string();
    let expense = halves.iter().find(|m| {
        m.kind == FlowKind::Expense.as_str()
            && m.amount_minor == transfer.amount_minor
            && m.account_id.as_deref() == Some(from.as_str())
    })?;
    let income = halves.iter().find(|m| {
        m.kind == FlowKind::Income.as_str()
            && m.amount_minor == transfer.amount_minor
            && m.account_id.as_deref() == Some(to.as_str())
    })?;
    Some((expense, income))
}
