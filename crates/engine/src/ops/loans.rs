//! Loan consolidation & migration.
//!
//! Historical data may contain loan movements recorded as two *unpaired*
//! flows (predating the unified transfer construct) and duplicate transfer
//! records describing the same economic event. The operations here detect
//! that state, convert legacy pairs into proper transfers without
//! double-counting balances, and collapse duplicates to one canonical
//! record.
//!
//! Bulk work runs one storage transaction per logical pair/group: a failure
//! on one item lands in the report's `errors` list and never rolls back the
//! already-committed rest.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CreateTransferCmd, EngineError, Flow, FlowKind, LOAN_CATEGORY, LoanConsistency,
    LoanConsolidation, LoanFlowError, LoanKind, LoanProcessing, LoanTransferError, ResultEngine,
    Transfer, flows, transfers,
    util::{counterparty_key, parse_uuid},
};

use super::{Engine, with_tx};

/// Equality key identifying one economic loan event.
///
/// Counterparty comparison is trimmed and case-insensitive; the account pair
/// is unordered so mirrored records group together.
type LoanEventKey = (String, i64, NaiveDate, Uuid, Uuid, LoanKind);

fn loan_event_key(transfer: &Transfer, counterparty: &str, kind: LoanKind) -> LoanEventKey {
    let (a, b) = if transfer.from_account_id <= transfer.to_account_id {
        (transfer.from_account_id, transfer.to_account_id)
    } else {
        (transfer.to_account_id, transfer.from_account_id)
    };
    (
        counterparty_key(counterparty),
        transfer.amount_minor,
        transfer.date,
        a,
        b,
        kind,
    )
}

impl Engine {
    /// Read-only scan for pending loan repair work.
    ///
    /// Reports loan flows with no transfer pairing, counts the already
    /// linked ones, and finds flows whose `transfer_id` points at a transfer
    /// that no longer exists.
    pub async fn validate_loan_consistency(&self, user_id: &str) -> ResultEngine<LoanConsistency> {
        let loan_models = flows::Entity::find()
            .filter(flows::Column::UserId.eq(user_id.to_string()))
            .filter(flows::Column::Category.eq(LOAN_CATEGORY.to_string()))
            .order_by_asc(flows::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut unlinked_loan_flows = Vec::new();
        let mut linked_loan_flows = 0u64;
        for model in &loan_models {
            if model.transfer_id.is_none() {
                unlinked_loan_flows.push(parse_uuid(&model.id, "flow")?);
            } else {
                linked_loan_flows += 1;
            }
        }

        // Dangling back-references are an anomaly regardless of category.
        let linked_models = flows::Entity::find()
            .filter(flows::Column::UserId.eq(user_id.to_string()))
            .filter(flows::Column::TransferId.is_not_null())
            .order_by_asc(flows::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut transfer_ids: HashSet<String> = HashSet::new();
        for model in &linked_models {
            if let Some(transfer_id) = &model.transfer_id {
                transfer_ids.insert(transfer_id.clone());
            }
        }
        let existing: HashSet<String> = if transfer_ids.is_empty() {
            HashSet::new()
        } else {
            transfers::Entity::find()
                .filter(transfers::Column::Id.is_in(transfer_ids.iter().cloned()))
                .all(&self.database)
                .await?
                .into_iter()
                .map(|model| model.id)
                .collect()
        };

        let mut dangling_flows = Vec::new();
        for model in &linked_models {
            if let Some(transfer_id) = &model.transfer_id
                && !existing.contains(transfer_id)
            {
                dangling_flows.push(parse_uuid(&model.id, "flow")?);
            }
        }

        let needs_processing = !unlinked_loan_flows.is_empty() || !dangling_flows.is_empty();
        Ok(LoanConsistency {
            unlinked_loan_flows,
            linked_loan_flows,
            dangling_flows,
            needs_processing,
        })
    }

    /// Convert legacy unpaired loan flows into unified transfers.
    ///
    /// For each unlinked loan flow the natural counterpart is another
    /// unlinked loan flow of the same user with opposite kind, matching
    /// date, amount, loan kind and counterparty, on a different account.
    /// Each matched pair becomes one transfer and the two originals are
    /// removed, inside one transaction per pair, so balances are unchanged.
    /// Singletons and malformed rows land in the error list; processing
    /// continues past them.
    pub async fn process_unlinked_loan_flows(&self, user_id: &str) -> ResultEngine<LoanProcessing> {
        let models = flows::Entity::find()
            .filter(flows::Column::UserId.eq(user_id.to_string()))
            .filter(flows::Column::Category.eq(LOAN_CATEGORY.to_string()))
            .filter(flows::Column::TransferId.is_null())
            .order_by_asc(flows::Column::CreatedAt)
            .order_by_asc(flows::Column::Id)
            .all(&self.database)
            .await?;
        let candidates: Vec<Flow> = models
            .into_iter()
            .map(Flow::try_from)
            .collect::<ResultEngine<_>>()?;

        let mut report = LoanProcessing {
            total: candidates.len(),
            success: 0,
            error: 0,
            errors: Vec::new(),
        };
        let mut consumed: HashSet<Uuid> = HashSet::new();

        for (index, flow) in candidates.iter().enumerate() {
            if consumed.contains(&flow.id) {
                continue;
            }

            let (account_id, loan_kind, counterparty) = match loan_metadata(flow) {
                Ok(meta) => meta,
                Err(reason) => {
                    consumed.insert(flow.id);
                    record_flow_error(&mut report, flow.id, reason, 1);
                    continue;
                }
            };

            let matches: Vec<&Flow> = candidates
                .iter()
                .skip(index + 1)
                .filter(|other| {
                    !consumed.contains(&other.id)
                        && other.kind == flow.kind.opposite()
                        && other.date == flow.date
                        && other.amount_minor == flow.amount_minor
                        && other.loan_kind == Some(loan_kind)
                        && other
                            .counterparty
                            .as_deref()
                            .is_some_and(|c| counterparty_key(c) == counterparty_key(counterparty))
                        && other.account_id.is_some_and(|id| id != account_id)
                })
                .collect();

            let Some(counterpart) = matches.first().copied() else {
                consumed.insert(flow.id);
                record_flow_error(
                    &mut report,
                    flow.id,
                    "no counterpart flow found".to_string(),
                    1,
                );
                continue;
            };
            if matches.len() > 1 {
                // Matching is fuzzy by nature; take the earliest-created
                // candidate but leave a trace for the operator.
                tracing::warn!(
                    flow = %flow.id,
                    candidates = matches.len(),
                    "multiple counterpart candidates, taking the earliest-created"
                );
            }

            let (expense, income) = if flow.kind == FlowKind::Expense {
                (flow, counterpart)
            } else {
                (counterpart, flow)
            };

            consumed.insert(flow.id);
            consumed.insert(counterpart.id);

            match self
                .link_loan_pair(user_id, expense, income, loan_kind, counterparty)
                .await
            {
                Ok(transfer_id) => {
                    tracing::info!(
                        transfer = %transfer_id,
                        expense = %expense.id,
                        income = %income.id,
                        "linked legacy loan pair into a transfer"
                    );
                    report.success += 2;
                }
                Err(err) => {
                    record_flow_error(&mut report, expense.id, err.to_string(), 2);
                }
            }
        }

        Ok(report)
    }

    /// Collapse duplicate loan transfers to one canonical record per
    /// economic event.
    ///
    /// Transfers group by `(counterparty, amount, date, unordered account
    /// pair, loan kind)`; in each group the earliest-created record wins and
    /// the rest are deleted through the engine delete path so balances
    /// unwind. A canonical record whose pair turned out broken is replaced
    /// by exactly one freshly created transfer.
    pub async fn consolidate_duplicate_loan_transfers(
        &self,
        user_id: &str,
    ) -> ResultEngine<LoanConsolidation> {
        let models = transfers::Entity::find()
            .filter(transfers::Column::UserId.eq(user_id.to_string()))
            .filter(transfers::Column::LoanKind.is_not_null())
            .order_by_asc(transfers::Column::CreatedAt)
            .order_by_asc(transfers::Column::Id)
            .all(&self.database)
            .await?;

        let mut report = LoanConsolidation {
            total_merged: 0,
            created_transfers: 0,
            errors: Vec::new(),
        };

        // Group in first-seen order so the earliest-created record of each
        // group is the canonical one.
        let mut order: Vec<LoanEventKey> = Vec::new();
        let mut groups: HashMap<LoanEventKey, Vec<Transfer>> = HashMap::new();
        for model in models {
            let transfer = Transfer::try_from(model)?;
            let (Some(kind), Some(counterparty)) = (transfer.loan_kind, &transfer.counterparty)
            else {
                report.errors.push(LoanTransferError {
                    transfer_id: transfer.id,
                    reason: "loan transfer is missing loan metadata".to_string(),
                });
                continue;
            };
            let key = loan_event_key(&transfer, counterparty, kind);
            let group = groups.entry(key.clone()).or_default();
            if group.is_empty() {
                order.push(key);
            }
            group.push(transfer);
        }

        for key in order {
            let Some(group) = groups.remove(&key) else {
                continue;
            };
            if group.len() < 2 {
                continue;
            }
            let (canonical, duplicates) = group
                .split_first()
                .ok_or_else(|| EngineError::AmbiguousState("empty duplicate group".to_string()))?;
            tracing::info!(
                canonical = %canonical.id,
                duplicates = duplicates.len(),
                counterparty = %key.0,
                "consolidating duplicate loan transfers"
            );

            for duplicate in duplicates {
                match self.delete_transfer(duplicate.id, user_id).await {
                    Ok(()) => report.total_merged += 1,
                    Err(EngineError::AmbiguousState(reason)) => {
                        // The record is gone and its accounts were repaired;
                        // the merge still counts, the anomaly is reported.
                        report.total_merged += 1;
                        report.errors.push(LoanTransferError {
                            transfer_id: duplicate.id,
                            reason,
                        });
                    }
                    Err(err) => {
                        report.errors.push(LoanTransferError {
                            transfer_id: duplicate.id,
                            reason: err.to_string(),
                        });
                    }
                }
            }

            if !self.pair_is_intact(&self.database, canonical).await? {
                match self.rebuild_canonical(user_id, canonical).await {
                    Ok(transfer_id) => {
                        tracing::info!(
                            old = %canonical.id,
                            new = %transfer_id,
                            "recreated broken canonical loan transfer"
                        );
                        report.created_transfers += 1;
                    }
                    Err(err) => {
                        report.errors.push(LoanTransferError {
                            transfer_id: canonical.id,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    /// Replace one legacy flow pair with the unified construct, leaving both
    /// account balances untouched.
    async fn link_loan_pair(
        &self,
        user_id: &str,
        expense: &Flow,
        income: &Flow,
        loan_kind: LoanKind,
        counterparty: &str,
    ) -> ResultEngine<Uuid> {
        let from_account_id = expense
            .account_id
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        let to_account_id = income
            .account_id
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;

        with_tx!(self, |db_tx| {
            let mut transfer = Transfer::new(
                user_id,
                expense.book_id.clone(),
                expense.date,
                from_account_id,
                to_account_id,
                expense.amount_minor,
                Some(loan_kind),
                Some(counterparty.to_string()),
                Utc::now(),
            )?;
            transfer.note = expense.note.clone().or_else(|| income.note.clone());

            transfers::ActiveModel::from(&transfer).insert(&db_tx).await?;
            self.apply_pair(&db_tx, &transfer).await?;

            // The legacy rows already moved the money once; removing them
            // reverses their contribution so the net effect is zero.
            for legacy in [expense, income] {
                flows::Entity::delete_by_id(legacy.id.to_string())
                    .exec(&db_tx)
                    .await?;
                if let Some(account_id) = legacy.account_id {
                    self.apply_account_delta(&db_tx, account_id, -legacy.signed_amount_minor())
                        .await?;
                }
            }
            Ok(transfer.id)
        })
    }

    /// Delete a broken canonical record (repairing balances) and create one
    /// fresh transfer for the same economic event.
    async fn rebuild_canonical(&self, user_id: &str, canonical: &Transfer) -> ResultEngine<Uuid> {
        match self.delete_transfer(canonical.id, user_id).await {
            Ok(()) | Err(EngineError::AmbiguousState(_)) => {}
            Err(err) => return Err(err),
        }

        let mut cmd = CreateTransferCmd::new(
            user_id,
            canonical.book_id.clone(),
            canonical.date,
            canonical.from_account_id,
            canonical.to_account_id,
            canonical.amount_minor,
        );
        if let (Some(kind), Some(counterparty)) = (canonical.loan_kind, &canonical.counterparty) {
            cmd = cmd.loan(kind, counterparty.clone());
        }
        if let Some(name) = &canonical.name {
            cmd = cmd.name(name.clone());
        }
        if let Some(note) = &canonical.note {
            cmd = cmd.note(note.clone());
        }
        let transfer = self.create_transfer(cmd).await?;
        Ok(transfer.id)
    }
}

/// Extract the metadata a legacy loan flow must carry to be pairable.
fn loan_metadata(flow: &Flow) -> Result<(Uuid, LoanKind, &str), String> {
    let account_id = flow
        .account_id
        .ok_or_else(|| "loan flow has no account".to_string())?;
    let loan_kind = flow
        .loan_kind
        .ok_or_else(|| "loan flow has no loan kind".to_string())?;
    let counterparty = flow
        .counterparty
        .as_deref()
        .ok_or_else(|| "loan flow has no counterparty".to_string())?;
    if flow.amount_minor <= 0 {
        return Err("loan flow has a non-positive amount".to_string());
    }
    Ok((account_id, loan_kind, counterparty))
}

fn record_flow_error(report: &mut LoanProcessing, flow_id: Uuid, reason: String, weight: usize) {
    tracing::warn!(flow = %flow_id, reason = %reason, "loan flow left unprocessed");
    report.error += weight;
    report.errors.push(LoanFlowError { flow_id, reason });
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn transfer(from: Uuid, to: Uuid, amount_minor: i64) -> Transfer {
        Transfer::new(
            "alice",
            "book".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            from,
            to,
            amount_minor,
            Some(LoanKind::Lend),
            Some("Bob".to_string()),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn event_key_ignores_account_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let forward = transfer(a, b, 100);
        let backward = transfer(b, a, 100);
        assert_eq!(
            loan_event_key(&forward, "Bob", LoanKind::Lend),
            loan_event_key(&backward, "bob ", LoanKind::Lend),
        );
    }

    #[test]
    fn event_key_distinguishes_amount_and_kind() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let base = transfer(a, b, 100);
        assert_ne!(
            loan_event_key(&base, "Bob", LoanKind::Lend),
            loan_event_key(&transfer(a, b, 200), "Bob", LoanKind::Lend),
        );
        assert_ne!(
            loan_event_key(&base, "Bob", LoanKind::Lend),
            loan_event_key(&base, "Bob", LoanKind::Repay),
        );
    }
}
