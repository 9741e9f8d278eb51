use chrono::NaiveDate;
use sea_orm::{
    ActiveValue, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter,
};
use uuid::Uuid;

use engine::{
    AccountKind, CreateTransferCmd, Currency, Engine, EngineError, FlowKind, LoanKind,
    RecordFlowCmd, UpdateTransferCmd, flows,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn book_and_accounts(engine: &Engine) -> (String, Uuid, Uuid) {
    let book_id = engine
        .new_book("Main", "alice", Some(Currency::Eur))
        .await
        .unwrap();
    let cash = engine
        .new_account("alice", "Cash", AccountKind::Cash, None)
        .await
        .unwrap();
    let bank = engine
        .new_account("alice", "Bank", AccountKind::Bank, None)
        .await
        .unwrap();
    (book_id, cash.id, bank.id)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn balance(engine: &Engine, account_id: Uuid) -> i64 {
    engine.account(account_id, "alice").await.unwrap().balance_minor
}

/// The pairing invariant: exactly two flows reference the transfer, one
/// income and one expense, with equal magnitudes and eliminate set.
async fn assert_intact_pair(db: &DatabaseConnection, transfer_id: Uuid, amount_minor: i64) {
    let halves = flows::Entity::find()
        .filter(flows::Column::TransferId.eq(transfer_id.to_string()))
        .all(db)
        .await
        .unwrap();
    assert_eq!(halves.len(), 2);
    assert!(halves.iter().all(|f| f.amount_minor == amount_minor));
    assert!(halves.iter().all(|f| f.eliminate));
    assert_eq!(
        halves
            .iter()
            .filter(|f| f.kind == FlowKind::Income.as_str())
            .count(),
        1
    );
    assert_eq!(
        halves
            .iter()
            .filter(|f| f.kind == FlowKind::Expense.as_str())
            .count(),
        1
    );
}

#[tokio::test]
async fn loan_transfer_moves_money_between_accounts() {
    let (engine, db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    let transfer = engine
        .create_transfer(
            CreateTransferCmd::new("alice", book_id, day(2024, 6, 1), cash, bank, 100)
                .loan(LoanKind::Lend, "Alice"),
        )
        .await
        .unwrap();

    assert_eq!(balance(&engine, cash).await, -100);
    assert_eq!(balance(&engine, bank).await, 100);
    assert_eq!(transfer.loan_kind, Some(LoanKind::Lend));
    assert_eq!(transfer.counterparty.as_deref(), Some("Alice"));
    assert_intact_pair(&db, transfer.id, 100).await;
}

#[tokio::test]
async fn delete_transfer_restores_balances() {
    let (engine, db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    let transfer = engine
        .create_transfer(
            CreateTransferCmd::new("alice", book_id, day(2024, 6, 1), cash, bank, 100)
                .loan(LoanKind::Lend, "Alice"),
        )
        .await
        .unwrap();

    engine.delete_transfer(transfer.id, "alice").await.unwrap();

    assert_eq!(balance(&engine, cash).await, 0);
    assert_eq!(balance(&engine, bank).await, 0);
    let halves = flows::Entity::find()
        .filter(flows::Column::TransferId.eq(transfer.id.to_string()))
        .all(&db)
        .await
        .unwrap();
    assert!(halves.is_empty());
    assert_eq!(
        engine.transfer(transfer.id, "alice").await.unwrap_err(),
        EngineError::NotFound("transfer".to_string())
    );
}

#[tokio::test]
async fn create_then_delete_is_an_exact_inverse() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    engine
        .record_flow(
            RecordFlowCmd::new(
                "alice",
                book_id.clone(),
                day(2024, 5, 1),
                FlowKind::Income,
                "salary",
                250_000,
            )
            .account_id(bank),
        )
        .await
        .unwrap();
    engine
        .record_flow(
            RecordFlowCmd::new(
                "alice",
                book_id.clone(),
                day(2024, 5, 2),
                FlowKind::Expense,
                "groceries",
                4_350,
            )
            .account_id(cash),
        )
        .await
        .unwrap();

    let cash_before = balance(&engine, cash).await;
    let bank_before = balance(&engine, bank).await;

    let transfer = engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id,
            day(2024, 6, 1),
            bank,
            cash,
            30_000,
        ))
        .await
        .unwrap();
    engine.delete_transfer(transfer.id, "alice").await.unwrap();

    assert_eq!(balance(&engine, cash).await, cash_before);
    assert_eq!(balance(&engine, bank).await, bank_before);
}

#[tokio::test]
async fn money_is_conserved_across_the_pair() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    let total_before = balance(&engine, cash).await + balance(&engine, bank).await;
    engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id,
            day(2024, 6, 1),
            cash,
            bank,
            7_500,
        ))
        .await
        .unwrap();
    let total_after = balance(&engine, cash).await + balance(&engine, bank).await;
    assert_eq!(total_before, total_after);

    // No drift between the cache and the reconciler after the write.
    for account in [cash, bank] {
        let check = engine.validate_account_balance(account, "alice").await.unwrap();
        assert!(check.is_valid, "{check:?}");
    }
}

#[tokio::test]
async fn recompute_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;
    engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id,
            day(2024, 6, 1),
            cash,
            bank,
            1_234,
        ))
        .await
        .unwrap();

    let first = engine.recompute_balance(cash, "alice").await.unwrap();
    let second = engine.recompute_balance(cash, "alice").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, -1_234);
}

#[tokio::test]
async fn update_transfer_retargets_and_reprices_atomically() {
    let (engine, db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;
    let savings = engine
        .new_account("alice", "Savings", AccountKind::Savings, None)
        .await
        .unwrap();

    let transfer = engine
        .create_transfer(
            CreateTransferCmd::new("alice", book_id, day(2024, 6, 1), cash, bank, 100)
                .loan(LoanKind::Borrow, "Bob"),
        )
        .await
        .unwrap();

    let updated = engine
        .update_transfer(
            UpdateTransferCmd::new(transfer.id, "alice")
                .amount_minor(250)
                .to_account_id(savings.id)
                .date(day(2024, 7, 1)),
        )
        .await
        .unwrap();

    assert_eq!(updated.id, transfer.id);
    assert_eq!(updated.amount_minor, 250);
    assert_eq!(updated.date, day(2024, 7, 1));
    // Untouched fields survive the rewrite.
    assert_eq!(updated.loan_kind, Some(LoanKind::Borrow));
    assert_eq!(updated.counterparty.as_deref(), Some("Bob"));

    assert_eq!(balance(&engine, cash).await, -250);
    assert_eq!(balance(&engine, bank).await, 0);
    assert_eq!(balance(&engine, savings.id).await, 250);
    assert_intact_pair(&db, transfer.id, 250).await;
}

#[tokio::test]
async fn create_transfer_rejects_bad_input_before_writing() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    let same_accounts = engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id.clone(),
            day(2024, 6, 1),
            cash,
            cash,
            100,
        ))
        .await
        .unwrap_err();
    assert!(matches!(same_accounts, EngineError::InvalidArgument(_)));

    let zero_amount = engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id.clone(),
            day(2024, 6, 1),
            cash,
            bank,
            0,
        ))
        .await
        .unwrap_err();
    assert!(matches!(zero_amount, EngineError::InvalidArgument(_)));

    // A blank counterparty is no counterparty at all.
    let blank_counterparty = engine
        .create_transfer(
            CreateTransferCmd::new("alice", book_id.clone(), day(2024, 6, 1), cash, bank, 100)
                .loan(LoanKind::Lend, "   "),
        )
        .await
        .unwrap_err();
    assert!(matches!(blank_counterparty, EngineError::InvalidArgument(_)));

    // Nothing was written, balances untouched.
    assert_eq!(balance(&engine, cash).await, 0);
    assert_eq!(balance(&engine, bank).await, 0);
}

#[tokio::test]
async fn foreign_accounts_read_as_missing() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, _bank) = book_and_accounts(&engine).await;
    let mallory_account = engine
        .new_account("mallory", "Cash", AccountKind::Cash, None)
        .await
        .unwrap();

    let err = engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id,
            day(2024, 6, 1),
            cash,
            mallory_account.id,
            100,
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("account".to_string()));
}

#[tokio::test]
async fn deleting_one_half_deletes_the_whole_pair() {
    let (engine, db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    let transfer = engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id,
            day(2024, 6, 1),
            cash,
            bank,
            100,
        ))
        .await
        .unwrap();

    let half = flows::Entity::find()
        .filter(flows::Column::TransferId.eq(transfer.id.to_string()))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let half_id = Uuid::parse_str(&half.id).unwrap();

    engine.delete_flow(half_id, "alice").await.unwrap();

    assert_eq!(balance(&engine, cash).await, 0);
    assert_eq!(balance(&engine, bank).await, 0);
    assert!(
        flows::Entity::find()
            .filter(flows::Column::TransferId.eq(transfer.id.to_string()))
            .all(&db)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(engine.transfer(transfer.id, "alice").await.is_err());
}

#[tokio::test]
async fn broken_pair_is_repaired_and_reported() {
    let (engine, db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    let transfer = engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id,
            day(2024, 6, 1),
            cash,
            bank,
            100,
        ))
        .await
        .unwrap();

    // Simulate a prior inconsistent write: one half vanished.
    let expense = flows::Entity::find()
        .filter(flows::Column::TransferId.eq(transfer.id.to_string()))
        .filter(flows::Column::Kind.eq(FlowKind::Expense.as_str()))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    flows::Entity::delete_by_id(expense.id).exec(&db).await.unwrap();

    let err = engine.delete_transfer(transfer.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::AmbiguousState(_)));

    // The repair committed even though the operation reported failure: no
    // flows reference the transfer, the row is gone, and both balances match
    // the reconciler again.
    assert!(
        flows::Entity::find()
            .filter(flows::Column::TransferId.eq(transfer.id.to_string()))
            .all(&db)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(engine.transfer(transfer.id, "alice").await.is_err());
    for account in [cash, bank] {
        let check = engine.validate_account_balance(account, "alice").await.unwrap();
        assert!(check.is_valid, "{check:?}");
        assert_eq!(check.stored_minor, 0);
    }
}

#[tokio::test]
async fn freestanding_flows_apply_and_reverse_deltas() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, _bank) = book_and_accounts(&engine).await;

    let flow = engine
        .record_flow(
            RecordFlowCmd::new(
                "alice",
                book_id,
                day(2024, 5, 1),
                FlowKind::Income,
                "salary",
                1_000,
            )
            .account_id(cash)
            .method("bank transfer"),
        )
        .await
        .unwrap();
    assert_eq!(balance(&engine, cash).await, 1_000);

    engine.delete_flow(flow.id, "alice").await.unwrap();
    assert_eq!(balance(&engine, cash).await, 0);
}

#[tokio::test]
async fn eliminated_flows_still_affect_balances() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, _bank) = book_and_accounts(&engine).await;

    engine
        .record_flow(
            RecordFlowCmd::new(
                "alice",
                book_id,
                day(2024, 5, 1),
                FlowKind::Expense,
                "correction",
                500,
            )
            .account_id(cash)
            .eliminate(true),
        )
        .await
        .unwrap();

    assert_eq!(balance(&engine, cash).await, -500);
    assert_eq!(engine.recompute_balance(cash, "alice").await.unwrap(), -500);
}

#[tokio::test]
async fn drifted_cache_is_detected_and_recalculated() {
    let (engine, db) = engine_with_db().await;
    let (book_id, cash, _bank) = book_and_accounts(&engine).await;
    engine
        .record_flow(
            RecordFlowCmd::new(
                "alice",
                book_id,
                day(2024, 5, 1),
                FlowKind::Income,
                "salary",
                1_000,
            )
            .account_id(cash),
        )
        .await
        .unwrap();

    // Corrupt the cache behind the engine's back.
    let drifted = engine::accounts::ActiveModel {
        id: ActiveValue::Set(cash.to_string()),
        balance_minor: ActiveValue::Set(999_999),
        ..Default::default()
    };
    engine::accounts::Entity::update(drifted).exec(&db).await.unwrap();

    let check = engine.validate_account_balance(cash, "alice").await.unwrap();
    assert!(!check.is_valid);
    assert_eq!(check.stored_minor, 999_999);
    assert_eq!(check.computed_minor, 1_000);

    let drifted_accounts: Vec<_> = engine
        .validate_all_account_balances("alice")
        .await
        .unwrap()
        .into_iter()
        .filter(|c| !c.is_valid)
        .collect();
    assert_eq!(drifted_accounts.len(), 1);
    assert_eq!(drifted_accounts[0].account_id, cash);

    engine.recalculate_account_balances("alice").await.unwrap();
    assert_eq!(balance(&engine, cash).await, 1_000);
}

#[tokio::test]
async fn account_deletion_requires_an_empty_history() {
    let (engine, _db) = engine_with_db().await;
    let (book_id, cash, bank) = book_and_accounts(&engine).await;

    let transfer = engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            book_id,
            day(2024, 6, 1),
            cash,
            bank,
            100,
        ))
        .await
        .unwrap();

    let err = engine.delete_account(cash, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));

    engine.delete_transfer(transfer.id, "alice").await.unwrap();
    engine.delete_account(cash, "alice").await.unwrap();
    assert!(engine.account(cash, "alice").await.is_err());
}
