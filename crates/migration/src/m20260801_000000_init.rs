//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for Quaderno:
//!
//! - `books`: containers users record flows into
//! - `accounts`: monetary buckets with a cached derived balance
//! - `flows`: single-sided ledger entries
//! - `transfers`: paired money movements owning two flows each

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Books {
    Table,
    Id,
    Name,
    UserId,
    Currency,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Name,
    Kind,
    Currency,
    BalanceMinor,
    NetWorth,
    Hidden,
    CreatedAt,
}

#[derive(Iden)]
enum Flows {
    Table,
    Id,
    UserId,
    BookId,
    Date,
    Kind,
    Category,
    Method,
    AmountMinor,
    AccountId,
    TransferId,
    Eliminate,
    Counterparty,
    LoanKind,
    Note,
    CreatedAt,
}

#[derive(Iden)]
enum Transfers {
    Table,
    Id,
    UserId,
    BookId,
    Date,
    FromAccountId,
    ToAccountId,
    AmountMinor,
    LoanKind,
    Counterparty,
    Name,
    Note,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Books
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Books::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Books::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Books::Name).string().not_null())
                    .col(ColumnDef::new(Books::UserId).string().not_null())
                    .col(
                        ColumnDef::new(Books::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-books-user_id")
                    .table(Books::Table)
                    .col(Books::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::UserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(
                        ColumnDef::new(Accounts::BalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Accounts::NetWorth).boolean().not_null())
                    .col(ColumnDef::new(Accounts::Hidden).boolean().not_null())
                    .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-user_id")
                    .table(Accounts::Table)
                    .col(Accounts::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transfers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transfers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transfers::UserId).string().not_null())
                    .col(ColumnDef::new(Transfers::BookId).string().not_null())
                    .col(ColumnDef::new(Transfers::Date).date().not_null())
                    .col(
                        ColumnDef::new(Transfers::FromAccountId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transfers::ToAccountId).string().not_null())
                    .col(
                        ColumnDef::new(Transfers::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transfers::LoanKind).string())
                    .col(ColumnDef::new(Transfers::Counterparty).string())
                    .col(ColumnDef::new(Transfers::Name).string())
                    .col(ColumnDef::new(Transfers::Note).string())
                    .col(ColumnDef::new(Transfers::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-book_id")
                            .from(Transfers::Table, Transfers::BookId)
                            .to(Books::Table, Books::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-from_account_id")
                            .from(Transfers::Table, Transfers::FromAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-to_account_id")
                            .from(Transfers::Table, Transfers::ToAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-user_id-created_at")
                    .table(Transfers::Table)
                    .col(Transfers::UserId)
                    .col(Transfers::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-user_id-loan_kind")
                    .table(Transfers::Table)
                    .col(Transfers::UserId)
                    .col(Transfers::LoanKind)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Flows
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Flows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Flows::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Flows::UserId).string().not_null())
                    .col(ColumnDef::new(Flows::BookId).string().not_null())
                    .col(ColumnDef::new(Flows::Date).date().not_null())
                    .col(ColumnDef::new(Flows::Kind).string().not_null())
                    .col(ColumnDef::new(Flows::Category).string().not_null())
                    .col(ColumnDef::new(Flows::Method).string())
                    .col(
                        ColumnDef::new(Flows::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Flows::AccountId).string())
                    .col(ColumnDef::new(Flows::TransferId).string())
                    .col(ColumnDef::new(Flows::Eliminate).boolean().not_null())
                    .col(ColumnDef::new(Flows::Counterparty).string())
                    .col(ColumnDef::new(Flows::LoanKind).string())
                    .col(ColumnDef::new(Flows::Note).string())
                    .col(ColumnDef::new(Flows::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-flows-book_id")
                            .from(Flows::Table, Flows::BookId)
                            .to(Books::Table, Books::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-flows-account_id")
                            .from(Flows::Table, Flows::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-flows-account_id")
                    .table(Flows::Table)
                    .col(Flows::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-flows-transfer_id")
                    .table(Flows::Table)
                    .col(Flows::TransferId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-flows-user_id-category")
                    .table(Flows::Table)
                    .col(Flows::UserId)
                    .col(Flows::Category)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Flows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Books::Table).to_owned())
            .await?;
        Ok(())
    }
}
