use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{AccountKind, Currency, Engine};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "quaderno_admin")]
#[command(about = "Admin utilities for Quaderno (bootstrap and ledger maintenance)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./quaderno.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap commands.
    Book(Book),
    Account(Account),
    /// Read-only health report: balance drift and pending loan repair work.
    Check(UserArgs),
    /// Convert legacy unpaired loan flows into unified transfers.
    ProcessLoans(UserArgs),
    /// Collapse duplicate loan transfers to one canonical record each.
    ConsolidateLoans(UserArgs),
    /// Overwrite every cached account balance from the ledger.
    RecalcBalances(UserArgs),
}

#[derive(Args, Debug)]
struct UserArgs {
    #[arg(long)]
    user: String,
}

#[derive(Args, Debug)]
struct Book {
    #[command(subcommand)]
    command: BookCommand,
}

#[derive(Subcommand, Debug)]
enum BookCommand {
    Create(BookCreateArgs),
}

#[derive(Args, Debug)]
struct BookCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "EUR")]
    currency: String,
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Create(AccountCreateArgs),
    Delete(AccountDeleteArgs),
}

#[derive(Args, Debug)]
struct AccountCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "cash")]
    kind: String,
    #[arg(long, default_value = "EUR")]
    currency: String,
}

#[derive(Args, Debug)]
struct AccountDeleteArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    id: Uuid,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "quaderno_admin=info,engine=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Book(Book {
            command: BookCommand::Create(args),
        }) => {
            let currency = Currency::try_from(args.currency.as_str())?;
            let book_id = engine
                .new_book(&args.name, &args.owner, Some(currency))
                .await?;
            println!("created book: {} ({book_id})", args.name);
        }
        Command::Account(Account {
            command: AccountCommand::Create(args),
        }) => {
            let kind = AccountKind::try_from(args.kind.as_str())?;
            let currency = Currency::try_from(args.currency.as_str())?;
            let account = engine
                .new_account(&args.owner, &args.name, kind, Some(currency))
                .await?;
            println!("created account: {} ({})", account.name, account.id);
        }
        Command::Account(Account {
            command: AccountCommand::Delete(args),
        }) => {
            engine.delete_account(args.id, &args.owner).await?;
            println!("deleted account: {}", args.id);
        }
        Command::Check(args) => {
            let checks = engine.validate_all_account_balances(&args.user).await?;
            let drifted: Vec<_> = checks.iter().filter(|c| !c.is_valid).collect();
            println!("accounts: {} checked, {} drifted", checks.len(), drifted.len());
            print_json(&drifted)?;

            let loans = engine.validate_loan_consistency(&args.user).await?;
            print_json(&loans)?;
            if loans.needs_processing {
                println!("loan repair work pending; run process-loans");
            }
        }
        Command::ProcessLoans(args) => {
            let report = engine.process_unlinked_loan_flows(&args.user).await?;
            print_json(&report)?;
            let repaired = engine.recalculate_account_balances(&args.user).await?;
            println!("recalculated {repaired} account balances");
        }
        Command::ConsolidateLoans(args) => {
            let report = engine
                .consolidate_duplicate_loan_transfers(&args.user)
                .await?;
            print_json(&report)?;
            let repaired = engine.recalculate_account_balances(&args.user).await?;
            println!("recalculated {repaired} account balances");
        }
        Command::RecalcBalances(args) => {
            let repaired = engine.recalculate_account_balances(&args.user).await?;
            println!("recalculated {repaired} account balances");
        }
    }

    Ok(())
}
