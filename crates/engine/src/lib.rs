//! Ledger engine for Quaderno.
//!
//! The engine owns the bookkeeping invariants:
//!
//! - an account's cached balance always equals the sum of the flows that
//!   reference it (the balance reconciler is the source of truth);
//! - a transfer owns exactly two flows, one expense and one income, created
//!   and destroyed together inside one storage transaction;
//! - legacy loan data recorded as unpaired flows is migrated into the
//!   unified transfer construct without double-counting balances.
//!
//! All operations return [`ResultEngine`]; failures are typed by
//! [`EngineError`].

pub use accounts::{Account, AccountKind};
pub use books::Book;
pub use commands::{CreateTransferCmd, RecordFlowCmd, UpdateTransferCmd};
pub use currency::Currency;
pub use error::EngineError;
pub use flows::{Flow, FlowKind, LOAN_CATEGORY, TRANSFER_CATEGORY};
pub use ops::{Engine, EngineBuilder};
pub use reports::{
    BalanceCheck, LoanConsistency, LoanConsolidation, LoanFlowError, LoanProcessing,
    LoanTransferError,
};
pub use transfers::{LoanKind, Transfer};

pub mod accounts;
pub mod books;
mod commands;
mod currency;
mod error;
pub mod flows;
mod ops;
mod reports;
pub mod transfers;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
