//! The module contains the errors the engine can throw.
//!
//! The variants follow the failure taxonomy of the ledger core:
//!
//! - [`NotFound`] for a missing or foreign account/book/flow/transfer.
//! - [`InvalidArgument`] for input rejected before any write happens.
//! - [`AmbiguousState`] for a paired construct whose halves cannot both be
//!   located; the engine repairs the touched balances before reporting it.
//! - [`Database`] for storage failures surfaced by sea-orm.
//!
//! [`NotFound`]: EngineError::NotFound
//! [`InvalidArgument`]: EngineError::InvalidArgument
//! [`AmbiguousState`]: EngineError::AmbiguousState
//! [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0} not found, nothing happened")]
    NotFound(String),
    #[error("invalid argument: {0}, nothing happened")]
    InvalidArgument(String),
    #[error("inconsistency detected and repaired: {0}")]
    AmbiguousState(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidArgument(a), Self::InvalidArgument(b)) => a == b,
            (Self::AmbiguousState(a), Self::AmbiguousState(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
