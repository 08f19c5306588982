//! Usage ledger for minder
//!
//! Append-only persistence for usage segments and bonus grants:
//! - Segments are atomic and immutable once recorded
//! - Re-sent segments are tolerated (keyed by profile, item, start time)
//! - Sub-second segments are discarded, not rounded up
//! - Snapshot assembly (today/week sums plus the configured limits)

mod sqlite;
mod traits;

pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
