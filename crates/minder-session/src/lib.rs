//! Session tracking for minder surfaces
//!
//! Provides:
//! - `SessionTracker`: the per-surface state machine (budgets, warning and
//!   enforcement deadlines, heartbeat segment rotation, pause/resume)
//! - `SessionDriver`: the async task that drives a tracker from navigation
//!   events and a 1s tick, talking to the ledger through collaborator traits

mod driver;
mod tracker;

pub use driver::*;
pub use tracker::*;

use thiserror::Error;

/// Session-side errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Timed out reading usage")]
    Timeout,
}
