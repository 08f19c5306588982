//! Shared utilities for minder
//!
//! This crate provides:
//! - ID types (ProfileId, ItemId, SessionId, ClientId, DeviceId, ...)
//! - Time utilities (monotonic time, day/week boundaries, duration helpers)
//! - Rate limiting helpers
//! - Default paths for socket and data directories

mod ids;
mod paths;
mod rate_limit;
mod time;

pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
