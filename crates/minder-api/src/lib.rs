//! Protocol types for the minderd socket API
//!
//! This crate defines the stable API between minderd and the surfaces:
//! - Commands (requests from surfaces)
//! - Responses
//! - Sync events (daemon -> surfaces, pure push)
//! - Versioning

mod commands;
mod sync;
mod types;

pub use commands::*;
pub use sync::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
