//! Database module for feederwatch.
//!
//! SQLite-backed store for monitoring samples and remediation events.

mod models;
mod store;

pub use models::*;
pub use store::*;
