//! Drivetrail Store - SQLite persistence
//!
//! SQLite-backed implementation of the four repository ports plus the
//! transactional apply-one-item step:
//! - Item mirror rows
//! - Append-only change event log
//! - Per-drive delta cursors
//! - Webhook subscription records

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteStateStore;
