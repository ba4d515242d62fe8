/// SQLite Backend
///
/// The default backend: every registered database is its own SQLite
/// connection, in memory or as a file under a store directory.
pub mod database;
pub mod executor;

pub use database::{Database, StoreLocation, TransactionState};
pub use executor::SqliteExecutor;
