/// In-memory store
///
/// Alternative backend keeping tables as row collections in process
/// memory, with one lock per table.
pub mod executor;
pub mod table;

pub use executor::MemStore;
pub use table::{MemDatabase, MemRow, Table, TableData};
