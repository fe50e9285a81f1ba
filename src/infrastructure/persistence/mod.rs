//! Persistence - Element store backends

mod factory;
mod memory_store;
mod sqlite_store;

pub use factory::{create_element_store, ElementStoreBackend};
pub use memory_store::MemoryElementStore;
pub use sqlite_store::SqliteElementStore;
