mod mappers;
pub mod memory_store;
mod rows;
pub mod sqlite_store;

pub use memory_store::InMemoryActionStore;
pub use sqlite_store::SqliteActionStore;
