// Durable store layer
// Store contracts plus PostgreSQL and in-memory implementations

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod store;

pub use memory::InMemoryStore;
pub use pool::DbPool;
pub use repositories::{EventLogRepository, TriggerRepository};
pub use store::{EventLogStore, TriggerStore};
