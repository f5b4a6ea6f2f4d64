// Trigger lifecycle engines: execution, log queries and retention

pub mod executor;
pub mod query;
pub mod retention;

pub use executor::TriggerExecutor;
pub use query::LogQueryEngine;
pub use retention::{RetentionEngine, RetentionState, ARCHIVE_AFTER_SECS, PURGE_AFTER_SECS};
