// PostgreSQL repositories implementing the store contracts

pub mod event_log;
pub mod queries;
pub mod trigger;

pub use event_log::EventLogRepository;
pub use trigger::TriggerRepository;
