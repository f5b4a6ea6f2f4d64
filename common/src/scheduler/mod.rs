// Scheduler module: in-process recurring timers for scheduled triggers

pub mod engine;

pub use engine::{FireFailure, FireHandler, TriggerScheduler};
