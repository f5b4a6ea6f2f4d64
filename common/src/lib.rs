// Trigger lifecycle engine shared by the API server and integration tests

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod models;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod telemetry;

pub use service::TriggerService;
