pub mod aggregator;
pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod persister;
pub mod server;
pub mod storage;
pub mod types;

// Domain data shapes shared across layers
pub mod domain;
