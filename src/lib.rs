pub mod classify;
pub mod clean;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod schema;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod validate;
