//! StockChat client library
//!
//! Exposes the service client, its cache, and the CLI plumbing used by the
//! `stockchat` binary and the integration tests.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod render;

pub use api::{ApiError, StockClient};
pub use config::ClientConfig;
