//! Data-access client for the StockChat analysis service
//!
//! Layers, leaf first: `Transport` performs one HTTP round trip under a
//! deadline, `RetryPolicy` re-runs it on transient failures, the in-flight
//! registry coalesces identical concurrent reads, and `StockClient` ties them
//! together with the response cache.

pub mod client;
pub mod error;
pub mod fingerprint;
pub mod inflight;
pub mod retry;
pub mod transport;

pub use client::StockClient;
pub use error::{ApiError, ErrorClass};
pub use fingerprint::RequestFingerprint;
pub use inflight::{InFlightRegistry, InFlightTicket, SharedOutcome, Slot};
pub use retry::RetryPolicy;
pub use transport::Transport;
