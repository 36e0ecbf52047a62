//! batchline - client-side request aggregator
//!
//! Independent call sites queue logical queries against named remote
//! endpoints; batchline coalesces them into batched round-trips, routes each
//! reply back to its caller, and keeps a self-healing polling loop that backs
//! off while the server is unreachable.
//!
//! # Architecture
//!
//! - **endpoint**: queueing, the scheduling loop and reply fan-out
//! - **transport**: the batch round-trip (`BatchTransport`, reqwest-backed `HttpTransport`)
//! - **registry**: one endpoint per name from the server's settings document
//! - **config**: client configuration and settings documents
//! - **metrics**: Prometheus counters and gauges
//! - **logging**: tracing subscriber setup

pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod transport;

// Re-exports
pub use endpoint::{CallError, CallHandle, Endpoint};
pub use error::{BatchlineError, Result};
pub use registry::EndpointRegistry;
