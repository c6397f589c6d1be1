//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, proxy, route table produce:
//!     → logging.rs (structured log events, request IDs)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
