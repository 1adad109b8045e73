//! # Observability
//!
//! Prometheus metrics for reconciliations and gateway calls. Logging goes
//! through `tracing` directly and is configured at startup.

pub mod metrics;
