//! # Controller
//!
//! Core controller modules for the APIM operator.
//!
//! - `backoff`: Fibonacci backoff for transient failures
//! - `reconciler`: per-kind reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
