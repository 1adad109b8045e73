//! # Runtime
//!
//! Process wiring for the operator binary.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and context setup
//! - `watch_loop`: one controller per resource kind
//! - `error_policy`: retry classification and per-resource backoff

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
