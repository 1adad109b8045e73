//! APIM Operator Library
//!
//! Reconciles Azure API Management resources from Kubernetes custom
//! resources. The binary in `main.rs` only wires the runtime; everything it
//! runs lives here so it can be tested.
//!
//! ## Quick Start
//!
//! ```rust
//! use apim_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod store;
