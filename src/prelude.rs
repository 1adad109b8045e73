//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use apim_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Gateway and store seams
pub use crate::provider::{ApimGateway, DeleteOutcome, GatewayError, OperationPoller, PollState};
pub use crate::store::{ObjectStore, StoreError};

// Reconciler entry points and context
pub use crate::controller::reconciler::{
    reconcile_api, reconcile_api_version, reconcile_backend, reconcile_product_api,
    reconcile_product_api_version, Context, ReconcilerError, Stores,
};

// Configuration
pub use crate::config::{ApimConfig, ApimTarget, ControllerConfig};
