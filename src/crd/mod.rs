//! # Custom Resource Definitions
//!
//! CRD types for the APIM operator.
//!
//! ## Module Structure
//!
//! - `common.rs` - Enumerations, contact info and operation tracking shared by several kinds
//! - `api.rs` - Version set with inline version declarations
//! - `api_version.rs` - A single API version (owned by an `Api`)
//! - `backend.rs` - Backend upstreams
//! - `product_api.rs` - Product-scoped API
//! - `product_api_version.rs` - Version set behind a versioned `ProductApi`

mod api;
mod api_version;
mod backend;
mod common;
mod product_api;
mod product_api_version;

// Re-export all public types
pub use api::{Api, ApiSpec, ApiStatus};
pub use api_version::{ApiPolicySpec, ApiVersion, ApiVersionSpec, ApiVersionStatus, ApiVersionSubSpec};
pub use backend::{Backend, BackendSpec, BackendStatus};
pub use common::{
    ApiType, Contact, ContentFormat, OperationState, PolicyFormat, Protocol, ProvisioningState,
    VersioningScheme,
};
pub use product_api::{ProductApi, ProductApiSpec, ProductApiStatus};
pub use product_api_version::{ProductApiVersion, ProductApiVersionSpec, ProductApiVersionStatus};
