//! # APIM Operator
//!
//! A Kubernetes operator that reconciles Azure API Management from custom
//! resources: `Api`, `ApiVersion`, `Backend`, `ProductApi` and
//! `ProductApiVersion`.
//!
//! ## Configuration
//!
//! - `STILAS_AZ_SUBSCRIPTION_ID`, `STILAS_AZ_RESOURCE_GROUP`, `STILAS_AZ_APIM_NAME`
//!   select the APIM instance
//! - `AZURE_CLIENT_ID` switches authentication to Workload Identity
//! - `WATCH_NAMESPACE` restricts the watch to one namespace
//! - `RUST_LOG` controls log filtering (default `apim_operator=info`)

use anyhow::Result;
use apim_operator::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.context, init.server_state).await
}
