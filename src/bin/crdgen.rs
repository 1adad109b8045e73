//! # CRD Generator
//!
//! Generates the CustomResourceDefinition YAML for every kind the operator
//! reconciles, as one multi-document stream.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/apim.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use apim_operator::crd::{Api, ApiVersion, Backend, ProductApi, ProductApiVersion};
use kube::core::CustomResourceExt;

fn main() {
    let crds = [
        Api::crd(),
        ApiVersion::crd(),
        Backend::crd(),
        ProductApi::crd(),
        ProductApiVersion::crd(),
    ];

    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
