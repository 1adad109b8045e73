//! # Configuration
//!
//! Process-level configuration, read once at startup and injected into the
//! reconciler context.
//!
//! - `controller`: runtime tunables (requeue delays, concurrency, timeouts)
//! - `apim`: the Azure API Management instance every reconciler targets

mod apim;
mod controller;

pub use apim::{ApimConfig, ApimTarget, MissingConfiguration};
pub use controller::ControllerConfig;

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as a trimmed, non-empty string
pub(crate) fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}
