//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: `ProxyConfig → Result<(), Vec<ValidationError>>`
//! - Runs after CLI overrides and derived values are applied

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("invalid registry endpoint '{0}'")]
    RegistryEndpoint(String),

    #[error("registry root path must not be empty")]
    EmptyRootPath,

    #[error("domain separator must not be empty")]
    EmptySeparator,

    #[error("base host must not be empty")]
    EmptyBaseHost,

    #[error("registry retry interval must be greater than zero")]
    ZeroRetryInterval,

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Semantic validation; serde already handled the syntactic layer.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port().is_none() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    match Url::parse(&config.registry.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::RegistryEndpoint(
            config.registry.endpoint.clone(),
        )),
    }

    if config.registry.root_path.trim_matches('/').is_empty() {
        errors.push(ValidationError::EmptyRootPath);
    }
    if config.registry.separator.is_empty() {
        errors.push(ValidationError::EmptySeparator);
    }
    if config.registry.base_host.is_empty() {
        errors.push(ValidationError::EmptyBaseHost);
    }
    if config.registry.retry_secs == 0 {
        errors.push(ValidationError::ZeroRetryInterval);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
