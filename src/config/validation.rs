//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts ≥ 1, windows > 0, addresses parse)
//! - Check that the default rate-limit tier exists
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: `&AppConfig → Result<(), Vec<ValidationError>>`

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts < 1 {
        errors.push(ValidationError::new("retry.max_attempts", "must be at least 1"));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::new(
            "retry.max_delay_ms",
            "must not be smaller than retry.base_delay_ms",
        ));
    }
    if !(retry.backoff_multiplier > 1.0) {
        errors.push(ValidationError::new("retry.backoff_multiplier", "must be greater than 1"));
    }

    for (name, breaker) in config.breakers.iter() {
        if breaker.failure_threshold < 1 {
            errors.push(ValidationError::new(
                format!("breakers.{name}.failure_threshold"),
                "must be at least 1",
            ));
        }
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.sweep_interval_secs < 1 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be at least 1"));
    }
    for (name, tier) in &rate_limit.tiers {
        if tier.requests < 1 {
            errors.push(ValidationError::new(
                format!("rate_limit.tiers.{name}.requests"),
                "must be at least 1",
            ));
        }
        if tier.window_secs < 1 {
            errors.push(ValidationError::new(
                format!("rate_limit.tiers.{name}.window_secs"),
                "must be at least 1",
            ));
        }
    }
    if !rate_limit.tiers.contains_key(&rate_limit.default_tier) {
        errors.push(ValidationError::new(
            "rate_limit.default_tier",
            format!("unknown tier '{}'", rate_limit.default_tier),
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
