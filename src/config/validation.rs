//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//! - Check that every HTTPS listener has TLS material
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::net::SessionProtocol;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener {index}: invalid bind address {address:?}")]
    InvalidBindAddress { index: usize, address: String },

    #[error("listener {index}: {address} is configured more than once")]
    DuplicateBindAddress { index: usize, address: String },

    #[error("listener {index}: https requires tls (per listener or default)")]
    MissingTls { index: usize },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),

    #[error("unknown log level {0:?}")]
    InvalidLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, listener) in config.listeners.iter().enumerate() {
        match listener.bind_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if addr.port() != 0 && !seen.insert(addr) {
                    errors.push(ValidationError::DuplicateBindAddress {
                        index,
                        address: listener.bind_address.clone(),
                    });
                }
            }
            Err(_) => errors.push(ValidationError::InvalidBindAddress {
                index,
                address: listener.bind_address.clone(),
            }),
        }
        if listener.protocol == SessionProtocol::Https
            && listener.tls.is_none()
            && config.tls.is_none()
        {
            errors.push(ValidationError::MissingTls { index });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::Zero {
            field: "limits.max_body_size",
        });
    }
    if config.limits.max_concurrent_requests == 0 {
        errors.push(ValidationError::Zero {
            field: "limits.max_concurrent_requests",
        });
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel(observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
