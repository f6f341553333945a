//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - JSON output for production, human-readable for development
//! - Initialisation is idempotent so tests and binaries can both call it

use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

static INITIALISED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Default directive set used when `RUST_LOG` is not present.
pub fn default_filter(level: &str) -> String {
    format!("thrift_http={level},tower_http=info")
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    if INITIALISED.get().is_some() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = default_filter(&config.log_level);
            EnvFilter::try_new(&directives).map_err(|e| LoggingError::Filter {
                filter: directives,
                reason: e.to_string(),
            })?
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))?;

    let _ = INITIALISED.set(());
    Ok(())
}
