//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::net::SessionProtocol;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.listeners.is_empty());
        assert_eq!(config.effective_listeners().len(), 1);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(!config.routing.allow_path_override);
    }

    #[test]
    fn parses_listeners_and_tls() {
        let config = parse_config(
            r#"
            [[listeners]]
            bind_address = "127.0.0.1:8080"

            [[listeners]]
            bind_address = "127.0.0.1:8443"
            protocol = "https"

            [tls]
            cert_path = "certs/server.pem"
            key_path = "certs/server.key"

            [limits]
            max_body_size = 4096

            [routing]
            allow_path_override = true
            "#,
        )
        .unwrap();

        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.listeners[1].protocol, SessionProtocol::Https);
        assert_eq!(config.tls.unwrap().key_path, "certs/server.key");
        assert_eq!(config.limits.max_body_size, 4096);
        assert!(config.routing.allow_path_override);
    }

    #[test]
    fn validation_errors_are_surfaced() {
        let err = parse_config(
            r#"
            [[listeners]]
            bind_address = "127.0.0.1:8443"
            protocol = "https"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("https requires tls"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeouts]\nrequest_secs = 5").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.timeouts.request_secs, 5);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
