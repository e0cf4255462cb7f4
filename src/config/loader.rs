//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
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

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LoadBalance;

    const SAMPLE: &str = r#"
        [listener]
        bind_address = "127.0.0.1:8080"

        [[servers]]
        id = "s1"
        addr = "127.0.0.1:9001"
        circuit_breaker = { open_to_close_rate = 50, open_to_close_secs = 10, half_to_open_rate = 80, half_to_open_secs = 10, half_traffic_rate = 20 }

        [[servers]]
        id = "s2"
        addr = "127.0.0.1:9002"

        [[clusters]]
        id = "c1"

        [[clusters]]
        id = "c2"
        load_balance = "random"

        [[binds]]
        server = "s1"
        cluster = "c1"

        [[binds]]
        server = "s2"
        cluster = "c2"

        [[apis]]
        name = "all"
        path_prefix = "/"
        nodes = [{ cluster = "c1" }]

        [[routings]]
        name = "canary"
        cluster = "c2"
        headers = [{ name = "x-canary" }]
    "#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.clusters[1].load_balance, LoadBalance::Random);
        let cb = config.servers[0].circuit_breaker.unwrap();
        assert_eq!(cb.open_to_close_rate, 50);
        assert_eq!(cb.half_traffic_rate, 20);
        assert_eq!(config.routings[0].matches.headers[0].name, "x-canary");
        assert!(config.routings[0].matches.headers[0].value.is_none());
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config(
            r#"
            [[binds]]
            server = "ghost"
            cluster = "c1"
            "#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("ghost"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("servers = 3"), Err(ConfigError::Parse(_))));
    }
}
