//! Configuration loading and validation

use super::types::Config;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A setting has an unusable value
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Load configuration from `path`, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut config: Config = toml::from_str(&contents)?;
    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Apply `CMGR_*` environment variables on top of file settings
fn apply_env_overrides(config: &mut Config) {
    let overrides: [(&str, &mut String); 5] = [
        ("CMGR_ENDPOINT", &mut config.endpoint),
        ("CMGR_AGENT_NAME", &mut config.agent_name),
        ("CMGR_AGENT_ID", &mut config.agent_id),
        ("CMGR_SECRET_KEY", &mut config.secret_key),
        ("CMGR_TEMPLATE_ID", &mut config.template_id),
    ];

    for (var, slot) in overrides {
        if let Ok(value) = std::env::var(var)
            && !value.is_empty()
        {
            debug!("Applying {var} override");
            *slot = value;
        }
    }
}

/// Reject settings that would make the manager unusable
fn validate(config: &Config) -> Result<(), ConfigError> {
    let endpoint = url::Url::parse(&config.endpoint).map_err(|e| ConfigError::Invalid {
        field: "endpoint",
        reason: e.to_string(),
    })?;
    if !matches!(endpoint.scheme(), "ws" | "wss") {
        return Err(ConfigError::Invalid {
            field: "endpoint",
            reason: format!("unsupported scheme {:?}, expected ws or wss", endpoint.scheme()),
        });
    }

    if config.agent_id.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "agent_id",
            reason: "must not be empty".to_string(),
        });
    }
    if config.secret_key.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "secret_key",
            reason: "must not be empty".to_string(),
        });
    }

    let positive: [(&'static str, u64); 4] = [
        ("status_interval_secs", config.status_interval_secs),
        ("reconnect_interval_secs", config.reconnect_interval_secs),
        ("max_connect_backoff_secs", config.max_connect_backoff_secs),
        ("buffer_size", config.buffer_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const VALID: &str = r#"
endpoint = "ws://127.0.0.1:9000/v1/connect"
agent_name = "edge-01"
agent_id = "agent-1"
secret_key = "s3cret"
template_id = "tmpl-1"
status_interval_secs = 15
buffer_size = 10

[collector]
binary = "/opt/collector/otelcol"
config_path = "/opt/collector/config.yaml"
"#;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("manager.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn clear_env() {
        for var in [
            "CMGR_ENDPOINT",
            "CMGR_AGENT_NAME",
            "CMGR_AGENT_ID",
            "CMGR_SECRET_KEY",
            "CMGR_TEMPLATE_ID",
        ] {
            // SAFETY: tests touching the environment are serialized.
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_load_valid_config() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let config = load_config(&write_config(&dir, VALID)).unwrap();

        assert_eq!(config.endpoint, "ws://127.0.0.1:9000/v1/connect");
        assert_eq!(config.agent_name, "edge-01");
        assert_eq!(config.status_interval_secs, 15);
        assert_eq!(config.buffer_size, 10);
        assert_eq!(config.reconnect_interval_secs, 1800);
        assert_eq!(config.max_connect_backoff_secs, 300);
        assert_eq!(
            config.collector.config_path,
            PathBuf::from("/opt/collector/config.yaml")
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        // SAFETY: tests touching the environment are serialized.
        unsafe {
            std::env::set_var("CMGR_SECRET_KEY", "from-env");
            std::env::set_var("CMGR_AGENT_ID", "");
        }

        let config = load_config(&write_config(&dir, VALID)).unwrap();
        clear_env();

        assert_eq!(config.secret_key, "from-env");
        assert_eq!(config.agent_id, "agent-1");
    }

    #[test]
    #[serial]
    fn test_missing_file() {
        clear_env();
        let err = load_config(Path::new("/nonexistent/manager.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    #[serial]
    fn test_malformed_toml() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let err = load_config(&write_config(&dir, "endpoint = [")).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_validate_rejects_http_scheme() {
        let config = Config {
            endpoint: "http://localhost".to_string(),
            agent_id: "a".to_string(),
            secret_key: "s".to_string(),
            ..Default::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "endpoint", .. }));
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config {
            agent_id: "a".to_string(),
            ..Default::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "secret_key", .. }));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let config = Config {
            agent_id: "a".to_string(),
            secret_key: "s".to_string(),
            buffer_size: 0,
            ..Default::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "buffer_size", .. }));
    }
}
