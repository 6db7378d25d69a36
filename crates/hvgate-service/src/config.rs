//! Gateway configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hvgate_core::PersonSelector;
use serde::Deserialize;

use crate::templates;

/// Gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote service settings.
    pub service: ServiceConfig,
    /// Channel bridge settings.
    pub bridge: BridgeConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// This checks:
    /// - Service host, master application id and credentials path are set
    /// - Request timeout is within 1..=300 seconds
    /// - Queue capacity is at least 1
    /// - Configured channels are known and listed once
    ///
    /// # Example
    ///
    /// ```
    /// use hvgate_service::Config;
    ///
    /// let mut config = Config::default();
    /// config.service.master_app_id = "00000000-0000-0000-0000-000000000000".to_string();
    /// config.validate().expect("defaults plus an app id are valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.service.validate());
        errors.extend(self.bridge.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Remote service settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service host name (port 443 is implied).
    pub host: String,
    /// Public application id used to provision this gateway.
    pub master_app_id: String,
    /// Where the provisioned application instance is stored.
    pub credentials_path: PathBuf,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Person to act for: display name, person id, or index.
    ///
    /// A value made only of digits, or `#N`, is an index into the
    /// authorized persons. Prefix with `name:` to select a person whose
    /// name or id is itself all digits, e.g. `name:1984`.
    pub person: Option<String>,
}

/// Default service host.
pub const DEFAULT_HOST: &str = "platform.healthvault-ppe.com";
/// Minimum request timeout in seconds.
pub const MIN_REQUEST_TIMEOUT: u64 = 1;
/// Maximum request timeout in seconds.
pub const MAX_REQUEST_TIMEOUT: u64 = 300;

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            master_app_id: String::new(),
            credentials_path: default_credentials_path(),
            request_timeout_secs: 20,
            person: None,
        }
    }
}

impl ServiceConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Which person to select after the handshake. Defaults to the first.
    pub fn person_selector(&self) -> PersonSelector {
        match self.person.as_deref().map(str::trim) {
            None | Some("") => PersonSelector::Index(0),
            Some(text) => {
                if let Some(name) = text.strip_prefix("name:") {
                    return PersonSelector::Name(name.trim().to_string());
                }
                let index = text.strip_prefix('#').unwrap_or(text);
                match index.parse::<usize>() {
                    Ok(index) => PersonSelector::Index(index),
                    Err(_) => PersonSelector::Name(text.to_string()),
                }
            }
        }
    }

    /// Validate service configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push(ValidationError {
                field: "service.host".to_string(),
                message: "host cannot be empty".to_string(),
            });
        } else if self.host.contains("://") || self.host.contains('/') {
            errors.push(ValidationError {
                field: "service.host".to_string(),
                message: format!(
                    "invalid host '{}': expected a bare host name",
                    self.host
                ),
            });
        }

        if self.master_app_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "service.master_app_id".to_string(),
                message: "master application id cannot be empty".to_string(),
            });
        }

        if self.credentials_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "service.credentials_path".to_string(),
                message: "credentials path cannot be empty".to_string(),
            });
        }

        if !(MIN_REQUEST_TIMEOUT..=MAX_REQUEST_TIMEOUT).contains(&self.request_timeout_secs) {
            errors.push(ValidationError {
                field: "service.request_timeout_secs".to_string(),
                message: format!(
                    "request timeout {} is outside {}..={} seconds",
                    self.request_timeout_secs, MIN_REQUEST_TIMEOUT, MAX_REQUEST_TIMEOUT
                ),
            });
        }

        errors
    }
}

/// Channel bridge settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Observations buffered between the bridge and the upload worker.
    pub queue_capacity: usize,
    /// Retries per upload after a transport failure.
    pub upload_retries: u32,
    /// Channels to forward. All known channels when absent.
    pub channels: Option<Vec<String>>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            upload_retries: 2,
            channels: None,
        }
    }
}

impl BridgeConfig {
    /// Validate bridge configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.queue_capacity == 0 {
            errors.push(ValidationError {
                field: "bridge.queue_capacity".to_string(),
                message: "queue capacity must be at least 1".to_string(),
            });
        }

        if let Some(channels) = &self.channels {
            let mut seen = HashSet::new();
            for (i, channel) in channels.iter().enumerate() {
                let field = format!("bridge.channels[{}]", i);
                if templates::lookup(channel).is_none() {
                    errors.push(ValidationError {
                        field,
                        message: format!(
                            "unknown channel '{}' (known: {})",
                            channel,
                            templates::channel_names().collect::<Vec<_>>().join(", ")
                        ),
                    });
                } else if !seen.insert(channel.as_str()) {
                    errors.push(ValidationError {
                        field,
                        message: format!("duplicate channel '{}'", channel),
                    });
                }
            }
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `service.host` or `bridge.channels[0]`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hvgate")
        .join("gateway.toml")
}

/// Default credential file path.
pub fn default_credentials_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hvgate")
        .join("app-instance")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.service.master_app_id = "11111111-2222-3333-4444-555555555555".to_string();
        config
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.service.host, DEFAULT_HOST);
        assert_eq!(config.service.request_timeout_secs, 20);
        assert_eq!(config.bridge.queue_capacity, 64);
        assert_eq!(config.bridge.upload_retries, 2);
        assert!(config.bridge.channels.is_none());
        assert!(config.service.credentials_path.ends_with("hvgate/app-instance"));
    }

    #[test]
    fn test_default_config_needs_app_id() {
        let result = Config::default().validate();
        match result {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "service.master_app_id");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [service]
            host = "platform.example.com"
            master_app_id = "abc"
            credentials_path = "/var/lib/hvgate/app-instance"
            request_timeout_secs = 30
            person = "Alice"

            [bridge]
            queue_capacity = 8
            upload_retries = 0
            channels = ["oximeter.spo2", "oximeter.pulse"]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.service.host, "platform.example.com");
        assert_eq!(
            config.service.credentials_path,
            PathBuf::from("/var/lib/hvgate/app-instance")
        );
        assert_eq!(config.service.request_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.service.person_selector(),
            PersonSelector::Name("Alice".to_string())
        );
        assert_eq!(config.bridge.queue_capacity, 8);
        assert_eq!(config.bridge.channels.as_ref().map(Vec::len), Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[service]\nmaster_app_id = \"abc\"\n").unwrap();
        assert_eq!(config.service.host, DEFAULT_HOST);
        assert_eq!(config.bridge, BridgeConfig::default());
    }

    #[test]
    fn test_person_selector() {
        let mut service = ServiceConfig::default();
        assert_eq!(service.person_selector(), PersonSelector::Index(0));
        service.person = Some("2".to_string());
        assert_eq!(service.person_selector(), PersonSelector::Index(2));
        service.person = Some(" ".to_string());
        assert_eq!(service.person_selector(), PersonSelector::Index(0));
        service.person = Some("#1".to_string());
        assert_eq!(service.person_selector(), PersonSelector::Index(1));
        service.person = Some("name:1984".to_string());
        assert_eq!(
            service.person_selector(),
            PersonSelector::Name("1984".to_string())
        );
        service.person = Some("#x".to_string());
        assert_eq!(
            service.person_selector(),
            PersonSelector::Name("#x".to_string())
        );
    }

    #[test]
    fn test_service_validation() {
        let service = ServiceConfig {
            host: "".to_string(),
            master_app_id: "".to_string(),
            credentials_path: PathBuf::new(),
            request_timeout_secs: 0,
            person: None,
        };
        let errors = service.validate();
        assert_eq!(errors.len(), 4);

        let service = ServiceConfig {
            host: "https://platform.example.com".to_string(),
            master_app_id: "abc".to_string(),
            request_timeout_secs: 301,
            ..Default::default()
        };
        let errors = service.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("bare host name"));
        assert!(errors[1].message.contains("1..=300"));
    }

    #[test]
    fn test_bridge_validation() {
        let bridge = BridgeConfig {
            queue_capacity: 0,
            upload_retries: 2,
            channels: Some(vec![
                "oximeter.pulse".to_string(),
                "unmapped".to_string(),
                "oximeter.pulse".to_string(),
            ]),
        };
        let errors = bridge.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].message.contains("at least 1"));
        assert_eq!(errors[1].field, "bridge.channels[1]");
        assert!(errors[1].message.contains("unknown channel 'unmapped'"));
        assert!(errors[2].message.contains("duplicate"));
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("gateway.toml");
        std::fs::write(
            &config_path,
            r#"
            [service]
            master_app_id = "11111111-2222-3333-4444-555555555555"
            person = "Bob"

            [bridge]
            channels = ["scale.weight"]
            "#,
        )
        .unwrap();

        let mut expected = valid_config();
        expected.service.person = Some("Bob".to_string());
        expected.bridge.channels = Some(vec!["scale.weight".to_string()]);

        let loaded = Config::load(&config_path).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/gateway.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("hvgate/gateway.toml"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let error = ConfigError::Validation(vec![
            ValidationError {
                field: "service.host".to_string(),
                message: "host cannot be empty".to_string(),
            },
            ValidationError {
                field: "bridge.queue_capacity".to_string(),
                message: "queue capacity must be at least 1".to_string(),
            },
        ]);
        let display = format!("{}", error);
        assert!(display.contains("service.host"));
        assert!(display.contains("bridge.queue_capacity"));
    }
}
