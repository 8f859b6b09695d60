use std::path::Path;

use crate::config::schema::{Config, MAX_RESET_TTL_SECS};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "database_path must not be empty".to_string(),
        });
    }
    if config.upload_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "upload_directory must not be empty".to_string(),
        });
    }

    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "poll_interval_ms must be positive".to_string(),
        });
    }
    if config.default_page_size == 0 {
        return Err(ConfigError::Validation {
            message: "default_page_size must be positive".to_string(),
        });
    }
    if config.password_reset_ttl_secs == 0 || config.password_reset_ttl_secs > MAX_RESET_TTL_SECS {
        return Err(ConfigError::Validation {
            message: format!(
                "password_reset_ttl_secs must be between 1 and {}",
                MAX_RESET_TTL_SECS
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/itemcat/itemcat.db",
            "upload_directory": "/var/lib/itemcat/uploads",
            "poll_interval_ms": 500,
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.database_path, "/var/lib/itemcat/itemcat.db");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.password_reset_ttl_secs, 3600);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert!(config.seed_defaults);
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn test_missing_version_fails_schema() {
        let result = load_config_from_str(r#"{ "database_path": "/x.db" }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_field_fails_schema() {
        let result = load_config_from_str(r#"{ "version": "1.0", "worker_count": 4 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_log_format_fails_schema() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "logging": { "format": "xml" } }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unsupported_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = load_config_from_str(r#"{ "version": "1.0", "poll_interval_ms": 0 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_upload_directory_rejected() {
        let result = load_config_from_str(r#"{ "version": "1.0", "upload_directory": "  " }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ version: ");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "version": "1.0", "seed_defaults": false }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert!(!config.seed_defaults);

        let missing = load_config(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
