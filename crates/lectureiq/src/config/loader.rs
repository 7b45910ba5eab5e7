use std::path::Path;

use crate::config::schema::Config;
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

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.retry.base_delay_secs == 0 {
        return Err(ConfigError::Validation {
            message: "retry.base_delay_secs must be at least 1".to_string(),
        });
    }

    // 2^max_retries multiplies the base delay; keep the schedule in range.
    if config.retry.max_retries > 16 {
        return Err(ConfigError::Validation {
            message: format!(
                "retry.max_retries must be at most 16, got {}",
                config.retry.max_retries
            ),
        });
    }

    if config.generation.flashcard_count == 0 || config.generation.mcq_count == 0 {
        return Err(ConfigError::Validation {
            message: "generation counts must be at least 1".to_string(),
        });
    }

    if config.upload.allowed_extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "upload.allowed_extensions must not be empty".to_string(),
        });
    }

    for ext in &config.upload.allowed_extensions {
        if ext.starts_with('.') || ext.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Validation {
                message: format!(
                    "upload extension '{}' must be lowercase and without a leading dot",
                    ext
                ),
            });
        }
    }

    if let Some(remote) = &config.storage.remote {
        if !remote.endpoint.starts_with("http://") && !remote.endpoint.starts_with("https://") {
            return Err(ConfigError::Validation {
                message: format!(
                    "storage.remote.endpoint must be an http(s) URL: {}",
                    crate::sanitize::redact_url(&remote.endpoint)
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();

        assert!(config.worker_count >= 1);
        assert_eq!(config.storage.upload_directory, "uploads");
        assert!(config.storage.remote.is_none());
        assert_eq!(config.transcription.model, "base");
        assert_eq!(config.generation.flashcard_count, 12);
        assert_eq!(config.generation.mcq_count, 8);
        assert_eq!(config.resources.topic_limit, 3);
        assert_eq!(config.resources.max_total, 5);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_secs, 60);
        assert_eq!(config.upload.max_file_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.generation.api_key.env.as_deref(), Some("GROQ_API_KEY"));
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/lectureiq/lectureiq.db",
            "worker_count": 2,
            "storage": {
                "upload_directory": "/srv/uploads",
                "remote": {
                    "endpoint": "https://objects.example.com",
                    "bucket": "lectures",
                    "access_token": { "env": "OBJECT_TOKEN" }
                }
            },
            "retry": { "max_retries": 5, "base_delay_secs": 30 },
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.worker_count, 2);
        let remote = config.storage.remote.unwrap();
        assert_eq!(remote.bucket, "lectures");
        assert_eq!(remote.access_token.env.as_deref(), Some("OBJECT_TOKEN"));
        assert_eq!(remote.timeout_secs, 120);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unsupported_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_schema_rejects_unknown_fields() {
        let result = load_config_from_str(r#"{ "version": "1.0", "celery": true }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_zero_workers() {
        let result = load_config_from_str(r#"{ "version": "1.0", "worker_count": 0 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "upload": { "allowed_extensions": [".mp3"] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "storage": { "remote": { "endpoint": "s3://bucket", "bucket": "b" } } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_rejects_excessive_retries() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "retry": { "max_retries": 40 } }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/lectureiq.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_default_config_roundtrips_through_validation() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(load_config_from_str(&json).is_ok());
    }
}
