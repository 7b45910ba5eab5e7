//! Secret resolution for API keys and storage credentials.
//!
//! A secret can be supplied in three ways, checked in priority order:
//!
//! 1. **Direct value** - for quick local testing (`{"value": "gsk_..."}`)
//! 2. **File reference** - Docker secrets pattern (`{"file": "/run/secrets/groq"}`)
//! 3. **Env var reference** - production deployments (`{"env": "GROQ_API_KEY"}`)
//!
//! Values copied verbatim from `.env.example` style templates
//! (`your_api_key`, `YOUR_SECRET_KEY`, ...) count as absent.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a secret comes from, as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl SecretSource {
    pub fn from_env(name: &str) -> Self {
        Self {
            env: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Resolves the secret, returning `None` when no source is configured,
    /// the referenced env var is unset, or the value is a template placeholder.
    pub fn resolve(&self) -> Result<Option<SecretString>> {
        let resolved = match resolve_secret(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env.as_deref(),
        ) {
            Ok(secret) => Some(secret),
            Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(resolved.filter(|s| !is_placeholder(s.expose_secret())))
    }
}

const PLACEHOLDERS: &[&str] = &[
    "your_aws_access_key",
    "your_aws_secret_key",
    "your_access_key",
    "your_secret_key",
    "your_api_key",
    "your_groq_api_key",
    "your_youtube_api_key",
    "aizayour_key",
    "changeme",
];

/// Returns true for empty values and well-known template placeholders.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || PLACEHOLDERS
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

/// Resolves a secret from multiple sources in priority order:
/// 1. Direct value (if provided and non-empty)
/// 2. File contents (if path provided)
/// 3. Environment variable (if name provided)
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct {
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_string()));
        }
    }

    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            return match fs::read_to_string(&expanded) {
                Ok(content) => Ok(SecretString::from(content.trim().to_string())),
                Err(e) => Err(SecretError::FileReadError {
                    path: expanded,
                    source: e,
                }),
            };
        }
    }

    if let Some(var_name) = env_var {
        if !var_name.is_empty() {
            return match std::env::var(var_name) {
                // Env files often leave a trailing newline behind.
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: var_name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: var_name.to_string(),
                }),
            };
        }
    }

    Err(SecretError::NoSourceProvided)
}

fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
