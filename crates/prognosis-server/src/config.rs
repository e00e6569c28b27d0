//! Server configuration

use anyhow::Result;
use prognosis_core::loader::{ModelConfig, DEFAULT_MAX_MODEL_BYTES, DEFAULT_MODEL_PATH};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Optional config file, looked up in the working directory
const CONFIG_FILE: &str = "prognosis";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Location of the trained ONNX artifact
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Expected hex SHA-256 of the artifact
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// `*` or a comma-separated list of exact origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,

    /// Request body limit, applied to JSON and multipart uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_path() -> String {
    DEFAULT_MODEL_PATH.to_string()
}

fn default_allowed_origins() -> String {
    "*".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_path: default_model_path(),
            model_sha256: None,
            allowed_origins: default_allowed_origins(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Parsed CORS policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return AllowedOrigins::Any;
        }
        AllowedOrigins::List(
            raw.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl ServerConfig {
    /// Load configuration from an optional `prognosis.toml` and the environment.
    ///
    /// Environment names are unprefixed: `MODEL_PATH`, `MODEL_SHA256`,
    /// `ALLOWED_ORIGINS`, `HOST`, `PORT`, `MAX_UPLOAD_BYTES`.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::default())
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid configuration, using defaults");
            ServerConfig::default()
        }))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allowed_origins(&self) -> AllowedOrigins {
        AllowedOrigins::parse(&self.allowed_origins)
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            path: PathBuf::from(&self.model_path),
            expected_sha256: self
                .model_sha256
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            max_model_bytes: DEFAULT_MAX_MODEL_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_origins() {
        assert_eq!(AllowedOrigins::parse("*"), AllowedOrigins::Any);
        assert_eq!(AllowedOrigins::parse(" * "), AllowedOrigins::Any);
    }

    #[test]
    fn test_origin_list_is_trimmed() {
        assert_eq!(
            AllowedOrigins::parse("https://a.example, https://b.example ,,"),
            AllowedOrigins::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.allowed_origins(), AllowedOrigins::Any);
        assert_eq!(config.model_config().path, PathBuf::from("models/model.onnx"));
        assert!(config.model_config().expected_sha256.is_none());
    }

    #[test]
    fn test_blank_checksum_is_ignored() {
        let config = ServerConfig {
            model_sha256: Some("  ".to_string()),
            ..ServerConfig::default()
        };
        assert!(config.model_config().expected_sha256.is_none());
    }
}
