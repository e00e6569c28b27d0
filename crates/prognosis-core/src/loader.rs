//! One-shot model artifact loader
//!
//! Runs once before the server accepts requests. Every failure (missing
//! file, checksum mismatch, bad feature sidecar, unparseable graph) leaves
//! the service in lite mode; nothing here is fatal.

use crate::observability::StructuredLogger;
use crate::predictor::{FeatureSchema, OnnxRiskModel, RiskModel};
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default artifact location, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "models/model.onnx";

/// Sidecar extension carrying the feature vocabularies
pub const SCHEMA_SIDECAR_EXTENSION: &str = "features.json";

/// Largest artifact the loader will read
pub const DEFAULT_MAX_MODEL_BYTES: u64 = 256 * 1024 * 1024;

/// Where and how to load the artifact
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Hex SHA-256 the artifact must match, if set
    pub expected_sha256: Option<String>,
    pub max_model_bytes: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            expected_sha256: None,
            max_model_bytes: DEFAULT_MAX_MODEL_BYTES,
        }
    }
}

impl ModelConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Metadata about the artifact that was loaded
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub checksum: String,
    pub size_bytes: usize,
    pub input_width: usize,
    pub loaded_at: i64,
}

pub struct LoadedModel {
    pub model: Arc<dyn RiskModel>,
    pub artifact: ArtifactInfo,
}

/// Outcome of the startup load
pub enum LoadResult {
    Loaded(LoadedModel),
    NotAvailable { reason: String },
}

impl LoadResult {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadResult::Loaded(_))
    }

    /// Why no model is available, if none is
    pub fn reason(&self) -> Option<&str> {
        match self {
            LoadResult::Loaded(_) => None,
            LoadResult::NotAvailable { reason } => Some(reason),
        }
    }
}

pub struct ModelLoader {
    config: ModelConfig,
    logger: StructuredLogger,
}

impl ModelLoader {
    pub fn new(config: ModelConfig, logger: StructuredLogger) -> Self {
        Self { config, logger }
    }

    /// Attempt the load. Never fails; failures become `NotAvailable`.
    pub fn load(&self) -> LoadResult {
        match self.try_load() {
            Ok(loaded) => {
                self.logger.log_model_loaded(&loaded.artifact);
                LoadResult::Loaded(loaded)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                let path = self.config.path.display().to_string();
                self.logger.log_model_unavailable(&path, &reason);
                LoadResult::NotAvailable { reason }
            }
        }
    }

    fn try_load(&self) -> Result<LoadedModel> {
        let path = &self.config.path;
        if !path.is_file() {
            anyhow::bail!("artifact not found at {}", path.display());
        }

        let size = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        if size > self.config.max_model_bytes {
            anyhow::bail!(
                "artifact is {} bytes, limit is {}",
                size,
                self.config.max_model_bytes
            );
        }

        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let checksum = sha256_hex(&bytes);
        if let Some(expected) = &self.config.expected_sha256 {
            if !expected.trim().eq_ignore_ascii_case(&checksum) {
                anyhow::bail!("checksum mismatch: expected {}, got {}", expected.trim(), checksum);
            }
        }

        let schema = load_schema(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let model = OnnxRiskModel::from_bytes(&bytes, schema, name)?;
        let input_width = model.schema().width();

        Ok(LoadedModel {
            model: Arc::new(model),
            artifact: ArtifactInfo {
                path: path.clone(),
                checksum,
                size_bytes: bytes.len(),
                input_width,
                loaded_at: chrono::Utc::now().timestamp(),
            },
        })
    }
}

/// Sidecar path for an artifact: `model.onnx` -> `model.features.json`
pub fn schema_sidecar_path(model_path: &Path) -> PathBuf {
    model_path.with_extension(SCHEMA_SIDECAR_EXTENSION)
}

fn load_schema(model_path: &Path) -> Result<FeatureSchema> {
    let sidecar = schema_sidecar_path(model_path);
    if !sidecar.is_file() {
        debug!(path = %sidecar.display(), "No feature sidecar, using training defaults");
        return Ok(FeatureSchema::default());
    }
    let json = fs::read_to_string(&sidecar)
        .with_context(|| format!("Failed to read {}", sidecar.display()))?;
    FeatureSchema::from_json(&json)
        .with_context(|| format!("Invalid feature sidecar {}", sidecar.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
