//! Serving state decided once at startup
//!
//! Built from the loader's result before the server accepts requests and
//! shared read-only afterwards. There is no reload path.

use crate::loader::{ArtifactInfo, LoadResult};
use crate::predictor::RiskModel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Operating mode of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingMode {
    /// A trained artifact is loaded; heuristic only on inference errors
    Full,
    /// No artifact; every prediction is heuristic
    Lite,
}

impl ServingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServingMode::Full => "full",
            ServingMode::Lite => "lite",
        }
    }
}

/// Immutable post-startup state
#[derive(Clone)]
pub struct ServingState {
    model: Option<Arc<dyn RiskModel>>,
    artifact: Option<ArtifactInfo>,
}

impl std::fmt::Debug for ServingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServingState")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("artifact", &self.artifact)
            .finish()
    }
}

impl ServingState {
    /// Heuristic-only state
    pub fn lite() -> Self {
        Self {
            model: None,
            artifact: None,
        }
    }

    pub fn with_model(model: Arc<dyn RiskModel>, artifact: Option<ArtifactInfo>) -> Self {
        Self {
            model: Some(model),
            artifact,
        }
    }

    pub fn from_load_result(result: LoadResult) -> Self {
        match result {
            LoadResult::Loaded(loaded) => Self::with_model(loaded.model, Some(loaded.artifact)),
            LoadResult::NotAvailable { .. } => Self::lite(),
        }
    }

    pub fn model(&self) -> Option<&Arc<dyn RiskModel>> {
        self.model.as_ref()
    }

    pub fn artifact(&self) -> Option<&ArtifactInfo> {
        self.artifact.as_ref()
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn mode(&self) -> ServingMode {
        if self.model_loaded() {
            ServingMode::Full
        } else {
            ServingMode::Lite
        }
    }
}
