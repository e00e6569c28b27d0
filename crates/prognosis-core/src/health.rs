//! Health reporting
//!
//! A pure read of the serving state; the report never fails.

use crate::state::{ServingMode, ServingState};
use serde::{Deserialize, Serialize};

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
    pub mode: ServingMode,
}

impl HealthReport {
    pub fn from_state(state: &ServingState) -> Self {
        Self {
            status: "ok".to_string(),
            model_loaded: state.model_loaded(),
            mode: state.mode(),
        }
    }
}
