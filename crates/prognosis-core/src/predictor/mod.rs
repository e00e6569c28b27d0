//! Risk prediction engines

mod features;
mod heuristic;
mod inference;
mod output;

pub use features::{
    AgeGroup, FeatureRow, FeatureSchema, LAB_HIGH_THRESHOLD, MAX_COMORBIDITY_SCORE,
    MAX_LENGTH_OF_STAY, NUMERIC_COLUMNS,
};
pub use heuristic::HeuristicScorer;
pub use inference::{positive_class_probability, OnnxRiskModel};
pub use output::{clamp_probability, OutputFormatter, HEURISTIC_IMPORTANCES, MODEL_IMPORTANCES};

use crate::error::InferenceError;

/// A trained classifier with a `predict_proba`-shaped interface
pub trait RiskModel: Send + Sync {
    /// Positive-class probability for each row, in input order
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError>;

    /// Human-readable identifier for logs
    fn name(&self) -> &str;
}
