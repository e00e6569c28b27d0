//! Error types surfaced by the prediction service

use thiserror::Error;

/// Client-facing failures. Model runtime failures never appear here; they are
/// absorbed by the heuristic fallback.
#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("Please upload a CSV file")]
    NotCsv,

    #[error("Missing columns: {}", render_column_list(.0))]
    MissingColumns(Vec<String>),

    #[error("{0}")]
    Validation(String),

    #[error("Could not read CSV: {0}")]
    Csv(String),
}

impl PredictError {
    /// True for errors caused by the request payload rather than the request shape
    pub fn is_validation(&self) -> bool {
        matches!(self, PredictError::Validation(_))
    }
}

/// Failures on the trained-model path
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("feature encoding failed: {0}")]
    Encoding(String),

    #[error("model execution failed: {0}")]
    Runtime(String),

    #[error("model produced an unusable output: {0}")]
    InvalidOutput(String),
}

// Rendered as a Python-style list so existing clients can keep matching on it
fn render_column_list(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| format!("'{}'", c)).collect();
    format!("[{}]", quoted.join(", "))
}
