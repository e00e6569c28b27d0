//! Core data models for the prognosis service

use crate::error::PredictError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Youngest accepted patient age
pub const MIN_AGE: i64 = 0;

/// Oldest accepted patient age
pub const MAX_AGE: i64 = 120;

/// Columns every batch upload must carry
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "age",
    "gender",
    "diagnosis_code",
    "lab_result",
    "medication",
];

/// Probability at or above which a patient is high risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Probability at or above which a patient is medium risk
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

/// Clinical features for a single patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: i64,
    pub gender: String,
    pub diagnosis_code: String,
    pub lab_result: f64,
    /// Comma-joined list of active medications
    pub medication: String,
    #[serde(default = "default_count")]
    pub length_of_stay: Option<i64>,
    #[serde(default = "default_count")]
    pub comorbidity_score: Option<i64>,
}

fn default_count() -> Option<i64> {
    Some(0)
}

impl PatientRecord {
    /// Check the input boundary. Only age is range-checked.
    pub fn validate(&self) -> Result<(), PredictError> {
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(PredictError::Validation(format!(
                "age must be between {} and {}, got {}",
                MIN_AGE, MAX_AGE, self.age
            )));
        }
        Ok(())
    }

    pub fn length_of_stay_or_zero(&self) -> i64 {
        self.length_of_stay.unwrap_or(0)
    }

    pub fn comorbidity_score_or_zero(&self) -> i64 {
        self.comorbidity_score.unwrap_or(0)
    }
}

/// Risk bucket derived from a probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskCategory::High
        } else if probability >= MEDIUM_RISK_THRESHOLD {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Static feature weighting attached to every prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanations {
    pub feature_importances: Vec<FeatureImportance>,
}

/// Readmission risk for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub risk_probability: f64,
    pub risk_category: RiskCategory,
    pub explanations: Explanations,
}

/// Which inference path produced a result. Never part of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoredBy {
    Model,
    Heuristic,
}

impl ScoredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoredBy::Model => "model",
            ScoredBy::Heuristic => "heuristic",
        }
    }
}

/// One output row of a batch: original columns in upload order, then the scores
pub type BatchRow = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchRow>,
}
