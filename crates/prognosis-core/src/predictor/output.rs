//! Prediction output formatting
//!
//! Turns a raw probability into a `PredictionResult` with a risk category
//! and a static explanation block.

use crate::models::{Explanations, FeatureImportance, PredictionResult, RiskCategory, ScoredBy};

/// Feature weights reported for heuristic predictions
pub const HEURISTIC_IMPORTANCES: [(&str, f64); 4] = [
    ("age", 0.4),
    ("lab_result", 0.35),
    ("comorbidity_score", 0.2),
    ("length_of_stay", 0.05),
];

/// Feature weights reported for model predictions.
///
/// These differ from the heuristic weights. Deployed clients compare against
/// both sets, so the two tables stay separate.
pub const MODEL_IMPORTANCES: [(&str, f64); 4] = [
    ("age", 0.3),
    ("lab_result", 0.3),
    ("comorbidity_score", 0.2),
    ("length_of_stay", 0.2),
];

/// Formats probabilities into API results
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    scored_by: ScoredBy,
}

impl OutputFormatter {
    pub fn new(scored_by: ScoredBy) -> Self {
        Self { scored_by }
    }

    pub fn heuristic() -> Self {
        Self::new(ScoredBy::Heuristic)
    }

    pub fn model() -> Self {
        Self::new(ScoredBy::Model)
    }

    pub fn format(&self, probability: f64) -> PredictionResult {
        let risk_probability = clamp_probability(probability);
        PredictionResult {
            risk_probability,
            risk_category: RiskCategory::from_probability(risk_probability),
            explanations: self.explanations(),
        }
    }

    /// Static explanation block; independent of the scored input
    pub fn explanations(&self) -> Explanations {
        let table = match self.scored_by {
            ScoredBy::Model => &MODEL_IMPORTANCES,
            ScoredBy::Heuristic => &HEURISTIC_IMPORTANCES,
        };
        Explanations {
            feature_importances: table
                .iter()
                .map(|(feature, importance)| FeatureImportance {
                    feature: (*feature).to_string(),
                    importance: *importance,
                })
                .collect(),
        }
    }
}

/// Clamp into [0, 1]
pub fn clamp_probability(probability: f64) -> f64 {
    probability.clamp(0.0, 1.0)
}
