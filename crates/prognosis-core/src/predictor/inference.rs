//! ONNX inference using tract
//!
//! Runs the exported readmission classifier. The graph takes a `[1, width]`
//! f32 row and emits class probabilities; the positive class is read from the
//! first f32 output.

use super::features::{FeatureRow, FeatureSchema};
use super::RiskModel;
use crate::error::InferenceError;
use crate::observability::AppMetrics;
use anyhow::{Context, Result};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Per-row latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Trained classifier loaded from an ONNX artifact
pub struct OnnxRiskModel {
    plan: TractModel,
    schema: FeatureSchema,
    name: String,
    metrics: AppMetrics,
}

impl OnnxRiskModel {
    /// Parse and optimise a model from bytes
    pub fn from_bytes(model_bytes: &[u8], schema: FeatureSchema, name: impl Into<String>) -> Result<Self> {
        let plan = Self::load_plan(model_bytes, schema.width())?;
        Ok(Self {
            plan,
            schema,
            name: name.into(),
            metrics: AppMetrics::new(),
        })
    }

    fn load_plan(model_bytes: &[u8], width: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, width]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn row_to_tensor(&self, row: &FeatureRow) -> Result<Tensor, InferenceError> {
        let data = self.schema.encode(row);
        let array = tract_ndarray::Array2::from_shape_vec((1, self.schema.width()), data)
            .map_err(|e| InferenceError::Encoding(e.to_string()))?;
        Ok(array.into())
    }

    fn run_row(&self, row: &FeatureRow) -> Result<f64, InferenceError> {
        let start = Instant::now();
        let input = self.row_to_tensor(row)?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        let probabilities = outputs
            .iter()
            .find(|t| t.datum_type() == DatumType::F32)
            .ok_or_else(|| InferenceError::InvalidOutput("no f32 output".to_string()))?;
        let probability = positive_class_probability(probabilities)?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.metrics.inc_slow_inferences();
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(probability)
    }

}

impl RiskModel for OnnxRiskModel {
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError> {
        rows.iter().map(|row| self.run_row(row)).collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Read the positive-class probability from a single-row output.
///
/// Two-column outputs are `[p(negative), p(positive)]`; a single column is
/// taken as a sigmoid output.
pub fn positive_class_probability(output: &Tensor) -> Result<f64, InferenceError> {
    let view = output
        .to_array_view::<f32>()
        .map_err(|e| InferenceError::InvalidOutput(e.to_string()))?;
    let values: Vec<f32> = view.iter().copied().collect();

    let probability = f64::from(match values.len() {
        0 => return Err(InferenceError::InvalidOutput("empty output".to_string())),
        1 => values[0],
        _ => values[1],
    });

    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(InferenceError::InvalidOutput(format!(
            "probability {} outside [0, 1]",
            probability
        )));
    }
    Ok(probability)
}
