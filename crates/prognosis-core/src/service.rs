//! Prediction service
//!
//! Dispatches each request to the trained model when one is loaded and to
//! the heuristic otherwise. A model failure is returned as a typed error
//! and the caller re-serves the same request with the heuristic; the
//! response schema is identical on both paths.

use crate::batch::{append_scores, decode_upload, is_csv_filename, CsvTable};
use crate::error::{InferenceError, PredictError};
use crate::models::{BatchResponse, BatchRow, PatientRecord, PredictionResult, RiskCategory, ScoredBy};
use crate::observability::{AppMetrics, StructuredLogger};
use crate::predictor::{FeatureRow, HeuristicScorer, OutputFormatter, RiskModel};
use crate::state::ServingState;
use std::sync::Arc;
use std::time::Instant;

const SINGLE_ENDPOINT: &str = "single";
const BATCH_ENDPOINT: &str = "batch";

/// Why the model path could not serve a batch
#[derive(Debug)]
enum ModelBatchError {
    /// The upload itself is wrong; surfaced to the caller
    Rejected(PredictError),
    /// The model path failed; the heuristic takes over
    Inference(InferenceError),
}

impl From<InferenceError> for ModelBatchError {
    fn from(e: InferenceError) -> Self {
        ModelBatchError::Inference(e)
    }
}

#[derive(Clone)]
pub struct PredictionService {
    state: Arc<ServingState>,
    metrics: AppMetrics,
    logger: StructuredLogger,
}

impl PredictionService {
    pub fn new(state: Arc<ServingState>, metrics: AppMetrics, logger: StructuredLogger) -> Self {
        Self {
            state,
            metrics,
            logger,
        }
    }

    pub fn state(&self) -> &ServingState {
        &self.state
    }

    /// Score one patient
    pub fn predict_single(&self, record: &PatientRecord) -> Result<PredictionResult, PredictError> {
        if let Err(e) = record.validate() {
            self.reject(SINGLE_ENDPOINT, "validation", &e);
            return Err(e);
        }

        let start = Instant::now();
        let (result, scored_by) = match self.state.model() {
            Some(model) => match score_with_model(model.as_ref(), record) {
                Ok(result) => (result, ScoredBy::Model),
                Err(e) => {
                    self.fall_back(SINGLE_ENDPOINT, &e);
                    (HeuristicScorer::score_record(record), ScoredBy::Heuristic)
                }
            },
            None => (HeuristicScorer::score_record(record), ScoredBy::Heuristic),
        };

        self.metrics.inc_predictions(scored_by, 1);
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        Ok(result)
    }

    /// Score every row of an uploaded CSV file.
    ///
    /// Either all rows are scored by the model or all by the heuristic.
    pub fn predict_batch(&self, content: &[u8], filename: &str) -> Result<BatchResponse, PredictError> {
        if !is_csv_filename(filename) {
            let e = PredictError::NotCsv;
            self.reject(BATCH_ENDPOINT, "not_csv", &e);
            return Err(e);
        }

        let start = Instant::now();
        let text = decode_upload(content);

        if let Some(model) = self.state.model() {
            match score_table_with_model(model.as_ref(), &text) {
                Ok(results) => return Ok(self.finish_batch(results, ScoredBy::Model, start)),
                Err(ModelBatchError::Rejected(e)) => {
                    self.reject(BATCH_ENDPOINT, "missing_columns", &e);
                    return Err(e);
                }
                Err(ModelBatchError::Inference(e)) => self.fall_back(BATCH_ENDPOINT, &e),
            }
        }

        match score_table_with_heuristic(&text) {
            Ok(results) => Ok(self.finish_batch(results, ScoredBy::Heuristic, start)),
            Err(e) => {
                let reason = match e {
                    PredictError::MissingColumns(_) => "missing_columns",
                    _ => "unreadable_csv",
                };
                self.reject(BATCH_ENDPOINT, reason, &e);
                Err(e)
            }
        }
    }

    fn finish_batch(&self, results: Vec<BatchRow>, scored_by: ScoredBy, start: Instant) -> BatchResponse {
        let elapsed = start.elapsed();
        self.metrics.inc_predictions(scored_by, results.len() as u64);
        self.metrics.observe_batch_rows(results.len());
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        self.logger
            .log_batch_scored(results.len(), scored_by, elapsed.as_millis());
        BatchResponse { results }
    }

    fn fall_back(&self, endpoint: &str, error: &InferenceError) {
        self.metrics.inc_fallbacks(endpoint);
        self.logger.log_fallback(endpoint, &error.to_string());
    }

    fn reject(&self, endpoint: &str, reason: &str, error: &PredictError) {
        self.metrics.inc_rejected(reason);
        self.logger.log_rejected(endpoint, &error.to_string());
    }
}

fn checked_probability(probability: f64) -> Result<f64, InferenceError> {
    if probability.is_finite() && (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(InferenceError::InvalidOutput(format!(
            "probability {} outside [0, 1]",
            probability
        )))
    }
}

fn score_with_model(model: &dyn RiskModel, record: &PatientRecord) -> Result<PredictionResult, InferenceError> {
    let row = FeatureRow::from(record);
    let probabilities = model.predict_proba(std::slice::from_ref(&row))?;
    let probability = match probabilities.as_slice() {
        [p] => checked_probability(*p)?,
        other => {
            return Err(InferenceError::InvalidOutput(format!(
                "expected 1 probability, got {}",
                other.len()
            )))
        }
    };
    Ok(OutputFormatter::model().format(probability))
}

fn score_table_with_model(model: &dyn RiskModel, text: &str) -> Result<Vec<BatchRow>, ModelBatchError> {
    let table = CsvTable::parse(text).map_err(|e| InferenceError::Encoding(e.to_string()))?;

    let missing = table.missing_columns();
    if !missing.is_empty() {
        return Err(ModelBatchError::Rejected(PredictError::MissingColumns(missing)));
    }
    if let Some(index) = table.first_overlong_record() {
        return Err(InferenceError::Encoding(format!(
            "record {} has more fields than the header",
            index + 1
        ))
        .into());
    }

    let mut rows = table.typed_rows();
    let features = rows
        .iter()
        .map(FeatureRow::from_table_row)
        .collect::<Result<Vec<_>, _>>()?;
    let probabilities = model.predict_proba(&features)?;
    if probabilities.len() != rows.len() {
        return Err(InferenceError::InvalidOutput(format!(
            "expected {} probabilities, got {}",
            rows.len(),
            probabilities.len()
        ))
        .into());
    }

    for (row, probability) in rows.iter_mut().zip(probabilities) {
        let probability = checked_probability(probability)?;
        append_scores(row, probability, RiskCategory::from_probability(probability));
    }
    Ok(rows)
}

fn score_table_with_heuristic(text: &str) -> Result<Vec<BatchRow>, PredictError> {
    let table = CsvTable::parse(text).map_err(|e| PredictError::Csv(e.to_string()))?;

    let missing = table.missing_columns();
    if !missing.is_empty() {
        return Err(PredictError::MissingColumns(missing));
    }

    let mut rows = table.text_rows();
    for row in rows.iter_mut() {
        let result = HeuristicScorer::score_row(row);
        append_scores(row, result.risk_probability, result.risk_category);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{FeatureSchema, OnnxRiskModel, HEURISTIC_IMPORTANCES};
    use serde_json::{json, Value};

    /// Returns a fixed probability for every row
    struct FixedModel(f64);

    impl RiskModel for FixedModel {
        fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError> {
            Ok(vec![self.0; rows.len()])
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Probability grows with age so row order is observable
    struct AgeModel;

    impl RiskModel for AgeModel {
        fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError> {
            Ok(rows.iter().map(|r| r.age / 100.0).collect())
        }

        fn name(&self) -> &str {
            "age"
        }
    }

    struct FailingModel;

    impl RiskModel for FailingModel {
        fn predict_proba(&self, _rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError> {
            Err(InferenceError::Runtime("simulated failure".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn service_with(model: Option<Arc<dyn RiskModel>>) -> PredictionService {
        let state = match model {
            Some(m) => ServingState::with_model(m, None),
            None => ServingState::lite(),
        };
        PredictionService::new(
            Arc::new(state),
            AppMetrics::new(),
            StructuredLogger::new("service-test"),
        )
    }

    fn record() -> PatientRecord {
        PatientRecord {
            age: 60,
            gender: "Female".to_string(),
            diagnosis_code: "I10".to_string(),
            lab_result: 120.0,
            medication: "Aspirin".to_string(),
            length_of_stay: Some(3),
            comorbidity_score: Some(0),
        }
    }

    const FULL_CSV: &str = "age,gender,diagnosis_code,lab_result,medication,length_of_stay,comorbidity_score\n\
                            30,Male,E11,100,Metformin,2,1\n\
                            90,Female,I50,180,\"Diuretic,Statins\",9,4\n\
                            55,Female,J44,120,Aspirin,0,0\n";

    #[test]
    fn test_lite_mode_uses_heuristic() {
        let result = service_with(None).predict_single(&record()).unwrap();
        assert!((result.risk_probability - 0.5).abs() < 1e-12);
        assert_eq!(result.risk_category, RiskCategory::Medium);
        assert_eq!(
            result.explanations.feature_importances[0].importance,
            HEURISTIC_IMPORTANCES[0].1
        );
    }

    #[test]
    fn test_model_path_result() {
        let result = service_with(Some(Arc::new(FixedModel(0.81))))
            .predict_single(&record())
            .unwrap();
        assert_eq!(result.risk_probability, 0.81);
        assert_eq!(result.risk_category, RiskCategory::High);
        assert_eq!(result.explanations.feature_importances[3].importance, 0.2);
    }

    #[test]
    fn test_model_failure_falls_back_with_same_schema() {
        let model_result = service_with(Some(Arc::new(FixedModel(0.3))))
            .predict_single(&record())
            .unwrap();
        let fallback = service_with(Some(Arc::new(FailingModel)))
            .predict_single(&record())
            .unwrap();

        assert_eq!(fallback, HeuristicScorer::score_record(&record()));

        let a = serde_json::to_value(&model_result).unwrap();
        let b = serde_json::to_value(&fallback).unwrap();
        let keys = |v: &serde_json::Value| -> Vec<String> {
            v.as_object().unwrap().keys().cloned().collect()
        };
        assert_eq!(keys(&a), keys(&b));
        assert_eq!(
            a["explanations"]["feature_importances"].as_array().unwrap().len(),
            b["explanations"]["feature_importances"].as_array().unwrap().len()
        );
    }

    #[test]
    fn test_out_of_range_model_output_falls_back() {
        let result = service_with(Some(Arc::new(FixedModel(1.7))))
            .predict_single(&record())
            .unwrap();
        assert_eq!(result, HeuristicScorer::score_record(&record()));
    }

    #[test]
    fn test_invalid_age_is_rejected_on_both_paths() {
        let mut bad = record();
        bad.age = 130;
        assert!(service_with(None).predict_single(&bad).unwrap_err().is_validation());
        assert!(service_with(Some(Arc::new(FixedModel(0.5))))
            .predict_single(&bad)
            .is_err());
    }

    #[test]
    fn test_batch_rejects_non_csv_name() {
        for service in [service_with(None), service_with(Some(Arc::new(FixedModel(0.5))))] {
            let err = service.predict_batch(FULL_CSV.as_bytes(), "patients.txt").unwrap_err();
            assert_eq!(err, PredictError::NotCsv);
        }
    }

    #[test]
    fn test_batch_missing_medication_on_both_paths() {
        let csv = "age,gender,diagnosis_code,lab_result\n60,Male,I10,120\n";
        for service in [
            service_with(None),
            service_with(Some(Arc::new(FixedModel(0.5)))),
            service_with(Some(Arc::new(FailingModel))),
        ] {
            let err = service.predict_batch(csv.as_bytes(), "p.csv").unwrap_err();
            assert_eq!(err, PredictError::MissingColumns(vec!["medication".to_string()]));
            assert!(err.to_string().contains("medication"));
        }
    }

    #[test]
    fn test_batch_model_path_preserves_order_and_types() {
        let response = service_with(Some(Arc::new(AgeModel)))
            .predict_batch(FULL_CSV.as_bytes(), "patients.CSV")
            .unwrap();
        assert_eq!(response.results.len(), 3);

        let ages: Vec<i64> = response
            .results
            .iter()
            .map(|r| r["age"].as_i64().unwrap())
            .collect();
        assert_eq!(ages, vec![30, 90, 55]);

        assert_eq!(response.results[0]["risk_probability"], json!(0.3));
        assert_eq!(response.results[0]["risk_category"], json!("Low"));
        assert_eq!(response.results[1]["risk_category"], json!("High"));
        assert_eq!(response.results[2]["risk_category"], json!("Medium"));
    }

    #[test]
    fn test_batch_heuristic_path_keeps_text_cells() {
        let response = service_with(None)
            .predict_batch(FULL_CSV.as_bytes(), "patients.csv")
            .unwrap();
        let first = &response.results[0];
        assert_eq!(first["age"], json!("30"));
        assert_eq!(first["medication"], json!("Metformin"));

        let expected = HeuristicScorer::probability(30.0, 100.0, 1.0, 2.0);
        assert_eq!(first["risk_probability"].as_f64().unwrap(), expected);
        assert_eq!(response.results[1]["medication"], json!("Diuretic,Statins"));
    }

    #[test]
    fn test_batch_model_failure_falls_back_for_whole_table() {
        let lite = service_with(None)
            .predict_batch(FULL_CSV.as_bytes(), "patients.csv")
            .unwrap();
        let failed = service_with(Some(Arc::new(FailingModel)))
            .predict_batch(FULL_CSV.as_bytes(), "patients.csv")
            .unwrap();
        assert_eq!(lite, failed);
    }

    #[test]
    fn test_batch_without_optional_columns_falls_back() {
        let csv = "age,gender,diagnosis_code,lab_result,medication\n60,Male,I10,120,Aspirin\n";
        let response = service_with(Some(Arc::new(FixedModel(0.9))))
            .predict_batch(csv.as_bytes(), "p.csv")
            .unwrap();
        // scored by the heuristic, so cells stay text
        assert_eq!(response.results[0]["age"], json!("60"));
        assert_eq!(response.results[0]["risk_probability"], json!(0.5));
    }

    #[test]
    fn test_empty_batch_returns_no_rows() {
        let csv = "age,gender,diagnosis_code,lab_result,medication\n";
        let response = service_with(None).predict_batch(csv.as_bytes(), "p.csv").unwrap();
        assert!(response.results.is_empty());
    }

    /// logit = 0.5 * comorbidity + lab_high - 0.5 * meds_count
    fn linear_model() -> Arc<dyn RiskModel> {
        let bytes = include_bytes!("../tests/fixtures/linear_risk.onnx");
        Arc::new(OnnxRiskModel::from_bytes(bytes, FeatureSchema::default(), "linear_risk").unwrap())
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_onnx_model_single_prediction() {
        let result = service_with(Some(linear_model()))
            .predict_single(&record())
            .unwrap();

        assert!((result.risk_probability - sigmoid(-0.5)).abs() < 1e-5);
        assert_eq!(result.risk_category, RiskCategory::Low);
        let weights: Vec<f64> = result
            .explanations
            .feature_importances
            .iter()
            .map(|f| f.importance)
            .collect();
        assert_eq!(weights, vec![0.3, 0.3, 0.2, 0.2]);
    }

    #[test]
    fn test_onnx_model_batch() {
        let csv = "patient_id,age,gender,diagnosis_code,lab_result,medication,length_of_stay,comorbidity_score\n\
                   1,30,Male,E11,100,Metformin,2,1\n\
                   2,90,Female,I50,180,\"Diuretic,Statins\",9,4\n\
                   3,55,Female,J44,120,Aspirin,,2\n\
                   4,70,Male,I10,125,\"Aspirin,Statins,Insulin\",3,0\n";
        let response = service_with(Some(linear_model()))
            .predict_batch(csv.as_bytes(), "patients.csv")
            .unwrap();

        let ids: Vec<i64> = response
            .results
            .iter()
            .map(|r| r["patient_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let expected = [
            (sigmoid(0.0), "Medium"),
            (sigmoid(2.0), "High"),
            (sigmoid(0.5), "Medium"),
            (sigmoid(-1.5), "Low"),
        ];
        for (row, (probability, category)) in response.results.iter().zip(expected) {
            let p = row["risk_probability"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&p));
            assert!((p - probability).abs() < 1e-5, "got {}, expected {}", p, probability);
            assert_eq!(row["risk_category"], json!(category));
        }

        // integer column with a gap is inferred as float
        assert_eq!(response.results[0]["length_of_stay"], json!(2.0));
        assert_eq!(response.results[2]["length_of_stay"], Value::Null);
        assert_eq!(response.results[1]["medication"], json!("Diuretic,Statins"));
    }
}
