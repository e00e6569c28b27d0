//! Fixed-formula risk scorer
//!
//! Always available. Serves every request in lite mode and every request
//! whose model inference failed.

use super::output::OutputFormatter;
use crate::models::{PatientRecord, PredictionResult};
use serde_json::{Map, Value};
use tracing::warn;

/// Risk before any adjustment
const BASE_RISK: f64 = 0.5;
const AGE_PIVOT: f64 = 60.0;
const AGE_WEIGHT: f64 = 0.002;
const LAB_PIVOT: f64 = 120.0;
const LAB_WEIGHT: f64 = 0.002;
const COMORBIDITY_WEIGHT: f64 = 0.03;
/// Stays longer than this many days add `LONG_STAY_WEIGHT`
const LONG_STAY_DAYS: f64 = 5.0;
const LONG_STAY_WEIGHT: f64 = 0.01;

/// Bounded linear heuristic
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    /// Raw clamped probability
    pub fn probability(age: f64, lab_result: f64, comorbidity_score: f64, length_of_stay: f64) -> f64 {
        let long_stay = if length_of_stay > LONG_STAY_DAYS { 1.0 } else { 0.0 };
        let risk = BASE_RISK
            + AGE_WEIGHT * (age - AGE_PIVOT)
            + LAB_WEIGHT * (lab_result - LAB_PIVOT)
            + COMORBIDITY_WEIGHT * comorbidity_score
            + LONG_STAY_WEIGHT * long_stay;
        risk.clamp(0.0, 1.0)
    }

    pub fn score(
        age: f64,
        lab_result: f64,
        comorbidity_score: f64,
        length_of_stay: f64,
    ) -> PredictionResult {
        let probability = Self::probability(age, lab_result, comorbidity_score, length_of_stay);
        OutputFormatter::heuristic().format(probability)
    }

    pub fn score_record(record: &PatientRecord) -> PredictionResult {
        Self::score(
            record.age as f64,
            coerce_f64(record.lab_result),
            record.comorbidity_score_or_zero() as f64,
            record.length_of_stay_or_zero() as f64,
        )
    }

    /// Score a loosely-typed row; missing, null, empty or unparseable cells count as 0
    pub fn score_row(row: &Map<String, Value>) -> PredictionResult {
        Self::score(
            numeric_cell(row, "age"),
            numeric_cell(row, "lab_result"),
            numeric_cell(row, "comorbidity_score"),
            numeric_cell(row, "length_of_stay"),
        )
    }
}

fn coerce_f64(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

fn numeric_cell(row: &Map<String, Value>, column: &str) -> f64 {
    match row.get(column) {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().map(coerce_f64).unwrap_or(0.0),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return 0.0;
            }
            match trimmed.parse::<f64>() {
                Ok(v) => coerce_f64(v),
                Err(_) => {
                    warn!(column = %column, value = %s, "Unparseable numeric cell, using 0");
                    0.0
                }
            }
        }
        Some(_) => 0.0,
    }
}
