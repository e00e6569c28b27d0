//! Feature encoding for model inference
//!
//! Builds the dense input row the offline training pipeline fed its
//! classifier: one-hot categoricals, age bucket, and derived numeric
//! features (medication count, high-lab flag, age x lab interaction).

use crate::error::InferenceError;
use crate::models::PatientRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper clip for length of stay, in days
pub const MAX_LENGTH_OF_STAY: f64 = 60.0;

/// Upper clip for the comorbidity score
pub const MAX_COMORBIDITY_SCORE: f64 = 10.0;

/// Lab results at or above this value set the `lab_high` flag
pub const LAB_HIGH_THRESHOLD: f64 = 140.0;

/// Numeric columns appended after the one-hot blocks, in order
pub const NUMERIC_COLUMNS: [&str; 7] = [
    "age",
    "lab_result",
    "length_of_stay",
    "comorbidity_score",
    "meds_count",
    "lab_high",
    "age_x_lab",
];

/// Model-side view of a patient, before encoding
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub age: f64,
    pub gender: String,
    pub diagnosis_code: String,
    pub lab_result: f64,
    pub medication: String,
    pub length_of_stay: Option<f64>,
    pub comorbidity_score: Option<f64>,
}

impl From<&PatientRecord> for FeatureRow {
    fn from(record: &PatientRecord) -> Self {
        Self {
            age: record.age as f64,
            gender: record.gender.clone(),
            diagnosis_code: record.diagnosis_code.clone(),
            lab_result: record.lab_result,
            medication: record.medication.clone(),
            length_of_stay: record.length_of_stay.map(|v| v as f64),
            comorbidity_score: record.comorbidity_score.map(|v| v as f64),
        }
    }
}

impl FeatureRow {
    /// Build from a parsed table row.
    ///
    /// Every training column must be present. `age` and `lab_result` must be
    /// numeric; the two count columns may be empty.
    pub fn from_table_row(row: &Map<String, Value>) -> Result<Self, InferenceError> {
        Ok(Self {
            age: required_number(row, "age")?,
            gender: text_cell(row, "gender")?,
            diagnosis_code: text_cell(row, "diagnosis_code")?,
            lab_result: required_number(row, "lab_result")?,
            medication: text_cell(row, "medication")?,
            length_of_stay: optional_number(row, "length_of_stay")?,
            comorbidity_score: optional_number(row, "comorbidity_score")?,
        })
    }

    pub fn medication_count(&self) -> usize {
        if self.medication.is_empty() {
            0
        } else {
            self.medication.split(',').count()
        }
    }
}

fn cell<'a>(row: &'a Map<String, Value>, column: &str) -> Result<&'a Value, InferenceError> {
    row.get(column)
        .ok_or_else(|| InferenceError::Encoding(format!("column '{}' is absent", column)))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn required_number(row: &Map<String, Value>, column: &str) -> Result<f64, InferenceError> {
    let value = cell(row, column)?;
    as_number(value)
        .filter(|v| v.is_finite())
        .ok_or_else(|| InferenceError::Encoding(format!("'{}' is not numeric: {}", column, value)))
}

fn optional_number(row: &Map<String, Value>, column: &str) -> Result<Option<f64>, InferenceError> {
    match cell(row, column)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        value => as_number(value).map(Some).ok_or_else(|| {
            InferenceError::Encoding(format!("'{}' is not numeric: {}", column, value))
        }),
    }
}

fn text_cell(row: &Map<String, Value>, column: &str) -> Result<String, InferenceError> {
    Ok(match cell(row, column)? {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Age bucket; the first bucket includes its lower edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeGroup {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
}

impl AgeGroup {
    fn new(label: &str, lower: f64, upper: f64) -> Self {
        Self {
            label: label.to_string(),
            lower,
            upper,
        }
    }
}

/// Category vocabularies the classifier was trained with.
///
/// Defaults match the training data; an artifact may ship a JSON sidecar
/// overriding any of the three lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSchema {
    pub genders: Vec<String>,
    pub diagnosis_codes: Vec<String>,
    pub age_groups: Vec<AgeGroup>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            genders: to_strings(&["Female", "Male"]),
            diagnosis_codes: to_strings(&[
                "E11", "E78", "F32", "I10", "I25", "I50", "J44", "K21", "M54", "N18",
            ]),
            age_groups: vec![
                AgeGroup::new("age_0_29", 0.0, 30.0),
                AgeGroup::new("age_30_44", 30.0, 45.0),
                AgeGroup::new("age_45_59", 45.0, 60.0),
                AgeGroup::new("age_60_74", 60.0, 75.0),
                AgeGroup::new("age_75+", 75.0, 120.0),
            ],
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl FeatureSchema {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Number of model input columns
    pub fn width(&self) -> usize {
        self.genders.len()
            + self.diagnosis_codes.len()
            + self.age_groups.len()
            + NUMERIC_COLUMNS.len()
    }

    fn age_group_index(&self, age: f64) -> Option<usize> {
        self.age_groups.iter().position(|g| age > g.lower && age <= g.upper).or_else(|| {
            self.age_groups
                .first()
                .filter(|g| age == g.lower)
                .map(|_| 0)
        })
    }

    pub fn encode(&self, row: &FeatureRow) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.width());
        one_hot(&mut out, self.genders.iter().position(|g| *g == row.gender), self.genders.len());
        one_hot(
            &mut out,
            self.diagnosis_codes.iter().position(|d| *d == row.diagnosis_code),
            self.diagnosis_codes.len(),
        );
        one_hot(&mut out, self.age_group_index(row.age), self.age_groups.len());

        let length_of_stay = row
            .length_of_stay
            .unwrap_or(0.0)
            .clamp(0.0, MAX_LENGTH_OF_STAY);
        let comorbidity = row
            .comorbidity_score
            .unwrap_or(0.0)
            .clamp(0.0, MAX_COMORBIDITY_SCORE);
        let lab_high = if row.lab_result >= LAB_HIGH_THRESHOLD { 1.0 } else { 0.0 };

        out.extend_from_slice(&[
            row.age as f32,
            row.lab_result as f32,
            length_of_stay as f32,
            comorbidity as f32,
            row.medication_count() as f32,
            lab_high,
            (row.age * row.lab_result) as f32,
        ]);
        out
    }
}

fn one_hot(out: &mut Vec<f32>, hot: Option<usize>, len: usize) {
    out.extend((0..len).map(|i| if Some(i) == hot { 1.0 } else { 0.0 }));
}
