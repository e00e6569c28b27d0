//! Batch CSV scoring command

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, BatchResponse};
use crate::output::{color_category, format_probability, print_json, OutputFormat};

const CATEGORIES: [&str; 3] = ["High", "Medium", "Low"];

/// Row for the scored patients table
#[derive(Tabled)]
struct ScoredRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Probability")]
    probability: String,
    #[tabled(rename = "Category")]
    category: String,
}

/// Row for the per-category summary
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Patients")]
    count: usize,
}

/// Upload a CSV file and print the scored rows
pub async fn score_file(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let content = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let response: BatchResponse = client
        .upload_csv("predict/batch", &filename, content)
        .await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.results.is_empty() {
                println!("{}", "No rows in upload".yellow());
                return Ok(());
            }

            let rows: Vec<ScoredRow> = response
                .results
                .iter()
                .enumerate()
                .map(|(i, row)| ScoredRow {
                    index: i + 1,
                    patient: patient_label(row),
                    probability: row
                        .get("risk_probability")
                        .and_then(Value::as_f64)
                        .map(format_probability)
                        .unwrap_or_default(),
                    category: color_category(category_of(row)),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
            println!();

            println!("{}", "Summary".bold());
            let summary: Vec<SummaryRow> = summarize(&response.results)
                .into_iter()
                .map(|(category, count)| SummaryRow {
                    category: color_category(category),
                    count,
                })
                .collect();
            println!("{}", Table::new(summary).with(Style::rounded()).to_string());
        }
    }

    Ok(())
}

fn category_of(row: &Map<String, Value>) -> &str {
    row.get("risk_category")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Patient identifier if the upload carried one
fn patient_label(row: &Map<String, Value>) -> String {
    match row.get("patient_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Count rows per risk category, highest risk first
fn summarize(results: &[Map<String, Value>]) -> Vec<(&'static str, usize)> {
    CATEGORIES
        .iter()
        .map(|c| (*c, results.iter().filter(|r| category_of(r) == *c).count()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_summarize_counts_each_category() {
        let results = vec![
            row(json!({"risk_category": "High"})),
            row(json!({"risk_category": "Low"})),
            row(json!({"risk_category": "High"})),
        ];
        assert_eq!(
            summarize(&results),
            vec![("High", 2), ("Medium", 0), ("Low", 1)]
        );
    }

    #[test]
    fn test_patient_label() {
        assert_eq!(patient_label(&row(json!({"patient_id": 7}))), "7");
        assert_eq!(patient_label(&row(json!({"patient_id": "p-7"}))), "p-7");
        assert_eq!(patient_label(&row(json!({"age": 50}))), "-");
    }
}
