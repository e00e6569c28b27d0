//! Single-patient prediction command

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, PatientRecord, PredictionResult};
use crate::output::{color_category, format_probability, print_json, OutputFormat};

/// Row for the feature importance table
#[derive(Tabled)]
struct ImportanceRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

/// Score one patient
pub async fn predict(client: &ApiClient, record: PatientRecord, format: OutputFormat) -> Result<()> {
    let result: PredictionResult = client.post("predict/single", &record).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Readmission Risk".bold());
            println!("{}", "=".repeat(40));
            println!(
                "Probability:   {}",
                format_probability(result.risk_probability)
            );
            println!("Category:      {}", color_category(&result.risk_category));
            println!();

            let rows: Vec<ImportanceRow> = result
                .explanations
                .feature_importances
                .iter()
                .map(|fi| ImportanceRow {
                    feature: fi.feature.clone(),
                    importance: format!("{:.2}", fi.importance),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
        }
    }

    Ok(())
}
