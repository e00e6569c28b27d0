//! Health Prognosis CLI
//!
//! A command-line tool for checking the prediction service and scoring
//! patients, one at a time or from a CSV file.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{batch, health, predict};
use std::path::PathBuf;

/// Health Prognosis CLI
#[derive(Parser)]
#[command(name = "prognosis")]
#[command(author, version, about = "CLI for the Health Prognosis readmission risk service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via PROGNOSIS_API_URL env var)
    #[arg(long, env = "PROGNOSIS_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show service status and serving mode
    Health,

    /// Score a single patient
    Predict {
        /// Age in years (0-120)
        #[arg(long)]
        age: i64,

        /// Patient gender
        #[arg(long)]
        gender: String,

        /// Primary diagnosis code (e.g. I10)
        #[arg(long)]
        diagnosis_code: String,

        /// Lab result value
        #[arg(long)]
        lab_result: f64,

        /// Comma-separated medication list
        #[arg(long)]
        medication: String,

        /// Length of stay in days
        #[arg(long)]
        length_of_stay: Option<i64>,

        /// Comorbidity score
        #[arg(long)]
        comorbidity_score: Option<i64>,
    },

    /// Score every row of a CSV file
    Batch {
        /// Path to the CSV file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
        Commands::Predict {
            age,
            gender,
            diagnosis_code,
            lab_result,
            medication,
            length_of_stay,
            comorbidity_score,
        } => {
            let record = client::PatientRecord {
                age,
                gender,
                diagnosis_code,
                lab_result,
                medication,
                length_of_stay,
                comorbidity_score,
            };
            predict::predict(&client, record, cli.format).await?;
        }
        Commands::Batch { file } => {
            batch::score_file(&client, &file, cli.format).await?;
        }
    }

    Ok(())
}
