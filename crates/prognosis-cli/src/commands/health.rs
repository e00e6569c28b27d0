//! Service health command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, HealthReport};
use crate::output::{color_mode, print_json, print_success, print_warning, OutputFormat};

/// Show service status and serving mode
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthReport = client.get("health").await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("{}", "Service Health".bold());
            println!("{}", "=".repeat(40));
            println!("Status:        {}", health.status.green());
            println!("Mode:          {}", color_mode(&health.mode));
            println!("Model loaded:  {}", health.model_loaded);
            println!();

            if health.model_loaded {
                print_success("Predictions are served by the trained model");
            } else {
                print_warning("No model loaded; predictions use the heuristic scorer");
            }
        }
    }

    Ok(())
}
