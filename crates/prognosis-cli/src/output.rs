//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format a probability as percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Color a risk category label
pub fn color_category(category: &str) -> String {
    match category {
        "High" => category.red().bold().to_string(),
        "Medium" => category.yellow().to_string(),
        "Low" => category.green().to_string(),
        _ => category.to_string(),
    }
}

/// Color the serving mode
pub fn color_mode(mode: &str) -> String {
    match mode {
        "full" => mode.green().to_string(),
        "lite" => mode.yellow().to_string(),
        _ => mode.to_string(),
    }
}
