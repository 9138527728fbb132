//! Config command - inspect the daemon configuration
//!
//! Provides the `leasehold config` CLI command which:
//! 1. Shows the effective configuration (file, defaults and `DB_PATH`)
//! 2. Validates the configuration file and reports errors
//! 3. Prints the path the configuration is read from

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use leasehold_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command against the file at `config_path`
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
            ConfigCommand::Path => execute_path(config_path, format),
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = Config::load_or_default(config_path).with_env_overrides();

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");
        for line in config.to_yaml()?.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    if !config_path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "errors": [],
                "defaults": true,
            }));
        } else {
            formatter.success(&format!(
                "No configuration file at {}; defaults apply",
                config_path.display()
            ));
        }
        return Ok(());
    }

    let config = Config::load(config_path)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?
        .with_env_overrides();

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors: Vec<String> = config.validate().iter().map(ToString::to_string).collect();

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": errors,
        }));
    } else if errors.is_empty() {
        formatter.success(&format!("{} is valid", config_path.display()));
    } else {
        for error in &errors {
            formatter.warn(error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} configuration error(s)", errors.len())
    }
}

fn execute_path(config_path: &Path, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        get_formatter(format).print_json(&serde_json::json!({
            "config_path": config_path.display().to_string(),
            "exists": config_path.exists(),
        }));
    } else {
        println!("{}", config_path.display());
    }
    Ok(())
}
