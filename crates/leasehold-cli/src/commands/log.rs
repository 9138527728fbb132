//! Log command - show recent lock events, newest first

use anyhow::Result;
use clap::Args;

use crate::client::LeaseholdClient;
use crate::output::{format_timestamp, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct LogCommand {
    /// Only show events for this lock
    #[arg(long)]
    pub name: Option<String>,

    /// Maximum number of entries to show
    #[arg(long)]
    pub limit: Option<usize>,
}

impl LogCommand {
    pub async fn execute(&self, client: &LeaseholdClient, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let mut entries = client.log().await?;
        if let Some(name) = &self.name {
            entries.retain(|e| &e.name == name);
        }
        if let Some(limit) = self.limit {
            entries.truncate(limit);
        }

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&entries)?);
            return Ok(());
        }

        if entries.is_empty() {
            formatter.success("No lock events recorded");
            return Ok(());
        }

        formatter.success(&format!("{} event(s)", entries.len()));
        for entry in &entries {
            formatter.info(&format!(
                "{}  {:<20} {:<16} {}",
                format_timestamp(entry.timestamp),
                entry.name,
                entry.owner,
                entry.action
            ));
        }
        Ok(())
    }
}
