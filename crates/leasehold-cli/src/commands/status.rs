//! Status and list commands - inspect lock state on the server

use anyhow::Result;
use clap::Args;
use leasehold_core::api::StatusResponse;
use leasehold_core::domain::ActiveLock;

use crate::client::LeaseholdClient;
use crate::output::{format_timestamp, get_formatter, OutputFormat};

/// Show who holds a lock
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Lock name
    pub name: String,
}

impl StatusCommand {
    pub async fn execute(&self, client: &LeaseholdClient, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let response = client.status(&self.name).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&response)?);
            return Ok(());
        }

        match response {
            StatusResponse::Free => formatter.success(&format!("'{}' is free", self.name)),
            StatusResponse::Locked { owner, expires_at } => {
                formatter.success(&format!("'{}' is locked by {}", self.name, owner));
                formatter.info(&format!("Expires: {}", format_timestamp(expires_at)));
            }
        }
        Ok(())
    }
}

/// List every held lock
#[derive(Debug, Args)]
pub struct ListCommand {}

impl ListCommand {
    pub async fn execute(&self, client: &LeaseholdClient, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let locks = client.list().await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&locks)?);
            return Ok(());
        }

        if locks.is_empty() {
            formatter.success("No locks held");
            return Ok(());
        }

        formatter.success(&format!("{} lock(s) held", locks.len()));
        formatter.info("");
        for line in render_table(&locks) {
            formatter.info(&line);
        }
        Ok(())
    }
}

/// Formats the listing as aligned columns with a header row
fn render_table(locks: &[ActiveLock]) -> Vec<String> {
    let name_width = locks
        .iter()
        .map(|l| l.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let owner_width = locks
        .iter()
        .map(|l| l.owner.chars().count())
        .max()
        .unwrap_or(0)
        .max("OWNER".len());

    let mut lines = Vec::with_capacity(locks.len() + 1);
    lines.push(format!(
        "{:<name_width$}  {:<owner_width$}  {:>8}",
        "NAME", "OWNER", "TTL LEFT"
    ));
    for lock in locks {
        lines.push(format!(
            "{:<name_width$}  {:<owner_width$}  {:>7}s",
            lock.name, lock.owner, lock.ttl_left
        ));
    }
    lines
}
