//! Lock commands - acquire, release and renew leases
//!
//! `leasehold lock` exits with an error when the lock is held by someone
//! else, so scripts can guard a critical section with `&&`.

use anyhow::Result;
use clap::Args;
use leasehold_core::api::{AcquireResponse, RenewResponse};
use tracing::info;

use crate::client::LeaseholdClient;
use crate::output::{format_timestamp, get_formatter, OutputFormat};

/// Try once to take a lock
#[derive(Debug, Args)]
pub struct LockCommand {
    /// Lock name
    pub name: String,

    /// Identity of the holder
    #[arg(long)]
    pub owner: String,

    /// Lease duration in seconds (server default when omitted)
    #[arg(long)]
    pub ttl: Option<i64>,
}

impl LockCommand {
    pub async fn execute(&self, client: &LeaseholdClient, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        info!(name = %self.name, owner = %self.owner, ttl = ?self.ttl, "Acquiring lock");
        let response = client.acquire(&self.name, &self.owner, self.ttl).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&response)?);
        }

        match response {
            AcquireResponse::Locked => {
                formatter.success(&format!("Locked '{}' as {}", self.name, self.owner));
                Ok(())
            }
            AcquireResponse::AlreadyLocked { owner, expires_at } => {
                formatter.info(&format!("Expires: {}", format_timestamp(expires_at)));
                anyhow::bail!("Lock '{}' is held by {}", self.name, owner)
            }
        }
    }
}

/// Release a lock you hold
#[derive(Debug, Args)]
pub struct UnlockCommand {
    /// Lock name
    pub name: String,

    /// Identity of the holder
    #[arg(long)]
    pub owner: String,
}

impl UnlockCommand {
    pub async fn execute(&self, client: &LeaseholdClient, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        info!(name = %self.name, owner = %self.owner, "Releasing lock");
        let response = client.release(&self.name, &self.owner).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&response)?);
        } else {
            formatter.success(&format!("Unlocked '{}'", self.name));
        }
        Ok(())
    }
}

/// Extend a lock you hold
#[derive(Debug, Args)]
pub struct RenewCommand {
    /// Lock name
    pub name: String,

    /// Identity of the holder
    #[arg(long)]
    pub owner: String,

    /// New lease duration in seconds, counted from now
    #[arg(long)]
    pub ttl: Option<i64>,
}

impl RenewCommand {
    pub async fn execute(&self, client: &LeaseholdClient, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        info!(name = %self.name, owner = %self.owner, ttl = ?self.ttl, "Renewing lock");
        let response = client.renew(&self.name, &self.owner, self.ttl).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&response)?);
        } else {
            let RenewResponse::Renewed { new_expires_at } = response;
            formatter.success(&format!(
                "Renewed '{}' until {}",
                self.name,
                format_timestamp(new_expires_at)
            ));
        }
        Ok(())
    }
}
