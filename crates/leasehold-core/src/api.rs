//! JSON wire types of the HTTP API
//!
//! Shared by the server (serializing) and the CLI client (deserializing).
//! Field names and `status` strings are part of the public protocol.

use serde::{Deserialize, Serialize};

use crate::domain::{AcquireOutcome, LockEvent, LockStatus, RenewOutcome};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /lock/{name}` and `POST /renew/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRequest {
    pub owner: String,
    /// Seconds; the server default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// Body of `POST /unlock/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub owner: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquireResponse {
    Locked,
    AlreadyLocked { owner: String, expires_at: i64 },
}

impl From<&AcquireOutcome> for AcquireResponse {
    fn from(outcome: &AcquireOutcome) -> Self {
        match outcome {
            AcquireOutcome::Locked { .. } => AcquireResponse::Locked,
            AcquireOutcome::AlreadyLocked { owner, expires_at } => AcquireResponse::AlreadyLocked {
                owner: owner.to_string(),
                expires_at: *expires_at,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseResponse {
    Unlocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenewResponse {
    Renewed { new_expires_at: i64 },
}

impl From<RenewOutcome> for RenewResponse {
    fn from(outcome: RenewOutcome) -> Self {
        RenewResponse::Renewed {
            new_expires_at: outcome.new_expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    Free,
    Locked { owner: String, expires_at: i64 },
}

impl From<&LockStatus> for StatusResponse {
    fn from(status: &LockStatus) -> Self {
        match status {
            LockStatus::Free => StatusResponse::Free,
            LockStatus::Locked { owner, expires_at } => StatusResponse::Locked {
                owner: owner.to_string(),
                expires_at: *expires_at,
            },
        }
    }
}

/// One row of `GET /log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub name: String,
    pub owner: String,
    /// Display form of the action, e.g. `already_locked by ci1`
    pub action: String,
}

impl From<&LockEvent> for LogEntry {
    fn from(event: &LockEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            name: event.name.clone(),
            owner: event.owner.clone(),
            action: event.action.to_string(),
        }
    }
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
