//! Lock audit events
//!
//! Immutable records of lock lifecycle transitions. Producers create a
//! [`NewLockEvent`]; the audit store assigns the sequence id and returns
//! a [`LockEvent`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{EventId, LockName, Owner};

/// Prefix of the stored form of [`LockAction::AlreadyLocked`]
const ALREADY_LOCKED_PREFIX: &str = "already_locked by ";

/// Lifecycle action recorded in the audit trail
///
/// Serialized as its display string, e.g. `"renew"` or
/// `"already_locked by ci1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LockAction {
    /// A free name was acquired
    Acquire,
    /// The holder released the lock
    Release,
    /// The holder extended the lease
    Renew,
    /// An acquire attempt found the lock held by `holder`
    AlreadyLocked { holder: String },
    /// Reconciliation evicted the lock after its TTL elapsed
    Expired,
}

impl LockAction {
    /// Short label without the holder, used for metrics and filtering
    pub fn kind(&self) -> &'static str {
        match self {
            LockAction::Acquire => "acquire",
            LockAction::Release => "release",
            LockAction::Renew => "renew",
            LockAction::AlreadyLocked { .. } => "already_locked",
            LockAction::Expired => "expired",
        }
    }
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockAction::AlreadyLocked { holder } => {
                write!(f, "{ALREADY_LOCKED_PREFIX}{holder}")
            }
            other => f.write_str(other.kind()),
        }
    }
}

impl FromStr for LockAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acquire" => Ok(LockAction::Acquire),
            "release" => Ok(LockAction::Release),
            "renew" => Ok(LockAction::Renew),
            "expired" => Ok(LockAction::Expired),
            s if s.starts_with(ALREADY_LOCKED_PREFIX) => Ok(LockAction::AlreadyLocked {
                holder: s[ALREADY_LOCKED_PREFIX.len()..].to_string(),
            }),
            other => Err(DomainError::UnknownAction(other.to_string())),
        }
    }
}

impl TryFrom<String> for LockAction {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LockAction> for String {
    fn from(action: LockAction) -> Self {
        action.to_string()
    }
}

/// An event waiting to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLockEvent {
    /// Unix seconds at the time of the action
    pub timestamp: i64,
    pub name: String,
    /// The acting owner (for `Expired`, the evicted holder)
    pub owner: String,
    pub action: LockAction,
}

impl NewLockEvent {
    pub fn new(timestamp: i64, name: &LockName, owner: &Owner, action: LockAction) -> Self {
        Self {
            timestamp,
            name: name.to_string(),
            owner: owner.to_string(),
            action,
        }
    }
}

/// A persisted audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEvent {
    pub id: EventId,
    pub timestamp: i64,
    pub name: String,
    pub owner: String,
    pub action: LockAction,
}

impl LockEvent {
    /// Attaches the store-assigned id to a new event
    pub fn from_new(id: EventId, event: NewLockEvent) -> Self {
        Self {
            id,
            timestamp: event.timestamp,
            name: event.name,
            owner: event.owner,
            action: event.action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_display_matches_stored_form() {
        assert_eq!(LockAction::Acquire.to_string(), "acquire");
        assert_eq!(LockAction::Expired.to_string(), "expired");
        assert_eq!(
            LockAction::AlreadyLocked {
                holder: "ci1".into()
            }
            .to_string(),
            "already_locked by ci1"
        );
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("renew".parse::<LockAction>().unwrap(), LockAction::Renew);
        assert_eq!(
            "already_locked by team a".parse::<LockAction>().unwrap(),
            LockAction::AlreadyLocked {
                holder: "team a".into()
            }
        );
        assert!("stolen".parse::<LockAction>().is_err());
    }

    #[test]
    fn test_action_kind_drops_holder() {
        let action = LockAction::AlreadyLocked {
            holder: "ci1".into(),
        };
        assert_eq!(action.kind(), "already_locked");
    }

    #[test]
    fn test_event_serializes_action_as_string() {
        let event = LockEvent {
            id: EventId::new(7),
            timestamp: 1_700_000_000,
            name: "build".into(),
            owner: "ci2".into(),
            action: LockAction::AlreadyLocked {
                holder: "ci1".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "already_locked by ci1");
        assert_eq!(json["id"], 7);
    }
}
