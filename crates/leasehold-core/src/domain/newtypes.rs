//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for lock names, owner
//! identities, TTLs and event identifiers. Each newtype ensures data
//! validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Maximum length in bytes of a lock name or owner identity
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// TTL applied when a request does not specify one
pub const DEFAULT_TTL_SECS: i64 = 30;

// ============================================================================
// LockName
// ============================================================================

/// Name of a lock; the unique key of the lock table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LockName(String);

impl LockName {
    /// Creates a new LockName after validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidName` if the name is empty, longer than
    /// [`MAX_IDENTIFIER_LEN`] bytes, or contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidName("name cannot be empty".to_string()));
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(DomainError::InvalidName(format!(
                "name exceeds {MAX_IDENTIFIER_LEN} bytes"
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(DomainError::InvalidName(
                "name contains control characters".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LockName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LockName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LockName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LockName> for String {
    fn from(name: LockName) -> Self {
        name.0
    }
}

// ============================================================================
// Owner
// ============================================================================

/// Opaque, client-asserted identity of a lock holder
///
/// Compared by plain string equality. This is advisory, not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Owner(String);

impl Owner {
    /// Creates a new Owner after validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidOwner` if empty or longer than
    /// [`MAX_IDENTIFIER_LEN`] bytes.
    pub fn new(owner: impl Into<String>) -> Result<Self, DomainError> {
        let owner = owner.into();
        if owner.is_empty() {
            return Err(DomainError::InvalidOwner(
                "owner cannot be empty".to_string(),
            ));
        }
        if owner.len() > MAX_IDENTIFIER_LEN {
            return Err(DomainError::InvalidOwner(format!(
                "owner exceeds {MAX_IDENTIFIER_LEN} bytes"
            )));
        }
        Ok(Self(owner))
    }

    /// Get the owner as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Owner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Owner {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Owner {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.0
    }
}

// ============================================================================
// Ttl
// ============================================================================

/// Lease duration in whole seconds; always at least one second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Ttl(i64);

impl Ttl {
    /// Creates a new Ttl
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTtl` if `seconds` is zero or negative.
    pub fn from_secs(seconds: i64) -> Result<Self, DomainError> {
        if seconds < 1 {
            return Err(DomainError::InvalidTtl(format!(
                "ttl must be at least 1 second, got {seconds}"
            )));
        }
        Ok(Self(seconds))
    }

    /// Number of seconds
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Absolute expiry for a lease that starts at `now`
    #[must_use]
    pub fn expires_from(&self, now: i64) -> i64 {
        now.saturating_add(self.0)
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self(DEFAULT_TTL_SECS)
    }
}

impl Display for Ttl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl TryFrom<i64> for Ttl {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_secs(value)
    }
}

impl From<Ttl> for i64 {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

// ============================================================================
// EventId
// ============================================================================

/// Identifier for audit events (database row ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(i64);

impl EventId {
    /// Create an EventId from an i64 value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EventId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
