//! Lock entity and operation outcomes
//!
//! A `Lock` is a row in the lock table: exclusive ownership of a named
//! resource until `expires_at` (Unix seconds). A lock whose expiry has
//! passed is vacated; reconciliation removes it before any read.

use serde::{Deserialize, Serialize};

use super::newtypes::{LockName, Owner, Ttl};

/// Exclusive, time-bounded ownership of a named resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    name: LockName,
    owner: Owner,
    expires_at: i64,
}

impl Lock {
    /// Creates a lock held by `owner` from `now` for `ttl`
    pub fn new(name: LockName, owner: Owner, now: i64, ttl: Ttl) -> Self {
        Self {
            name,
            owner,
            expires_at: ttl.expires_from(now),
        }
    }

    /// Rebuilds a lock from stored fields
    pub fn from_parts(name: LockName, owner: Owner, expires_at: i64) -> Self {
        Self {
            name,
            owner,
            expires_at,
        }
    }

    pub fn name(&self) -> &LockName {
        &self.name
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Absolute expiry in Unix seconds
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// True once `now` has reached the expiry instant
    ///
    /// Uses `<=` so the same predicate drives every reconciliation path.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// True if `owner` is the current holder (plain string equality)
    pub fn is_owned_by(&self, owner: &Owner) -> bool {
        &self.owner == owner
    }

    /// Seconds remaining at `now`; may be zero or negative for a row
    /// that has not yet been reconciled
    pub fn ttl_left_at(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Listing view of this lock computed at `now`
    pub fn to_active(&self, now: i64) -> ActiveLock {
        ActiveLock {
            name: self.name.to_string(),
            owner: self.owner.to_string(),
            expires_at: self.expires_at,
            ttl_left: self.ttl_left_at(now),
        }
    }
}

/// Entry of the active-lock listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLock {
    pub name: String,
    pub owner: String,
    pub expires_at: i64,
    pub ttl_left: i64,
}

/// Result of a try-once acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds the lock
    Locked { expires_at: i64 },
    /// Someone else holds it; nothing was changed
    AlreadyLocked { owner: Owner, expires_at: i64 },
}

impl AcquireOutcome {
    pub fn is_locked(&self) -> bool {
        matches!(self, AcquireOutcome::Locked { .. })
    }
}

/// Result of a successful renewal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewOutcome {
    pub new_expires_at: i64,
}

/// Observable state of a single lock name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Free,
    Locked { owner: Owner, expires_at: i64 },
}

impl From<Option<Lock>> for LockStatus {
    fn from(lock: Option<Lock>) -> Self {
        match lock {
            Some(lock) => LockStatus::Locked {
                expires_at: lock.expires_at,
                owner: lock.owner,
            },
            None => LockStatus::Free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(expires_at: i64) -> Lock {
        Lock::from_parts(
            LockName::new("build").unwrap(),
            Owner::new("ci1").unwrap(),
            expires_at,
        )
    }

    #[test]
    fn test_new_computes_expiry() {
        let l = Lock::new(
            LockName::new("build").unwrap(),
            Owner::new("ci1").unwrap(),
            100,
            Ttl::from_secs(30).unwrap(),
        );
        assert_eq!(l.expires_at(), 130);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let l = lock(100);
        assert!(!l.is_expired_at(99));
        assert!(l.is_expired_at(100));
        assert!(l.is_expired_at(101));
    }

    #[test]
    fn test_ownership_is_string_equality() {
        let l = lock(100);
        assert!(l.is_owned_by(&Owner::new("ci1").unwrap()));
        assert!(!l.is_owned_by(&Owner::new("CI1").unwrap()));
    }

    #[test]
    fn test_active_view() {
        let active = lock(130).to_active(100);
        assert_eq!(active.name, "build");
        assert_eq!(active.owner, "ci1");
        assert_eq!(active.ttl_left, 30);
    }

    #[test]
    fn test_status_from_option() {
        assert_eq!(LockStatus::from(None), LockStatus::Free);
        match LockStatus::from(Some(lock(42))) {
            LockStatus::Locked { owner, expires_at } => {
                assert_eq!(owner.as_str(), "ci1");
                assert_eq!(expires_at, 42);
            }
            LockStatus::Free => panic!("expected locked"),
        }
    }
}
