//! Lock lifecycle use case
//!
//! `LockService` is the lock engine behind the API surface. Every public
//! operation first reconciles expiry (evicting leases whose TTL has
//! elapsed and reporting an `expired` event for each), then performs the
//! requested operation, then hands an event describing the outcome to
//! the event sink.
//!
//! Each operation has an `*_at` variant that takes the reconciliation
//! instant explicitly. The plain variants use the serving node's wall
//! clock; clients' clocks never participate in expiry decisions.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::{
    AcquireOutcome, ActiveLock, Lock, LockAction, LockError, LockName, LockStatus, NewLockEvent,
    Owner, RenewOutcome, Ttl,
};
use crate::ports::{IEventSink, ILockRepository, InsertOutcome, OwnedOutcome};

/// Current wall-clock time in Unix seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Use case coordinating the lock table and the audit event stream
///
/// Holds no in-process locks: mutual exclusion comes from the repository's
/// conditional insert, and reconciliation is safe to run from any number
/// of tasks at once.
pub struct LockService {
    locks: Arc<dyn ILockRepository>,
    events: Arc<dyn IEventSink>,
}

impl LockService {
    /// Creates a new LockService
    ///
    /// # Arguments
    ///
    /// * `locks` - Durable lock table
    /// * `events` - Destination for lifecycle events (typically the audit queue)
    pub fn new(locks: Arc<dyn ILockRepository>, events: Arc<dyn IEventSink>) -> Self {
        Self { locks, events }
    }

    fn emit(&self, now: i64, name: &LockName, owner: &Owner, action: LockAction) {
        self.events.record(NewLockEvent::new(now, name, owner, action));
    }

    // ========================================================================
    // Expiry reconciliation
    // ========================================================================

    /// Evicts every lock whose TTL has elapsed by now
    pub async fn reconcile(&self) -> Result<Vec<Lock>, LockError> {
        self.reconcile_at(unix_now()).await
    }

    /// Evicts every lock with `expires_at <= now`, emitting one `expired`
    /// event per evicted row
    ///
    /// Both the request path and the reaper call this. Only the caller
    /// whose delete removed a row sees it, so concurrent reconciliations
    /// never report the same lock twice.
    pub async fn reconcile_at(&self, now: i64) -> Result<Vec<Lock>, LockError> {
        let evicted = self.locks.reap_expired(now).await?;

        for lock in &evicted {
            debug!(
                name = %lock.name(),
                owner = %lock.owner(),
                expires_at = lock.expires_at(),
                "Lock expired"
            );
            self.emit(now, lock.name(), lock.owner(), LockAction::Expired);
        }

        if !evicted.is_empty() {
            info!(evicted = evicted.len(), "Reconciled expired locks");
        }

        Ok(evicted)
    }

    // ========================================================================
    // Acquire
    // ========================================================================

    /// Tries once to acquire `name` for `owner`
    pub async fn try_acquire(
        &self,
        name: &LockName,
        owner: &Owner,
        ttl: Ttl,
    ) -> Result<AcquireOutcome, LockError> {
        self.try_acquire_at(name, owner, ttl, unix_now()).await
    }

    /// Tries once to acquire `name` for `owner` at instant `now`
    ///
    /// Contention is not an error: when another owner holds the lock the
    /// result is `AlreadyLocked` with the holder and its expiry, and the
    /// lock table is left untouched.
    pub async fn try_acquire_at(
        &self,
        name: &LockName,
        owner: &Owner,
        ttl: Ttl,
        now: i64,
    ) -> Result<AcquireOutcome, LockError> {
        self.reconcile_at(now).await?;

        let lock = Lock::new(name.clone(), owner.clone(), now, ttl);
        match self.locks.try_insert(&lock).await? {
            InsertOutcome::Inserted => {
                info!(
                    name = %name,
                    owner = %owner,
                    expires_at = lock.expires_at(),
                    "Lock acquired"
                );
                self.emit(now, name, owner, LockAction::Acquire);
                Ok(AcquireOutcome::Locked {
                    expires_at: lock.expires_at(),
                })
            }
            InsertOutcome::Held(holder) => {
                debug!(
                    name = %name,
                    owner = %owner,
                    holder = %holder.owner(),
                    "Lock already held"
                );
                self.emit(
                    now,
                    name,
                    owner,
                    LockAction::AlreadyLocked {
                        holder: holder.owner().to_string(),
                    },
                );
                Ok(AcquireOutcome::AlreadyLocked {
                    expires_at: holder.expires_at(),
                    owner: holder.owner().clone(),
                })
            }
        }
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Releases `name` if `owner` holds it
    pub async fn release(&self, name: &LockName, owner: &Owner) -> Result<(), LockError> {
        self.release_at(name, owner, unix_now()).await
    }

    /// Releases `name` if `owner` holds it, reconciling at `now` first
    ///
    /// # Errors
    ///
    /// `LockError::NotFound` if nobody holds the lock, `LockError::Forbidden`
    /// if someone else does.
    pub async fn release_at(
        &self,
        name: &LockName,
        owner: &Owner,
        now: i64,
    ) -> Result<(), LockError> {
        self.reconcile_at(now).await?;

        match self.locks.delete_owned(name, owner).await? {
            OwnedOutcome::Applied => {
                info!(name = %name, owner = %owner, "Lock released");
                self.emit(now, name, owner, LockAction::Release);
                Ok(())
            }
            OwnedOutcome::NotFound => Err(LockError::NotFound(name.to_string())),
            OwnedOutcome::Forbidden => Err(forbidden(name, owner)),
        }
    }

    // ========================================================================
    // Renew
    // ========================================================================

    /// Extends the lease on `name` to `ttl` from now
    pub async fn renew(
        &self,
        name: &LockName,
        owner: &Owner,
        ttl: Ttl,
    ) -> Result<RenewOutcome, LockError> {
        self.renew_at(name, owner, ttl, unix_now()).await
    }

    /// Extends the lease on `name` to `now + ttl` if `owner` holds it
    ///
    /// # Errors
    ///
    /// Same ownership rules as [`release_at`](Self::release_at).
    pub async fn renew_at(
        &self,
        name: &LockName,
        owner: &Owner,
        ttl: Ttl,
        now: i64,
    ) -> Result<RenewOutcome, LockError> {
        self.reconcile_at(now).await?;

        let new_expires_at = ttl.expires_from(now);
        match self
            .locks
            .update_expiry_owned(name, owner, new_expires_at)
            .await?
        {
            OwnedOutcome::Applied => {
                debug!(name = %name, owner = %owner, new_expires_at, "Lock renewed");
                self.emit(now, name, owner, LockAction::Renew);
                Ok(RenewOutcome { new_expires_at })
            }
            OwnedOutcome::NotFound => Err(LockError::NotFound(name.to_string())),
            OwnedOutcome::Forbidden => Err(forbidden(name, owner)),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current state of `name`
    pub async fn status(&self, name: &LockName) -> Result<LockStatus, LockError> {
        self.status_at(name, unix_now()).await
    }

    /// State of `name` after reconciling at `now`
    pub async fn status_at(&self, name: &LockName, now: i64) -> Result<LockStatus, LockError> {
        self.reconcile_at(now).await?;
        Ok(self.locks.get(name).await?.into())
    }

    /// All held locks, ordered by name
    pub async fn list_active(&self) -> Result<Vec<ActiveLock>, LockError> {
        self.list_active_at(unix_now()).await
    }

    /// All held locks after reconciling at `now`; `ttl_left` is measured
    /// against the same instant
    pub async fn list_active_at(&self, now: i64) -> Result<Vec<ActiveLock>, LockError> {
        self.reconcile_at(now).await?;
        let locks = self.locks.list().await?;
        Ok(locks.iter().map(|lock| lock.to_active(now)).collect())
    }

    /// Number of lock rows, without reconciling first
    ///
    /// Right after a reconciliation this equals the number of held locks.
    pub async fn held_count(&self) -> Result<u64, LockError> {
        Ok(self.locks.count().await?)
    }
}

fn forbidden(name: &LockName, owner: &Owner) -> LockError {
    LockError::Forbidden {
        name: name.to_string(),
        owner: owner.to_string(),
    }
}
