//! SQLite implementation of ILockRepository and IAuditRepository
//!
//! ## Schema mapping
//!
//! | Domain type   | Table         | Notes                                   |
//! |---------------|---------------|-----------------------------------------|
//! | `Lock`        | `locks`       | `name` is the primary key               |
//! | `LockEvent`   | `lock_events` | `id` AUTOINCREMENT, `action` as display |
//!
//! Timestamps are stored as INTEGER Unix seconds.
//!
//! ## Atomicity
//!
//! - `try_insert` relies on `ON CONFLICT(name) DO NOTHING`; the follow-up
//!   read of the holder runs in the same transaction, so the holder it
//!   reports is the row that blocked the insert.
//! - Owner-guarded mutations write first with the owner in the `WHERE`
//!   clause and only read the row to classify a zero-row result.
//! - `reap_expired` uses `DELETE ... RETURNING`, so every expired row is
//!   handed to exactly one caller.
//! - `trim_to` computes the excess inside its own `DELETE`.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use leasehold_core::domain::{EventId, Lock, LockAction, LockEvent, LockName, NewLockEvent, Owner};
use leasehold_core::ports::{IAuditRepository, ILockRepository, InsertOutcome, OwnedOutcome};

use crate::StoreError;

/// SQLite-based implementation of the lock and audit ports
///
/// Cheap to clone; all clones share the same connection pool.
#[derive(Clone)]
pub struct SqliteLockRepository {
    pool: SqlitePool,
}

impl SqliteLockRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Row conversion
// ============================================================================

fn lock_from_row(row: &SqliteRow) -> Result<Lock, StoreError> {
    let name: String = row.try_get("name")?;
    let owner: String = row.try_get("owner")?;
    let expires_at: i64 = row.try_get("expires_at")?;

    let name = LockName::new(name.clone())
        .map_err(|e| StoreError::CorruptRow(format!("Invalid lock name '{}': {}", name, e)))?;
    let owner = Owner::new(owner.clone())
        .map_err(|e| StoreError::CorruptRow(format!("Invalid owner '{}': {}", owner, e)))?;

    Ok(Lock::from_parts(name, owner, expires_at))
}

fn event_from_row(row: &SqliteRow) -> Result<LockEvent, StoreError> {
    let action_str: String = row.try_get("action")?;
    let action: LockAction = action_str
        .parse()
        .map_err(|e| StoreError::CorruptRow(format!("Invalid action '{}': {}", action_str, e)))?;

    Ok(LockEvent {
        id: EventId::new(row.try_get("id")?),
        timestamp: row.try_get("timestamp")?,
        name: row.try_get("name")?,
        owner: row.try_get("owner")?,
        action,
    })
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

/// Classifies a zero-row owner-guarded write by looking at the current row
async fn classify_miss(
    conn: &mut sqlx::SqliteConnection,
    name: &LockName,
) -> Result<OwnedOutcome, StoreError> {
    let holder: Option<String> = sqlx::query_scalar("SELECT owner FROM locks WHERE name = ?")
        .bind(name.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(match holder {
        Some(_) => OwnedOutcome::Forbidden,
        None => OwnedOutcome::NotFound,
    })
}

// ============================================================================
// ILockRepository implementation
// ============================================================================

#[async_trait]
impl ILockRepository for SqliteLockRepository {
    #[tracing::instrument(skip(self))]
    async fn reap_expired(&self, now: i64) -> anyhow::Result<Vec<Lock>> {
        let rows = sqlx::query(
            "DELETE FROM locks WHERE expires_at <= ? RETURNING name, owner, expires_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let mut reaped = rows
            .iter()
            .map(lock_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        reaped.sort_by(|a, b| a.name().cmp(b.name()));

        if !reaped.is_empty() {
            tracing::debug!(count = reaped.len(), "Deleted expired lock rows");
        }
        Ok(reaped)
    }

    #[tracing::instrument(skip_all, fields(name = %lock.name()))]
    async fn try_insert(&self, lock: &Lock) -> anyhow::Result<InsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let result = sqlx::query(
            "INSERT INTO locks (name, owner, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(lock.name().as_str())
        .bind(lock.owner().as_str())
        .bind(lock.expires_at())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let outcome = if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            let row = sqlx::query("SELECT name, owner, expires_at FROM locks WHERE name = ?")
                .bind(lock.name().as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::from)?;
            InsertOutcome::Held(lock_from_row(&row)?)
        };

        tx.commit().await.map_err(StoreError::from)?;
        Ok(outcome)
    }

    #[tracing::instrument(skip_all, fields(name = %name, owner = %owner))]
    async fn delete_owned(&self, name: &LockName, owner: &Owner) -> anyhow::Result<OwnedOutcome> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let result = sqlx::query("DELETE FROM locks WHERE name = ? AND owner = ?")
            .bind(name.as_str())
            .bind(owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        let outcome = if result.rows_affected() > 0 {
            OwnedOutcome::Applied
        } else {
            classify_miss(&mut tx, name).await?
        };

        tx.commit().await.map_err(StoreError::from)?;
        Ok(outcome)
    }

    #[tracing::instrument(skip_all, fields(name = %name, owner = %owner))]
    async fn update_expiry_owned(
        &self,
        name: &LockName,
        owner: &Owner,
        expires_at: i64,
    ) -> anyhow::Result<OwnedOutcome> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let result = sqlx::query("UPDATE locks SET expires_at = ? WHERE name = ? AND owner = ?")
            .bind(expires_at)
            .bind(name.as_str())
            .bind(owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        let outcome = if result.rows_affected() > 0 {
            OwnedOutcome::Applied
        } else {
            classify_miss(&mut tx, name).await?
        };

        tx.commit().await.map_err(StoreError::from)?;
        Ok(outcome)
    }

    async fn get(&self, name: &LockName) -> anyhow::Result<Option<Lock>> {
        let row = sqlx::query("SELECT name, owner, expires_at FROM locks WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(row.as_ref().map(lock_from_row).transpose()?)
    }

    async fn list(&self) -> anyhow::Result<Vec<Lock>> {
        let rows = sqlx::query("SELECT name, owner, expires_at FROM locks ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(rows
            .iter()
            .map(lock_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count(&self) -> anyhow::Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locks")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(to_count(n))
    }
}

// ============================================================================
// IAuditRepository implementation
// ============================================================================

#[async_trait]
impl IAuditRepository for SqliteLockRepository {
    async fn append(&self, event: &NewLockEvent) -> anyhow::Result<LockEvent> {
        let result = sqlx::query(
            "INSERT INTO lock_events (timestamp, name, owner, action) VALUES (?, ?, ?, ?)",
        )
        .bind(event.timestamp)
        .bind(&event.name)
        .bind(&event.owner)
        .bind(event.action.to_string())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(LockEvent::from_new(
            EventId::new(result.last_insert_rowid()),
            event.clone(),
        ))
    }

    async fn count(&self) -> anyhow::Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lock_events")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(to_count(n))
    }

    #[tracing::instrument(skip(self))]
    async fn trim_to(&self, capacity: u64) -> anyhow::Result<u64> {
        let capacity = i64::try_from(capacity).unwrap_or(i64::MAX);

        // Must stay a single statement: under WAL a read transaction cannot
        // upgrade to a write once another connection has committed.
        let deleted = sqlx::query(
            "DELETE FROM lock_events WHERE id IN (\
                 SELECT id FROM lock_events ORDER BY timestamp ASC, id ASC \
                 LIMIT max(0, (SELECT COUNT(*) FROM lock_events) - ?)\
             )",
        )
        .bind(capacity)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?
        .rows_affected();

        if deleted > 0 {
            tracing::debug!(deleted, "Trimmed lock event log");
        }
        Ok(deleted)
    }

    async fn recent(&self, limit: u32) -> anyhow::Result<Vec<LockEvent>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, name, owner, action FROM lock_events \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(rows
            .iter()
            .map(event_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
