//! Integration tests for SqliteLockRepository
//!
//! Most tests use a fresh in-memory database. The contention tests use a
//! file-backed database so that several pooled connections race for the
//! same rows.

use std::sync::Arc;

use leasehold_core::domain::{Lock, LockAction, LockName, NewLockEvent, Owner, Ttl};
use leasehold_core::ports::{IAuditRepository, ILockRepository, InsertOutcome, OwnedOutcome};
use leasehold_store::{DatabasePool, SqliteLockRepository};

// ============================================================================
// Test helpers
// ============================================================================

async fn setup() -> SqliteLockRepository {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteLockRepository::new(pool.pool().clone())
}

fn name(s: &str) -> LockName {
    LockName::new(s).unwrap()
}

fn owner(s: &str) -> Owner {
    Owner::new(s).unwrap()
}

fn lock(n: &str, o: &str, now: i64, ttl: i64) -> Lock {
    Lock::new(name(n), owner(o), now, Ttl::from_secs(ttl).unwrap())
}

fn event(ts: i64, n: &str, o: &str, action: LockAction) -> NewLockEvent {
    NewLockEvent::new(ts, &name(n), &owner(o), action)
}

// ============================================================================
// Lock table
// ============================================================================

#[tokio::test]
async fn try_insert_on_free_name_inserts() {
    let repo = setup().await;

    let outcome = repo.try_insert(&lock("db", "ci1", 1000, 30)).await.unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);

    let stored = repo.get(&name("db")).await.unwrap().unwrap();
    assert_eq!(stored.owner().as_str(), "ci1");
    assert_eq!(stored.expires_at(), 1030);
}

#[tokio::test]
async fn try_insert_on_held_name_returns_holder_unchanged() {
    let repo = setup().await;
    repo.try_insert(&lock("db", "ci1", 1000, 30)).await.unwrap();

    let outcome = repo.try_insert(&lock("db", "ci2", 1005, 60)).await.unwrap();
    match outcome {
        InsertOutcome::Held(holder) => {
            assert_eq!(holder.owner().as_str(), "ci1");
            assert_eq!(holder.expires_at(), 1030);
        }
        other => panic!("expected Held, got {other:?}"),
    }

    let stored = repo.get(&name("db")).await.unwrap().unwrap();
    assert_eq!(stored.owner().as_str(), "ci1");
}

#[tokio::test]
async fn delete_owned_classifies_outcomes() {
    let repo = setup().await;
    repo.try_insert(&lock("db", "ci1", 1000, 30)).await.unwrap();

    assert_eq!(
        repo.delete_owned(&name("missing"), &owner("ci1")).await.unwrap(),
        OwnedOutcome::NotFound
    );
    assert_eq!(
        repo.delete_owned(&name("db"), &owner("ci2")).await.unwrap(),
        OwnedOutcome::Forbidden
    );
    assert!(repo.get(&name("db")).await.unwrap().is_some());

    assert_eq!(
        repo.delete_owned(&name("db"), &owner("ci1")).await.unwrap(),
        OwnedOutcome::Applied
    );
    assert!(repo.get(&name("db")).await.unwrap().is_none());
}

#[tokio::test]
async fn update_expiry_owned_only_touches_own_lock() {
    let repo = setup().await;
    repo.try_insert(&lock("db", "ci1", 1000, 30)).await.unwrap();

    assert_eq!(
        repo.update_expiry_owned(&name("db"), &owner("ci2"), 5000)
            .await
            .unwrap(),
        OwnedOutcome::Forbidden
    );
    assert_eq!(repo.get(&name("db")).await.unwrap().unwrap().expires_at(), 1030);

    assert_eq!(
        repo.update_expiry_owned(&name("db"), &owner("ci1"), 5000)
            .await
            .unwrap(),
        OwnedOutcome::Applied
    );
    assert_eq!(repo.get(&name("db")).await.unwrap().unwrap().expires_at(), 5000);

    assert_eq!(
        repo.update_expiry_owned(&name("other"), &owner("ci1"), 5000)
            .await
            .unwrap(),
        OwnedOutcome::NotFound
    );
}

#[tokio::test]
async fn reap_expired_deletes_due_rows_once() {
    let repo = setup().await;
    repo.try_insert(&lock("a", "o1", 1000, 10)).await.unwrap(); // 1010
    repo.try_insert(&lock("b", "o2", 1000, 20)).await.unwrap(); // 1020
    repo.try_insert(&lock("c", "o3", 1000, 30)).await.unwrap(); // 1030

    // Boundary is inclusive
    let reaped = repo.reap_expired(1020).await.unwrap();
    let names: Vec<&str> = reaped.iter().map(|l| l.name().as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(reaped[1].owner().as_str(), "o2");

    assert!(repo.reap_expired(1020).await.unwrap().is_empty());
    assert_eq!(ILockRepository::count(&repo).await.unwrap(), 1);
}

#[tokio::test]
async fn list_is_ordered_by_name() {
    let repo = setup().await;
    for n in ["zeta", "alpha", "mid"] {
        repo.try_insert(&lock(n, "o", 1000, 30)).await.unwrap();
    }

    let names: Vec<String> = repo
        .list()
        .await
        .unwrap()
        .iter()
        .map(|l| l.name().to_string())
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn names_are_stored_verbatim() {
    let repo = setup().await;
    let odd = "job/with spaces/ünïcode";
    repo.try_insert(&lock(odd, "o", 1000, 30)).await.unwrap();

    let stored = repo.get(&name(odd)).await.unwrap().unwrap();
    assert_eq!(stored.name().as_str(), odd);
}

// ============================================================================
// Contention on a file-backed database
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_have_exactly_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let pool = DatabasePool::new(&dir.path().join("locks.db")).await.unwrap();
    let repo = Arc::new(SqliteLockRepository::new(pool.pool().clone()));

    let mut handles = Vec::new();
    for i in 0..16 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.try_insert(&lock("shared", &format!("worker-{i}"), 1000, 30))
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    let mut holders = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            InsertOutcome::Inserted => winners += 1,
            InsertOutcome::Held(holder) => holders.push(holder.owner().to_string()),
        }
    }
    assert_eq!(winners, 1);

    let stored = repo.get(&name("shared")).await.unwrap().unwrap();
    assert!(holders.iter().all(|h| h == stored.owner().as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reaps_partition_expired_rows() {
    let dir = tempfile::tempdir().unwrap();
    let pool = DatabasePool::new(&dir.path().join("locks.db")).await.unwrap();
    let repo = Arc::new(SqliteLockRepository::new(pool.pool().clone()));

    for i in 0..20 {
        repo.try_insert(&lock(&format!("job-{i:02}"), "o", 1000, 1))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move { repo.reap_expired(2000).await.unwrap() }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap().len();
    }
    assert_eq!(total, 20);
    assert_eq!(ILockRepository::count(repo.as_ref()).await.unwrap(), 0);
}

// ============================================================================
// Event log
// ============================================================================

#[tokio::test]
async fn append_assigns_increasing_ids() {
    let repo = setup().await;
    let first = repo
        .append(&event(1, "db", "ci1", LockAction::Acquire))
        .await
        .unwrap();
    let second = repo
        .append(&event(2, "db", "ci1", LockAction::Release))
        .await
        .unwrap();

    assert!(second.id > first.id);
    assert_eq!(first.action, LockAction::Acquire);
    assert_eq!(IAuditRepository::count(&repo).await.unwrap(), 2);
}

#[tokio::test]
async fn already_locked_action_survives_storage() {
    let repo = setup().await;
    repo.append(&event(
        1,
        "db",
        "ci2",
        LockAction::AlreadyLocked {
            holder: "ci1".into(),
        },
    ))
    .await
    .unwrap();

    let events = repo.recent(10).await.unwrap();
    assert_eq!(events[0].action.to_string(), "already_locked by ci1");
}

#[tokio::test]
async fn recent_is_newest_first_and_limited() {
    let repo = setup().await;
    for ts in 1..=5 {
        repo.append(&event(ts, "db", "o", LockAction::Renew))
            .await
            .unwrap();
    }

    let events = repo.recent(3).await.unwrap();
    let stamps: Vec<i64> = events.iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps, vec![5, 4, 3]);
}

#[tokio::test]
async fn trim_to_removes_oldest_by_timestamp() {
    let repo = setup().await;
    // Inserted out of timestamp order
    for ts in [30, 10, 50, 20, 40] {
        repo.append(&event(ts, "db", "o", LockAction::Renew))
            .await
            .unwrap();
    }

    let deleted = repo.trim_to(3).await.unwrap();
    assert_eq!(deleted, 2);

    let mut stamps: Vec<i64> = repo
        .recent(10)
        .await
        .unwrap()
        .iter()
        .map(|e| e.timestamp)
        .collect();
    stamps.sort();
    assert_eq!(stamps, vec![30, 40, 50]);
}

#[tokio::test]
async fn trim_to_breaks_timestamp_ties_by_id() {
    let repo = setup().await;
    let first = repo
        .append(&event(7, "a", "o", LockAction::Acquire))
        .await
        .unwrap();
    let second = repo
        .append(&event(7, "b", "o", LockAction::Acquire))
        .await
        .unwrap();

    repo.trim_to(1).await.unwrap();

    let remaining = repo.recent(10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second.id);
    assert_ne!(remaining[0].id, first.id);
}

#[tokio::test]
async fn trim_to_is_noop_under_capacity() {
    let repo = setup().await;
    repo.append(&event(1, "db", "o", LockAction::Acquire))
        .await
        .unwrap();

    assert_eq!(repo.trim_to(10).await.unwrap(), 0);
    assert_eq!(IAuditRepository::count(&repo).await.unwrap(), 1);
}
