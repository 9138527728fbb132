//! Reaper tests against a real SQLite store
//!
//! Leases are created with timestamps in the past so that they are
//! already expired by the serving node's clock.

use std::sync::Arc;
use std::time::Duration;

use leasehold_audit::{channel, AuditWorker, WorkerSettings};
use leasehold_core::domain::{LockAction, LockName, Owner, Ttl};
use leasehold_core::ports::{IAuditRepository, IEventSink, ILockRepository};
use leasehold_core::usecases::unix_now;
use leasehold_server::{ApiSettings, LockMetrics, Reaper, ServiceContext};
use leasehold_store::{DatabasePool, SqliteLockRepository};
use tokio_util::sync::CancellationToken;

struct Harness {
    ctx: Arc<ServiceContext>,
    repo: Arc<SqliteLockRepository>,
    worker: AuditWorker,
    _dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = DatabasePool::new(&dir.path().join("locks.db")).await.unwrap();
    let repo = Arc::new(SqliteLockRepository::new(pool.pool().clone()));
    let (queue, worker) = channel(
        Arc::clone(&repo) as Arc<dyn IAuditRepository>,
        WorkerSettings::default(),
    );
    let ctx = Arc::new(ServiceContext::new(
        Arc::clone(&repo) as Arc<dyn ILockRepository>,
        Arc::clone(&repo) as Arc<dyn IAuditRepository>,
        Arc::new(queue) as Arc<dyn IEventSink>,
        Arc::new(LockMetrics::new().unwrap()),
        ApiSettings::default(),
    ));
    Harness {
        ctx,
        repo,
        worker,
        _dir: dir,
    }
}

async fn stale_lock(ctx: &ServiceContext, name: &str) {
    ctx.service()
        .try_acquire_at(
            &LockName::new(name).unwrap(),
            &Owner::new("ghost").unwrap(),
            Ttl::from_secs(1).unwrap(),
            unix_now() - 100,
        )
        .await
        .unwrap();
}

async fn expired_events(h: Harness) -> usize {
    let Harness {
        ctx, repo, worker, ..
    } = h;
    // Callers must have dropped every other context clone; this one holds
    // the last queue handle
    drop(ctx);
    worker.run(CancellationToken::new()).await;
    repo.recent(1000)
        .await
        .unwrap()
        .iter()
        .filter(|e| e.action == LockAction::Expired)
        .count()
}

#[tokio::test]
async fn tick_evicts_only_expired_locks() {
    let h = harness().await;
    h.ctx
        .service()
        .try_acquire(
            &LockName::new("fresh").unwrap(),
            &Owner::new("live").unwrap(),
            Ttl::from_secs(300).unwrap(),
        )
        .await
        .unwrap();
    stale_lock(&h.ctx, "old").await;

    let reaper = Reaper::new(Arc::clone(&h.ctx), Duration::from_secs(10));
    assert_eq!(reaper.tick().await.unwrap(), 1);
    assert_eq!(reaper.tick().await.unwrap(), 0);

    assert!(h.repo.get(&LockName::new("old").unwrap()).await.unwrap().is_none());
    assert!(h.repo.get(&LockName::new("fresh").unwrap()).await.unwrap().is_some());
    assert_eq!(h.ctx.metrics().locks_expired_total.get(), 1);
    assert_eq!(h.ctx.metrics().active_locks.get(), 1);

    drop(reaper);
    assert_eq!(expired_events(h).await, 1);
}

#[tokio::test]
async fn run_reaps_on_first_tick_and_stops_on_cancel() {
    let h = harness().await;
    stale_lock(&h.ctx, "job").await;

    let shutdown = CancellationToken::new();
    let reaper = Reaper::new(Arc::clone(&h.ctx), Duration::from_secs(3600));
    let handle = tokio::spawn(reaper.run(shutdown.clone()));

    let name = LockName::new("job").unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.repo.get(&name).await.unwrap().is_some() {
        assert!(tokio::time::Instant::now() < deadline, "reaper never ran");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reaper exits after cancellation")
        .unwrap();

    assert_eq!(expired_events(h).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reaper_and_lazy_path_report_each_expiry_once() {
    let h = harness().await;
    for i in 0..25 {
        stale_lock(&h.ctx, &format!("lease-{i:02}")).await;
    }

    let reaper = Arc::new(Reaper::new(Arc::clone(&h.ctx), Duration::from_secs(10)));
    let mut handles = Vec::new();
    for i in 0..8 {
        let reaper = Arc::clone(&reaper);
        let ctx = Arc::clone(&h.ctx);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                reaper.tick().await.unwrap();
            } else {
                ctx.service().list_active().await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    drop(reaper);

    assert_eq!(h.ctx.metrics().locks_expired_total.get(), 25);
    assert_eq!(expired_events(h).await, 25);
}
