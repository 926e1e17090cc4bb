//! Durable-queue behavior against a real on-disk database.

mod common;

use common::{open_store, record, PROFILE};
use diesel::prelude::*;
use hydromon_core::sync::SyncRepositoryTrait;
use hydromon_storage_sqlite::sync::SyncQueueRecordDB;
use hydromon_storage_sqlite::SyncRepository;

#[tokio::test]
async fn appended_record_survives_process_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("hydromon.db");

    {
        let (pool, writer) = open_store(&db_path);
        let repo = SyncRepository::new(pool, writer);
        repo.append(record("rec-1", "2026-08-06T08:00:00Z"))
            .await
            .expect("append");
        // Store handles dropped here, as in a crash before any drain.
    }

    let (pool, writer) = open_store(&db_path);
    let repo = SyncRepository::new(pool, writer);
    let pending = repo.list_pending(PROFILE, 10).await.expect("list");

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "rec-1");
    assert_eq!(pending[0].payload, r#"{"HR":70.0,"Water Intake":1.2}"#);
    assert_eq!(pending[0].attempts, 0);
}

#[tokio::test]
async fn pending_records_come_back_oldest_first_with_id_tiebreak() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pool, writer) = open_store(&dir.path().join("hydromon.db"));
    let repo = SyncRepository::new(pool, writer);

    repo.append(record("b", "2026-08-06T08:00:00Z")).await.unwrap();
    repo.append(record("c", "2026-08-06T08:00:05Z")).await.unwrap();
    repo.append(record("a", "2026-08-06T08:00:00Z")).await.unwrap();

    let pending = repo.list_pending(PROFILE, 10).await.expect("list");
    let ids: Vec<&str> = pending.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn corrupt_rows_are_dropped_logged_and_purged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("hydromon.db");
    let (pool, writer) = open_store(&db_path);
    let repo = SyncRepository::new(pool.clone(), writer);

    repo.append(record("good", "2026-08-06T08:00:01Z"))
        .await
        .unwrap();

    // A row written by a broken build: unknown endpoint tag.
    {
        use hydromon_storage_sqlite::schema::sync_queue;
        let mut conn = pool.get().expect("conn");
        let bad = SyncQueueRecordDB {
            id: "bad".to_string(),
            profile_id: PROFILE.to_string(),
            endpoint: "telemetry_v9".to_string(),
            payload: "{}".to_string(),
            status: "pending".to_string(),
            attempts: 0,
            next_retry_at: None,
            last_error: None,
            created_at: "2026-08-06T08:00:00Z".to_string(),
        };
        diesel::insert_into(sync_queue::table)
            .values(&bad)
            .execute(&mut conn)
            .expect("insert bad row");
    }

    let pending = repo.list_pending(PROFILE, 10).await.expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "good");

    // The unreadable row was purged, not left to resurface forever.
    assert_eq!(repo.pending_count(PROFILE).unwrap(), 1);
    let pending = repo.list_pending(PROFILE, 10).await.expect("list again");
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn retry_bookkeeping_and_dead_flow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pool, writer) = open_store(&dir.path().join("hydromon.db"));
    let repo = SyncRepository::new(pool, writer);

    repo.append(record("rec-1", "2026-08-06T08:00:00Z"))
        .await
        .unwrap();

    repo.schedule_retry("rec-1", 30, Some("connection reset".to_string()))
        .await
        .expect("schedule retry");
    let pending = repo.list_pending(PROFILE, 10).await.unwrap();
    assert_eq!(pending[0].attempts, 1);
    assert!(pending[0].next_retry_at.is_some());
    assert_eq!(pending[0].last_error.as_deref(), Some("connection reset"));

    // Discard only applies to dead records.
    assert!(!repo.discard_dead("rec-1").await.unwrap());

    repo.mark_dead("rec-1", Some("gave up".to_string()))
        .await
        .expect("mark dead");
    assert_eq!(repo.pending_count(PROFILE).unwrap(), 0);
    let dead = repo.list_dead(PROFILE).unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 2);

    assert!(repo.discard_dead("rec-1").await.unwrap());
    assert!(repo.list_dead(PROFILE).unwrap().is_empty());
}

#[tokio::test]
async fn removal_is_by_exact_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pool, writer) = open_store(&dir.path().join("hydromon.db"));
    let repo = SyncRepository::new(pool, writer);

    repo.append(record("rec-1", "2026-08-06T08:00:00Z"))
        .await
        .unwrap();
    repo.append(record("rec-2", "2026-08-06T08:00:01Z"))
        .await
        .unwrap();

    assert!(repo.remove("rec-1").await.unwrap());
    assert!(!repo.remove("rec-1").await.unwrap());
    assert_eq!(repo.pending_count(PROFILE).unwrap(), 1);
}

#[tokio::test]
async fn engine_state_accumulates_failures_and_resets_on_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pool, writer) = open_store(&dir.path().join("hydromon.db"));
    let repo = SyncRepository::new(pool, writer);

    assert_eq!(repo.engine_status(PROFILE).unwrap().consecutive_failures, 0);

    repo.mark_engine_error(PROFILE, "timeout".to_string())
        .await
        .unwrap();
    repo.mark_engine_error(PROFILE, "timeout again".to_string())
        .await
        .unwrap();
    let status = repo.engine_status(PROFILE).unwrap();
    assert_eq!(status.consecutive_failures, 2);
    assert_eq!(status.last_error.as_deref(), Some("timeout again"));

    repo.mark_cycle_outcome(PROFILE, "stalled".to_string(), 42, None)
        .await
        .unwrap();
    assert_eq!(
        repo.engine_status(PROFILE).unwrap().last_cycle_status.as_deref(),
        Some("stalled")
    );

    repo.mark_sync_completed(PROFILE).await.unwrap();
    let status = repo.engine_status(PROFILE).unwrap();
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.last_error.is_none());
    assert!(status.last_sync_at.is_some());
}
