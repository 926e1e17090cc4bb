//! Shared helpers for on-disk store tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use hydromon_core::metrics::SyncEndpoint;
use hydromon_core::sync::{QueueStatus, QueuedRecord};
use hydromon_storage_sqlite::{create_pool, run_migrations, DbPool, WriteHandle};

pub const PROFILE: &str = "device-1";

/// Open (or reopen) the store at `path`, as the app does on launch.
pub fn open_store(path: &Path) -> (Arc<DbPool>, WriteHandle) {
    let url = path.to_str().expect("utf8 database path");
    let pool = create_pool(url).expect("create pool");
    run_migrations(&pool).expect("run migrations");
    let writer = WriteHandle::spawn(url).expect("spawn writer");
    (pool, writer)
}

pub fn record(id: &str, created_at: &str) -> QueuedRecord {
    QueuedRecord {
        id: id.to_string(),
        profile_id: PROFILE.to_string(),
        endpoint: SyncEndpoint::UpdateMetrics,
        payload: r#"{"HR":70.0,"Water Intake":1.2}"#.to_string(),
        status: QueueStatus::Pending,
        attempts: 0,
        next_retry_at: None,
        last_error: None,
        created_at: created_at.to_string(),
    }
}

