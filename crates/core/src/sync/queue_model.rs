//! Durable queue model and the storage seam the engine talks through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::metrics::SyncEndpoint;

use super::SyncEngineStatus;

/// Local queue lifecycle status.
///
/// Acknowledged records are removed outright, so there is no "sent" state;
/// `Dead` records are kept for manual discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Dead,
}

/// An outbound record persisted locally until the remote service
/// acknowledges it.
///
/// `id`, `endpoint`, `payload`, and `created_at` are immutable once
/// created; only the retry bookkeeping mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRecord {
    pub id: String,
    pub profile_id: String,
    pub endpoint: SyncEndpoint,
    pub payload: String,
    pub status: QueueStatus,
    pub attempts: i32,
    pub next_retry_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
}

/// Durable queue + engine-state store contract.
#[async_trait]
pub trait SyncRepositoryTrait: Send + Sync {
    /// Atomically append a record; it must survive a crash once this
    /// returns. A partially written record must never surface.
    async fn append(&self, record: QueuedRecord) -> Result<()>;

    /// Pending records oldest first (`created_at`, ties broken by `id`).
    /// Rows that fail to decode are dropped with a warning, never returned.
    async fn list_pending(&self, profile_id: &str, limit: i64) -> Result<Vec<QueuedRecord>>;

    /// Remove an acknowledged record. Returns false when the id was absent.
    async fn remove(&self, record_id: &str) -> Result<bool>;

    /// Record a failed attempt and push `next_retry_at` out by
    /// `delay_seconds`.
    async fn schedule_retry(
        &self,
        record_id: &str,
        delay_seconds: i64,
        error: Option<String>,
    ) -> Result<()>;

    /// Park a record as permanently failed; it stays on disk until an
    /// explicit [`discard_dead`](Self::discard_dead).
    async fn mark_dead(&self, record_id: &str, error: Option<String>) -> Result<()>;

    /// Drop a dead record after manual intervention. Returns false when the
    /// id was absent or not dead.
    async fn discard_dead(&self, record_id: &str) -> Result<bool>;

    fn pending_count(&self, profile_id: &str) -> Result<i64>;

    fn list_dead(&self, profile_id: &str) -> Result<Vec<QueuedRecord>>;

    fn engine_status(&self, profile_id: &str) -> Result<SyncEngineStatus>;

    async fn mark_cycle_outcome(
        &self,
        profile_id: &str,
        status: String,
        duration_ms: i64,
        next_retry_at: Option<String>,
    ) -> Result<()>;

    async fn mark_engine_error(&self, profile_id: &str, message: String) -> Result<()>;

    async fn mark_sync_completed(&self, profile_id: &str) -> Result<()>;
}
