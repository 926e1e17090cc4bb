//! Repository for the durable outbound queue and engine state.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use log::warn;
use std::sync::Arc;

use hydromon_core::errors::Result;
use hydromon_core::sync::{QueueStatus, QueuedRecord, SyncEngineStatus, SyncRepositoryTrait};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{sync_engine_state, sync_queue};

use super::model::{SyncEngineStateDB, SyncQueueRecordDB};

pub(crate) fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

pub struct SyncRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SyncRepository { pool, writer }
    }

    fn to_record(row: SyncQueueRecordDB) -> Result<QueuedRecord> {
        Ok(QueuedRecord {
            id: row.id,
            profile_id: row.profile_id,
            endpoint: enum_from_db(&row.endpoint)?,
            payload: row.payload,
            status: enum_from_db(&row.status)?,
            attempts: row.attempts,
            next_retry_at: row.next_retry_at,
            last_error: row.last_error,
            created_at: row.created_at,
        })
    }

    fn from_record(record: QueuedRecord) -> Result<SyncQueueRecordDB> {
        Ok(SyncQueueRecordDB {
            endpoint: enum_to_db(&record.endpoint)?,
            status: enum_to_db(&record.status)?,
            id: record.id,
            profile_id: record.profile_id,
            payload: record.payload,
            attempts: record.attempts,
            next_retry_at: record.next_retry_at,
            last_error: record.last_error,
            created_at: record.created_at,
        })
    }

    /// Decode rows, dropping any that no longer parse so one corrupt entry
    /// never wedges the queue. Returns the ids that must be purged.
    fn decode_rows(rows: Vec<SyncQueueRecordDB>) -> (Vec<QueuedRecord>, Vec<String>) {
        let mut records = Vec::with_capacity(rows.len());
        let mut corrupt_ids = Vec::new();
        for row in rows {
            let row_id = row.id.clone();
            match Self::to_record(row) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!("[Storage] dropping unreadable queue record {}: {}", row_id, err);
                    corrupt_ids.push(row_id);
                }
            }
        }
        (records, corrupt_ids)
    }

    async fn purge(&self, corrupt_ids: Vec<String>) -> Result<()> {
        if corrupt_ids.is_empty() {
            return Ok(());
        }
        self.writer
            .exec(move |conn| {
                diesel::delete(sync_queue::table.filter(sync_queue::id.eq_any(&corrupt_ids)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn load_status_row(&self, profile_id: &str) -> Result<Option<SyncEngineStateDB>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(sync_engine_state::table
            .find(profile_id)
            .first::<SyncEngineStateDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?)
    }
}

#[async_trait]
impl SyncRepositoryTrait for SyncRepository {
    async fn append(&self, record: QueuedRecord) -> Result<()> {
        let row = Self::from_record(record)?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_queue::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn list_pending(&self, profile_id: &str, limit: i64) -> Result<Vec<QueuedRecord>> {
        let pending_tag = enum_to_db(&QueueStatus::Pending)?;
        let rows = {
            let mut conn = get_connection(&self.pool)?;
            sync_queue::table
                .filter(sync_queue::profile_id.eq(profile_id))
                .filter(sync_queue::status.eq(&pending_tag))
                .order((sync_queue::created_at.asc(), sync_queue::id.asc()))
                .limit(limit)
                .load::<SyncQueueRecordDB>(&mut conn)
                .map_err(StorageError::from)?
        };

        let (records, corrupt_ids) = Self::decode_rows(rows);
        self.purge(corrupt_ids).await?;
        Ok(records)
    }

    async fn remove(&self, record_id: &str) -> Result<bool> {
        let record_id = record_id.to_string();
        self.writer
            .exec(move |conn| {
                let affected = diesel::delete(sync_queue::table.find(&record_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn schedule_retry(
        &self,
        record_id: &str,
        delay_seconds: i64,
        error: Option<String>,
    ) -> Result<()> {
        let record_id = record_id.to_string();
        let next_retry_at = (Utc::now() + Duration::seconds(delay_seconds)).to_rfc3339();
        self.writer
            .exec(move |conn| {
                diesel::update(sync_queue::table.find(&record_id))
                    .set((
                        sync_queue::attempts.eq(sync_queue::attempts + 1),
                        sync_queue::next_retry_at.eq(Some(next_retry_at)),
                        sync_queue::last_error.eq(error),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn mark_dead(&self, record_id: &str, error: Option<String>) -> Result<()> {
        let record_id = record_id.to_string();
        let dead_tag = enum_to_db(&QueueStatus::Dead)?;
        self.writer
            .exec(move |conn| {
                diesel::update(sync_queue::table.find(&record_id))
                    .set((
                        sync_queue::status.eq(dead_tag),
                        sync_queue::attempts.eq(sync_queue::attempts + 1),
                        sync_queue::next_retry_at.eq(None::<String>),
                        sync_queue::last_error.eq(error),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn discard_dead(&self, record_id: &str) -> Result<bool> {
        let record_id = record_id.to_string();
        let dead_tag = enum_to_db(&QueueStatus::Dead)?;
        self.writer
            .exec(move |conn| {
                let affected = diesel::delete(
                    sync_queue::table
                        .find(&record_id)
                        .filter(sync_queue::status.eq(&dead_tag)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    fn pending_count(&self, profile_id: &str) -> Result<i64> {
        let pending_tag = enum_to_db(&QueueStatus::Pending)?;
        let mut conn = get_connection(&self.pool)?;
        Ok(sync_queue::table
            .filter(sync_queue::profile_id.eq(profile_id))
            .filter(sync_queue::status.eq(&pending_tag))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn list_dead(&self, profile_id: &str) -> Result<Vec<QueuedRecord>> {
        let dead_tag = enum_to_db(&QueueStatus::Dead)?;
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_queue::table
            .filter(sync_queue::profile_id.eq(profile_id))
            .filter(sync_queue::status.eq(&dead_tag))
            .order((sync_queue::created_at.asc(), sync_queue::id.asc()))
            .load::<SyncQueueRecordDB>(&mut conn)
            .map_err(StorageError::from)?;

        // Corrupt dead rows only get logged here; purging happens on the
        // pending path, which is the one the engine depends on.
        let (records, _corrupt_ids) = Self::decode_rows(rows);
        Ok(records)
    }

    fn engine_status(&self, profile_id: &str) -> Result<SyncEngineStatus> {
        Ok(self
            .load_status_row(profile_id)?
            .map(|row| SyncEngineStatus {
                last_sync_at: row.last_sync_at,
                last_error: row.last_error,
                consecutive_failures: row.consecutive_failures,
                next_retry_at: row.next_retry_at,
                last_cycle_status: row.last_cycle_status,
                last_cycle_duration_ms: row.last_cycle_duration_ms,
            })
            .unwrap_or_default())
    }

    async fn mark_cycle_outcome(
        &self,
        profile_id: &str,
        status: String,
        duration_ms: i64,
        next_retry_at: Option<String>,
    ) -> Result<()> {
        let row = SyncEngineStateDB {
            profile_id: profile_id.to_string(),
            last_sync_at: None,
            last_error: None,
            consecutive_failures: 0,
            next_retry_at: next_retry_at.clone(),
            last_cycle_status: Some(status.clone()),
            last_cycle_duration_ms: Some(duration_ms),
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_engine_state::table)
                    .values(&row)
                    .on_conflict(sync_engine_state::profile_id)
                    .do_update()
                    .set((
                        sync_engine_state::last_cycle_status.eq(Some(status)),
                        sync_engine_state::last_cycle_duration_ms.eq(Some(duration_ms)),
                        sync_engine_state::next_retry_at.eq(next_retry_at),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn mark_engine_error(&self, profile_id: &str, message: String) -> Result<()> {
        let row = SyncEngineStateDB {
            profile_id: profile_id.to_string(),
            last_sync_at: None,
            last_error: Some(message.clone()),
            consecutive_failures: 1,
            next_retry_at: None,
            last_cycle_status: None,
            last_cycle_duration_ms: None,
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_engine_state::table)
                    .values(&row)
                    .on_conflict(sync_engine_state::profile_id)
                    .do_update()
                    .set((
                        sync_engine_state::last_error.eq(Some(message)),
                        sync_engine_state::consecutive_failures
                            .eq(sync_engine_state::consecutive_failures + 1),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn mark_sync_completed(&self, profile_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let row = SyncEngineStateDB {
            profile_id: profile_id.to_string(),
            last_sync_at: Some(now.clone()),
            last_error: None,
            consecutive_failures: 0,
            next_retry_at: None,
            last_cycle_status: None,
            last_cycle_duration_ms: None,
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_engine_state::table)
                    .values(&row)
                    .on_conflict(sync_engine_state::profile_id)
                    .do_update()
                    .set((
                        sync_engine_state::last_sync_at.eq(Some(now)),
                        sync_engine_state::last_error.eq(None::<String>),
                        sync_engine_state::consecutive_failures.eq(0),
                        sync_engine_state::next_retry_at.eq(None::<String>),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydromon_core::metrics::SyncEndpoint;

    #[test]
    fn endpoint_tags_match_the_stored_contract() {
        assert_eq!(
            enum_to_db(&SyncEndpoint::UpdateMetrics).unwrap(),
            "update_metrics"
        );
        assert_eq!(enum_to_db(&SyncEndpoint::LogWater).unwrap(), "log_water");
        assert_eq!(enum_to_db(&QueueStatus::Pending).unwrap(), "pending");
        assert_eq!(enum_to_db(&QueueStatus::Dead).unwrap(), "dead");
    }

    #[test]
    fn tags_round_trip_and_unknown_tags_fail() {
        let endpoint: SyncEndpoint = enum_from_db("log_water").unwrap();
        assert_eq!(endpoint, SyncEndpoint::LogWater);
        assert!(enum_from_db::<SyncEndpoint>("telemetry_v9").is_err());
    }
}
