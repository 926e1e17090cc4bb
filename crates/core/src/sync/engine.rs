//! Drain engine: FIFO delivery with retry scheduling and coalescing.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

use crate::errors::Result;
use crate::hydration::StreakReconciler;
use crate::metrics::SyncEndpoint;

use super::{
    backoff_seconds, DeliveryError, DrainReport, DrainStatus, DrainTrigger, QueuedRecord,
    RecordDeliverer, SyncEvent, SyncRepositoryTrait, SyncRetryClass,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tunables for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Delivery attempts before a record is parked as dead.
    pub max_attempts: i32,
    /// Per-record delivery timeout.
    pub delivery_timeout: Duration,
    /// Records examined per drain pass.
    pub drain_batch_limit: i64,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delivery_timeout: Duration::from_secs(30),
            drain_batch_limit: 500,
        }
    }
}

/// Delivers queued records to the aggregation service in FIFO order.
///
/// At most one drain runs at a time; concurrent triggers coalesce into a
/// no-op. Record N+1 is never attempted before record N was acknowledged
/// or parked as dead, so streak-affecting events replay in causal order.
pub struct SyncEngine {
    profile_id: String,
    repository: Arc<dyn SyncRepositoryTrait>,
    deliverer: Arc<dyn RecordDeliverer>,
    reconciler: Arc<StreakReconciler>,
    config: SyncEngineConfig,
    drain_mutex: Mutex<()>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        profile_id: impl Into<String>,
        repository: Arc<dyn SyncRepositoryTrait>,
        deliverer: Arc<dyn RecordDeliverer>,
        reconciler: Arc<StreakReconciler>,
        config: SyncEngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            profile_id: profile_id.into(),
            repository,
            deliverer,
            reconciler,
            config,
            drain_mutex: Mutex::new(()),
            events,
        }
    }

    /// Subscribe to sync events for status surfaces.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Run one drain pass.
    ///
    /// Delivery failures never escape as errors; they become retry state and
    /// observable events. Only storage failures propagate.
    pub async fn drain(&self, trigger: DrainTrigger) -> Result<DrainReport> {
        let Ok(_guard) = self.drain_mutex.try_lock() else {
            debug!("[Sync] drain ({:?}) coalesced into in-flight drain", trigger);
            return Ok(DrainReport {
                status: DrainStatus::Coalesced,
                delivered: 0,
                dead: 0,
                remaining: self.repository.pending_count(&self.profile_id)?,
            });
        };

        let started_at = std::time::Instant::now();
        let pending = self
            .repository
            .list_pending(&self.profile_id, self.config.drain_batch_limit)
            .await?;
        debug!(
            "[Sync] drain ({:?}) starting with {} pending record(s)",
            trigger,
            pending.len()
        );

        let now = Utc::now();
        let mut delivered = 0usize;
        let mut dead = 0usize;
        let mut stalled = false;
        let mut retry_at: Option<String> = None;

        for record in pending {
            if !trigger.forces_immediate() && !is_due(&record, now) {
                // Everything behind this record waits with it; skipping ahead
                // would reorder streak-affecting events.
                retry_at = record.next_retry_at.clone();
                stalled = true;
                break;
            }

            let outcome = tokio::time::timeout(
                self.config.delivery_timeout,
                self.deliverer.deliver(&record),
            )
            .await;

            let error = match outcome {
                Ok(Ok(())) => {
                    self.confirm(&record).await?;
                    delivered += 1;
                    let _ = self.events.send(SyncEvent::RecordDelivered {
                        record_id: record.id.clone(),
                    });
                    continue;
                }
                Ok(Err(err)) => err,
                Err(_) => DeliveryError::retryable(format!(
                    "delivery timed out after {:?}",
                    self.config.delivery_timeout
                )),
            };

            let attempts = record.attempts + 1;
            if error.retry_class == SyncRetryClass::Permanent || attempts >= self.config.max_attempts
            {
                warn!(
                    "[Sync] record {} dead after {} attempt(s): {}",
                    record.id, attempts, error.message
                );
                self.repository
                    .mark_dead(&record.id, Some(error.message.clone()))
                    .await?;
                dead += 1;
                let _ = self.events.send(SyncEvent::RecordDead {
                    record_id: record.id.clone(),
                    error: Some(error.message),
                });
                // A dead record no longer blocks the records behind it.
                continue;
            }

            let delay = backoff_seconds(record.attempts);
            debug!(
                "[Sync] record {} failed (attempt {}), retrying in {}s: {}",
                record.id, attempts, delay, error.message
            );
            self.repository
                .schedule_retry(&record.id, delay, Some(error.message.clone()))
                .await?;
            self.repository
                .mark_engine_error(&self.profile_id, error.message.clone())
                .await?;
            retry_at = Some((now + chrono::Duration::seconds(delay)).to_rfc3339());
            let _ = self.events.send(SyncEvent::DeliveryFailed {
                record_id: record.id.clone(),
                attempts,
                error: error.message,
            });
            stalled = true;
            break;
        }

        let duration_ms = started_at.elapsed().as_millis() as i64;
        let status = if stalled {
            DrainStatus::Stalled
        } else {
            DrainStatus::Ok
        };
        if stalled {
            self.repository
                .mark_cycle_outcome(&self.profile_id, "stalled".to_string(), duration_ms, retry_at)
                .await?;
        } else {
            if delivered > 0 {
                self.repository.mark_sync_completed(&self.profile_id).await?;
            }
            self.repository
                .mark_cycle_outcome(&self.profile_id, "ok".to_string(), duration_ms, None)
                .await?;
        }

        let remaining = self.repository.pending_count(&self.profile_id)?;
        let _ = self.events.send(SyncEvent::DrainCompleted { delivered, status });
        Ok(DrainReport {
            status,
            delivered,
            dead,
            remaining,
        })
    }

    /// Apply a confirmed record, then drop it from the queue.
    ///
    /// The reconciler runs first: it is idempotent per record id, so a crash
    /// between the two steps only causes a duplicate delivery, never a lost
    /// streak update.
    async fn confirm(&self, record: &QueuedRecord) -> Result<()> {
        if record.endpoint == SyncEndpoint::LogWater {
            self.reconciler.apply_confirmed_record(record).await?;
        }
        self.repository.remove(&record.id).await?;
        Ok(())
    }
}

fn is_due(record: &QueuedRecord, now: DateTime<Utc>) -> bool {
    match record.next_retry_at.as_deref() {
        Some(value) => match DateTime::parse_from_rfc3339(value) {
            Ok(at) => at.with_timezone(&Utc) <= now,
            Err(_) => true,
        },
        None => true,
    }
}
