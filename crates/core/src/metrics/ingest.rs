//! Metric ingest API: the narrow surface UI layers call to submit readings.

use chrono::Utc;
use log::debug;
use std::sync::{Arc, Mutex, OnceLock};
use uuid::{ContextV7, Timestamp, Uuid};

use crate::errors::Result;
use crate::sync::{DrainTrigger, QueueStatus, QueuedRecord, SyncEngine, SyncRepositoryTrait};

use super::IngestPayload;

static ID_CONTEXT: OnceLock<Mutex<ContextV7>> = OnceLock::new();

/// Time-ordered unique record id. The shared context keeps ids monotonic
/// even for concurrent submissions within the same millisecond.
fn next_record_id() -> String {
    let context = ID_CONTEXT.get_or_init(|| Mutex::new(ContextV7::new()));
    let context = context.lock().expect("id context poisoned");
    Uuid::new_v7(Timestamp::now(&*context)).to_string()
}

/// Accepts readings and water-log events from the UI.
///
/// `submit` never blocks on the network: the record is appended to the
/// durable queue synchronously, then a best-effort drain runs in the
/// background. Must be called from within a tokio runtime.
pub struct IngestService {
    profile_id: String,
    repository: Arc<dyn SyncRepositoryTrait>,
    engine: Arc<SyncEngine>,
}

impl IngestService {
    pub fn new(
        profile_id: impl Into<String>,
        repository: Arc<dyn SyncRepositoryTrait>,
        engine: Arc<SyncEngine>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            repository,
            engine,
        }
    }

    /// Queue a payload for delivery and return the record id.
    ///
    /// Ids are UUIDv7: unique under concurrent submissions and time-ordered,
    /// so later submissions always sort after earlier ones.
    pub async fn submit(&self, payload: IngestPayload) -> Result<String> {
        payload.validate()?;

        let record = QueuedRecord {
            id: next_record_id(),
            profile_id: self.profile_id.clone(),
            endpoint: payload.endpoint(),
            payload: payload.to_wire_json()?,
            status: QueueStatus::Pending,
            attempts: 0,
            next_retry_at: None,
            last_error: None,
            created_at: Utc::now().to_rfc3339(),
        };
        let record_id = record.id.clone();

        self.repository.append(record).await?;
        debug!(
            "[Ingest] queued record {} for {:?}",
            record_id,
            payload.endpoint()
        );

        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let _ = engine.drain(DrainTrigger::LocalMutation).await;
        });

        Ok(record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydration::StreakReconciler;
    use crate::metrics::WaterLog;
    use crate::sync::tests::{
        InMemoryStreakRepository, InMemorySyncRepository, ScriptedDeliverer,
    };
    use crate::sync::SyncEngineConfig;

    fn ingest() -> (IngestService, Arc<InMemorySyncRepository>) {
        let repository = Arc::new(InMemorySyncRepository::default());
        let reconciler = Arc::new(
            StreakReconciler::load(Arc::new(InMemoryStreakRepository::default()), "device-1")
                .expect("load reconciler"),
        );
        // Keep the background drain from consuming records mid-assertion.
        let deliverer = ScriptedDeliverer::new();
        deliverer.take_service_down(crate::sync::DeliveryError::retryable("offline"));
        let engine = Arc::new(crate::sync::SyncEngine::new(
            "device-1",
            Arc::clone(&repository) as Arc<dyn SyncRepositoryTrait>,
            Arc::new(deliverer),
            reconciler,
            SyncEngineConfig::default(),
        ));
        (
            IngestService::new("device-1", Arc::clone(&repository) as _, engine),
            repository,
        )
    }

    #[test]
    fn record_ids_are_strictly_increasing() {
        let ids: Vec<String> = (0..200).map(|_| next_record_id()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn submit_appends_before_returning() {
        let (ingest, repository) = ingest();
        let id = ingest
            .submit(IngestPayload::Water(WaterLog::now(0.5)))
            .await
            .expect("submit");

        let pending = repository.list_pending("device-1", 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
    }

    #[tokio::test]
    async fn rejected_payloads_never_touch_the_queue() {
        let (ingest, repository) = ingest();
        assert!(ingest
            .submit(IngestPayload::Water(WaterLog::now(0.0)))
            .await
            .is_err());
        assert_eq!(repository.pending_count("device-1").unwrap(), 0);
    }
}
