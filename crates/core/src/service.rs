//! `HydromonService`: the narrow surface UI layers call.
//!
//! Wires the ingest API, drain engine, reconciler, and connectivity monitor
//! together and owns the background workers. Every method here returns
//! quickly; network and storage I/O happens off the caller's path.

use log::warn;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::connectivity::{ConnectivityMonitor, ConnectivityState, ReachabilityProbe};
use crate::errors::Result;
use crate::hydration::{HydrationStreak, StreakReconciler, StreakRepositoryTrait};
use crate::metrics::{IngestPayload, IngestService};
use crate::sync::{
    next_drain_delay_ms, DrainReport, DrainTrigger, QueuedRecord, RecordDeliverer, SyncEngine,
    SyncEngineConfig, SyncEngineStatus, SyncEvent, SyncRepositoryTrait,
    CONNECTIVITY_POLL_INTERVAL_SECS,
};

pub struct HydromonService {
    profile_id: String,
    repository: Arc<dyn SyncRepositoryTrait>,
    ingest: IngestService,
    engine: Arc<SyncEngine>,
    reconciler: Arc<StreakReconciler>,
    connectivity: Arc<ConnectivityMonitor>,
    probe: Arc<dyn ReachabilityProbe>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl HydromonService {
    pub fn new(
        profile_id: impl Into<String>,
        repository: Arc<dyn SyncRepositoryTrait>,
        streak_repository: Arc<dyn StreakRepositoryTrait>,
        deliverer: Arc<dyn RecordDeliverer>,
        probe: Arc<dyn ReachabilityProbe>,
        config: SyncEngineConfig,
    ) -> Result<Self> {
        let profile_id = profile_id.into();
        let reconciler = Arc::new(StreakReconciler::load(streak_repository, &profile_id)?);
        let engine = Arc::new(SyncEngine::new(
            profile_id.clone(),
            Arc::clone(&repository),
            deliverer,
            Arc::clone(&reconciler),
            config,
        ));
        let ingest = IngestService::new(
            profile_id.clone(),
            Arc::clone(&repository),
            Arc::clone(&engine),
        );

        Ok(Self {
            profile_id,
            repository,
            ingest,
            engine,
            reconciler,
            connectivity: Arc::new(ConnectivityMonitor::new()),
            probe,
            workers: Mutex::new(Vec::new()),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // UI boundary
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue a reading or water-log event. Never blocks on the network.
    pub async fn submit(&self, payload: IngestPayload) -> Result<String> {
        self.ingest.submit(payload).await
    }

    /// Streak counters rolled forward to today's local calendar day.
    pub async fn current_streak(&self) -> HydrationStreak {
        self.reconciler.snapshot().await
    }

    pub fn pending_count(&self) -> Result<i64> {
        self.repository.pending_count(&self.profile_id)
    }

    pub fn last_sync_time(&self) -> Result<Option<String>> {
        Ok(self.repository.engine_status(&self.profile_id)?.last_sync_at)
    }

    pub fn sync_status(&self) -> Result<SyncEngineStatus> {
        self.repository.engine_status(&self.profile_id)
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.engine.subscribe()
    }

    /// Force a drain attempt right now (e.g. pull-to-refresh).
    pub async fn sync_now(&self) -> Result<DrainReport> {
        self.engine.drain(DrainTrigger::Manual).await
    }

    pub async fn set_daily_goal(&self, liters: f64) -> Result<HydrationStreak> {
        self.reconciler.set_daily_goal(liters).await
    }

    /// Permanently failed records awaiting manual intervention.
    pub fn list_dead(&self) -> Result<Vec<QueuedRecord>> {
        self.repository.list_dead(&self.profile_id)
    }

    /// Drop a permanently failed record after the user chose to discard it.
    pub async fn discard_dead(&self, record_id: &str) -> Result<bool> {
        self.repository.discard_dead(record_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background workers
    // ─────────────────────────────────────────────────────────────────────────

    /// Spawn the drain and connectivity workers. Idempotent while workers
    /// are alive.
    pub async fn start(self: &Arc<Self>) {
        let mut workers = self.workers.lock().await;
        if workers.iter().any(|handle| !handle.is_finished()) {
            return;
        }
        workers.clear();
        workers.push(self.spawn_drain_loop());
        workers.push(self.spawn_connectivity_loop());
    }

    /// Abort background workers. A drain in flight is cancelled; partially
    /// attempted records stay queued and are retried on the next drain.
    pub async fn stop(&self) {
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            handle.abort();
        }
    }

    fn spawn_drain_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut trigger = DrainTrigger::Startup;
            loop {
                if let Err(err) = service.engine.drain(trigger).await {
                    warn!("[Sync] background drain failed: {}", err);
                }

                let next_retry_at = service
                    .repository
                    .engine_status(&service.profile_id)
                    .ok()
                    .and_then(|status| status.next_retry_at);
                let has_pending = service
                    .repository
                    .pending_count(&service.profile_id)
                    .map(|count| count > 0)
                    .unwrap_or(false);
                let delay_ms = next_drain_delay_ms(next_retry_at.as_deref(), has_pending);
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                trigger = DrainTrigger::Periodic;
            }
        })
    }

    fn spawn_connectivity_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let reachable = service.probe.check().await;
                if service.connectivity.record_probe_result(reachable) {
                    let engine = Arc::clone(&service.engine);
                    tokio::spawn(async move {
                        if let Err(err) = engine.drain(DrainTrigger::Connectivity).await {
                            warn!("[Sync] connectivity-triggered drain failed: {}", err);
                        }
                    });
                }
                tokio::time::sleep(std::time::Duration::from_secs(
                    CONNECTIVITY_POLL_INTERVAL_SECS,
                ))
                .await;
            }
        })
    }
}
