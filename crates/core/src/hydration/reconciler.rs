//! Serialized owner of the hydration streak state.

use chrono::{DateTime, Local, NaiveDate};
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::{Error, Result};
use crate::metrics::WaterLog;
use crate::sync::QueuedRecord;

use super::{HydrationStreak, StreakRepositoryTrait};

/// Applies confirmed water logs to the streak state.
///
/// All mutations are serialized behind a mutex and persisted before the
/// in-memory state advances. Replays of an already-applied record id are
/// no-ops; the applied-event ledger in the store is the source of truth.
pub struct StreakReconciler {
    profile_id: String,
    repository: Arc<dyn StreakRepositoryTrait>,
    state: Mutex<HydrationStreak>,
}

impl StreakReconciler {
    /// Load the persisted snapshot (or start fresh) for `profile_id`.
    pub fn load(repository: Arc<dyn StreakRepositoryTrait>, profile_id: &str) -> Result<Self> {
        let state = repository.load(profile_id)?.unwrap_or_default();
        Ok(Self {
            profile_id: profile_id.to_string(),
            repository,
            state: Mutex::new(state),
        })
    }

    /// Current streak, rolled forward to today's local calendar day.
    pub async fn snapshot(&self) -> HydrationStreak {
        self.state.lock().await.view_for(Local::now().date_naive())
    }

    /// Apply a confirmed water-log record from the queue.
    ///
    /// A malformed payload is logged and skipped so queue confirmation never
    /// wedges on one bad record.
    pub async fn apply_confirmed_record(&self, record: &QueuedRecord) -> Result<()> {
        let log: WaterLog = match serde_json::from_str(&record.payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "[Streak] dropping unreadable water log {}: {}",
                    record.id, err
                );
                return Ok(());
            }
        };
        let day = event_day(&log.logged_at, &record.created_at);
        self.apply_confirmed_log(&record.id, log.amount_liters, day)
            .await
    }

    /// Apply one confirmed log dated `day`. Idempotent per `event_id`.
    pub async fn apply_confirmed_log(
        &self,
        event_id: &str,
        amount_liters: f64,
        day: NaiveDate,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut candidate = state.clone();
        candidate.apply_log(amount_liters, day);

        if self
            .repository
            .persist(&self.profile_id, &candidate, event_id)
            .await?
        {
            debug!(
                "[Streak] applied {} ({}L on {}): progress={:.2} streak={}",
                event_id, amount_liters, day, candidate.today_progress_liters,
                candidate.current_streak
            );
            *state = candidate;
        } else {
            debug!("[Streak] event {} already applied, skipping", event_id);
        }
        Ok(())
    }

    /// Change the daily goal. Local-only; never queued for delivery.
    pub async fn set_daily_goal(&self, liters: f64) -> Result<HydrationStreak> {
        if !liters.is_finite() || liters <= 0.0 {
            return Err(Error::validation(
                "daily goal must be a positive number of liters",
            ));
        }
        let mut state = self.state.lock().await;
        let mut candidate = state.clone();
        candidate.daily_goal_liters = liters;
        self.repository
            .persist_local(&self.profile_id, &candidate)
            .await?;
        *state = candidate;
        Ok(state.clone())
    }
}

/// Local calendar day of an event: the logged timestamp when parseable,
/// falling back to the record's creation time, then to today.
fn event_day(logged_at: &str, created_at: &str) -> NaiveDate {
    DateTime::parse_from_rfc3339(logged_at)
        .or_else(|_| DateTime::parse_from_rfc3339(created_at))
        .map(|at| at.date_naive())
        .unwrap_or_else(|_| Local::now().date_naive())
}
