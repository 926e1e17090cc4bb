//! Hydration streak state and its day-rollover rules.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Default daily goal in liters.
pub const DEFAULT_DAILY_GOAL_LITERS: f64 = 2.5;

/// Derived daily-progress and streak counters.
///
/// `today_progress_liters` is only ever attributed to the calendar day in
/// `last_log_date`; crossing a day boundary resets progress and leaves the
/// streak untouched. Reaching the goal increments `current_streak` at most
/// once per calendar day (guarded by `goal_met_on`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationStreak {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub daily_goal_liters: f64,
    pub today_progress_liters: f64,
    pub last_log_date: Option<NaiveDate>,
    pub goal_met_on: Option<NaiveDate>,
}

impl Default for HydrationStreak {
    fn default() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            daily_goal_liters: DEFAULT_DAILY_GOAL_LITERS,
            today_progress_liters: 0.0,
            last_log_date: None,
            goal_met_on: None,
        }
    }
}

impl HydrationStreak {
    /// Progress attributed to `today`; stored progress from an earlier day
    /// reads as zero.
    pub fn progress_on(&self, today: NaiveDate) -> f64 {
        if self.last_log_date == Some(today) {
            self.today_progress_liters
        } else {
            0.0
        }
    }

    /// Read-only view rolled forward to `today` without mutating stored
    /// state.
    pub fn view_for(&self, today: NaiveDate) -> HydrationStreak {
        let mut view = self.clone();
        if view.last_log_date != Some(today) {
            view.today_progress_liters = 0.0;
        }
        view
    }

    /// Apply one confirmed water log dated `day`.
    ///
    /// Negative or non-finite amounts are clamped to zero. Logs dated before
    /// `last_log_date` arrive too late to reconstruct that day's progress and
    /// are no-ops.
    pub fn apply_log(&mut self, amount_liters: f64, day: NaiveDate) {
        let amount = if amount_liters.is_finite() {
            amount_liters.max(0.0)
        } else {
            0.0
        };

        match self.last_log_date {
            Some(last) if day < last => return,
            Some(last) if day > last => self.today_progress_liters = 0.0,
            None => self.today_progress_liters = 0.0,
            _ => {}
        }

        self.last_log_date = Some(day);
        self.today_progress_liters += amount;

        if self.today_progress_liters >= self.daily_goal_liters && self.goal_met_on != Some(day) {
            self.current_streak += 1;
            self.goal_met_on = Some(day);
        }
        if self.longest_streak < self.current_streak {
            self.longest_streak = self.current_streak;
        }
    }
}

/// Streak snapshot store contract.
#[async_trait]
pub trait StreakRepositoryTrait: Send + Sync {
    fn load(&self, profile_id: &str) -> Result<Option<HydrationStreak>>;

    /// Persist a snapshot attributed to `event_id`, atomically with the
    /// applied-event ledger. Returns false (and stores nothing) when the
    /// event was already applied.
    async fn persist(
        &self,
        profile_id: &str,
        streak: &HydrationStreak,
        event_id: &str,
    ) -> Result<bool>;

    /// Persist a snapshot for a local, non-queued mutation (goal change).
    async fn persist_local(&self, profile_id: &str, streak: &HydrationStreak) -> Result<()>;
}
