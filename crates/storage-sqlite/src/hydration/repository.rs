//! Repository for the hydration streak snapshot and applied-event ledger.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::warn;
use std::sync::Arc;

use hydromon_core::errors::Result;
use hydromon_core::hydration::{HydrationStreak, StreakRepositoryTrait};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{hydration_streaks, sync_applied_events};

use super::model::HydrationStreakDB;
use crate::sync::SyncAppliedEventDB;

pub struct StreakRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl StreakRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        StreakRepository { pool, writer }
    }

    fn to_streak(row: HydrationStreakDB) -> HydrationStreak {
        HydrationStreak {
            // Counters below zero can only come from a damaged snapshot;
            // clamp instead of propagating them into the streak rules.
            current_streak: row.current_streak.max(0),
            longest_streak: row.longest_streak.max(row.current_streak.max(0)),
            daily_goal_liters: row.daily_goal_liters,
            today_progress_liters: row.today_progress_liters.max(0.0),
            last_log_date: parse_day(row.last_log_date.as_deref(), &row.profile_id),
            goal_met_on: parse_day(row.goal_met_on.as_deref(), &row.profile_id),
        }
    }

    fn from_streak(profile_id: &str, streak: &HydrationStreak) -> HydrationStreakDB {
        HydrationStreakDB {
            profile_id: profile_id.to_string(),
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            daily_goal_liters: streak.daily_goal_liters,
            today_progress_liters: streak.today_progress_liters,
            last_log_date: streak.last_log_date.map(|day| day.to_string()),
            goal_met_on: streak.goal_met_on.map(|day| day.to_string()),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

fn parse_day(value: Option<&str>, profile_id: &str) -> Option<NaiveDate> {
    let raw = value?;
    match raw.parse::<NaiveDate>() {
        Ok(day) => Some(day),
        Err(err) => {
            warn!(
                "[Storage] unreadable streak date '{}' for {}: {}",
                raw, profile_id, err
            );
            None
        }
    }
}

fn upsert_streak(
    conn: &mut SqliteConnection,
    row: &HydrationStreakDB,
) -> diesel::QueryResult<usize> {
    diesel::insert_into(hydration_streaks::table)
        .values(row)
        .on_conflict(hydration_streaks::profile_id)
        .do_update()
        .set(row)
        .execute(conn)
}

#[async_trait]
impl StreakRepositoryTrait for StreakRepository {
    fn load(&self, profile_id: &str) -> Result<Option<HydrationStreak>> {
        let mut conn = get_connection(&self.pool)?;
        let row = hydration_streaks::table
            .find(profile_id)
            .first::<HydrationStreakDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Self::to_streak))
    }

    async fn persist(
        &self,
        profile_id: &str,
        streak: &HydrationStreak,
        event_id: &str,
    ) -> Result<bool> {
        let row = Self::from_streak(profile_id, streak);
        let event_row = SyncAppliedEventDB {
            event_id: event_id.to_string(),
            profile_id: profile_id.to_string(),
            applied_at: Utc::now().to_rfc3339(),
        };

        self.writer
            .exec(move |conn| {
                let applied = conn
                    .transaction::<bool, diesel::result::Error, _>(|conn| {
                        let already = sync_applied_events::table
                            .find(&event_row.event_id)
                            .first::<SyncAppliedEventDB>(conn)
                            .optional()?
                            .is_some();
                        if already {
                            return Ok(false);
                        }
                        diesel::insert_into(sync_applied_events::table)
                            .values(&event_row)
                            .execute(conn)?;
                        upsert_streak(conn, &row)?;
                        Ok(true)
                    })
                    .map_err(StorageError::from)?;
                Ok(applied)
            })
            .await
    }

    async fn persist_local(&self, profile_id: &str, streak: &HydrationStreak) -> Result<()> {
        let row = Self::from_streak(profile_id, streak);
        self.writer
            .exec(move |conn| {
                upsert_streak(conn, &row).map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
