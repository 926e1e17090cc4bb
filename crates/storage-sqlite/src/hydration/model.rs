//! Database model for the hydration streak snapshot.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(profile_id))]
#[diesel(table_name = crate::schema::hydration_streaks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HydrationStreakDB {
    pub profile_id: String,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub daily_goal_liters: f64,
    pub today_progress_liters: f64,
    pub last_log_date: Option<String>,
    pub goal_met_on: Option<String>,
    pub updated_at: String,
}
