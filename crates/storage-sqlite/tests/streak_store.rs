//! Streak snapshot persistence and the applied-event ledger.

mod common;

use chrono::NaiveDate;
use common::{open_store, PROFILE};
use diesel::prelude::*;
use hydromon_core::hydration::{HydrationStreak, StreakRepositoryTrait};
use hydromon_storage_sqlite::hydration::HydrationStreakDB;
use hydromon_storage_sqlite::StreakRepository;

fn day(value: &str) -> NaiveDate {
    value.parse().expect("valid date")
}

fn streak() -> HydrationStreak {
    HydrationStreak {
        current_streak: 2,
        longest_streak: 6,
        daily_goal_liters: 2.5,
        today_progress_liters: 1.4,
        last_log_date: Some(day("2026-08-06")),
        goal_met_on: Some(day("2026-08-05")),
    }
}

#[tokio::test]
async fn snapshot_round_trips_through_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("hydromon.db");

    {
        let (pool, writer) = open_store(&db_path);
        let repo = StreakRepository::new(pool, writer);
        assert!(repo
            .persist(PROFILE, &streak(), "evt-1")
            .await
            .expect("persist"));
    }

    let (pool, writer) = open_store(&db_path);
    let repo = StreakRepository::new(pool, writer);
    let loaded = repo.load(PROFILE).expect("load").expect("present");
    assert_eq!(loaded, streak());
}

#[tokio::test]
async fn replayed_event_id_is_refused_atomically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pool, writer) = open_store(&dir.path().join("hydromon.db"));
    let repo = StreakRepository::new(pool, writer);

    assert!(repo.persist(PROFILE, &streak(), "evt-1").await.unwrap());

    // A replay carries a diverged candidate; nothing may change.
    let mut diverged = streak();
    diverged.today_progress_liters = 99.0;
    diverged.current_streak = 99;
    assert!(!repo.persist(PROFILE, &diverged, "evt-1").await.unwrap());

    let loaded = repo.load(PROFILE).unwrap().unwrap();
    assert_eq!(loaded, streak());
}

#[tokio::test]
async fn distinct_events_keep_applying() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pool, writer) = open_store(&dir.path().join("hydromon.db"));
    let repo = StreakRepository::new(pool, writer);

    assert!(repo.persist(PROFILE, &streak(), "evt-1").await.unwrap());
    let mut next = streak();
    next.today_progress_liters = 2.6;
    next.current_streak = 3;
    next.longest_streak = 6;
    assert!(repo.persist(PROFILE, &next, "evt-2").await.unwrap());

    let loaded = repo.load(PROFILE).unwrap().unwrap();
    assert_eq!(loaded.current_streak, 3);
}

#[tokio::test]
async fn local_goal_change_persists_without_a_ledger_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pool, writer) = open_store(&dir.path().join("hydromon.db"));
    let repo = StreakRepository::new(pool, writer);

    let mut updated = streak();
    updated.daily_goal_liters = 3.0;
    repo.persist_local(PROFILE, &updated).await.expect("persist");

    let loaded = repo.load(PROFILE).unwrap().unwrap();
    assert_eq!(loaded.daily_goal_liters, 3.0);

    // The ledger was not involved, so a queued event with any id still applies.
    assert!(repo.persist(PROFILE, &streak(), "evt-1").await.unwrap());
}

#[tokio::test]
async fn damaged_snapshot_is_clamped_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("hydromon.db");
    let (pool, writer) = open_store(&db_path);

    {
        use hydromon_storage_sqlite::schema::hydration_streaks;
        let mut conn = pool.get().expect("conn");
        let damaged = HydrationStreakDB {
            profile_id: PROFILE.to_string(),
            current_streak: -3,
            longest_streak: 1,
            daily_goal_liters: 2.5,
            today_progress_liters: -0.5,
            last_log_date: Some("not-a-date".to_string()),
            goal_met_on: None,
            updated_at: "2026-08-06T08:00:00Z".to_string(),
        };
        diesel::insert_into(hydration_streaks::table)
            .values(&damaged)
            .execute(&mut conn)
            .expect("insert damaged row");
    }

    let repo = StreakRepository::new(pool, writer);
    let loaded = repo.load(PROFILE).unwrap().unwrap();
    assert_eq!(loaded.current_streak, 0);
    assert_eq!(loaded.today_progress_liters, 0.0);
    assert!(loaded.last_log_date.is_none());
}
