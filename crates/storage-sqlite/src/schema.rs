//! Diesel schema for the sync and hydration tables.

diesel::table! {
    sync_queue (id) {
        id -> Text,
        profile_id -> Text,
        endpoint -> Text,
        payload -> Text,
        status -> Text,
        attempts -> Integer,
        next_retry_at -> Nullable<Text>,
        last_error -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    sync_applied_events (event_id) {
        event_id -> Text,
        profile_id -> Text,
        applied_at -> Text,
    }
}

diesel::table! {
    sync_engine_state (profile_id) {
        profile_id -> Text,
        last_sync_at -> Nullable<Text>,
        last_error -> Nullable<Text>,
        consecutive_failures -> Integer,
        next_retry_at -> Nullable<Text>,
        last_cycle_status -> Nullable<Text>,
        last_cycle_duration_ms -> Nullable<BigInt>,
    }
}

diesel::table! {
    hydration_streaks (profile_id) {
        profile_id -> Text,
        current_streak -> Integer,
        longest_streak -> Integer,
        daily_goal_liters -> Double,
        today_progress_liters -> Double,
        last_log_date -> Nullable<Text>,
        goal_met_on -> Nullable<Text>,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    sync_queue,
    sync_applied_events,
    sync_engine_state,
    hydration_streaks,
);
