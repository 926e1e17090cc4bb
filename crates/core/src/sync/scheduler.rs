//! Cadence constants and delay computation for the background workers.

use chrono::Utc;
use rand::Rng;

/// Periodic drain cadence in seconds.
pub const SYNC_PERIODIC_INTERVAL_SECS: u64 = 45;

/// Maximum jitter (seconds) added to periodic intervals.
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 5;

/// Connectivity probe cadence in seconds.
pub const CONNECTIVITY_POLL_INTERVAL_SECS: u64 = 15;

/// Floor for any computed delay.
const MIN_DELAY_MS: u64 = 1_000;

/// Fast-path delay when records are waiting.
const PENDING_DELAY_MS: u64 = 2_000;

/// Milliseconds until an RFC 3339 instant, if it is in the future.
pub fn millis_until_rfc3339(value: &str) -> Option<u64> {
    let target = chrono::DateTime::parse_from_rfc3339(value).ok()?;
    let delta = target.timestamp_millis() - Utc::now().timestamp_millis();
    (delta > 0).then_some(delta as u64)
}

/// Delay before the next periodic drain.
///
/// A scheduled retry stretches the delay to that instant; a non-empty queue
/// shrinks it so fresh submissions do not wait a full interval.
pub fn next_drain_delay_ms(next_retry_at: Option<&str>, has_pending: bool) -> u64 {
    let jitter_ms = rand::thread_rng().gen_range(0..=SYNC_INTERVAL_JITTER_SECS * 1_000);
    let mut delay_ms = SYNC_PERIODIC_INTERVAL_SECS * 1_000 + jitter_ms;

    if let Some(retry_at) = next_retry_at {
        if let Some(wait_ms) = millis_until_rfc3339(retry_at) {
            delay_ms = wait_ms.saturating_add(jitter_ms).max(MIN_DELAY_MS);
        }
    } else if has_pending {
        delay_ms = delay_ms.min(PENDING_DELAY_MS + jitter_ms % 500);
    }

    delay_ms
}
