//! Engine-facing models: retry policy, drain outcomes, observable events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::QueuedRecord;

/// Retry policy classification for delivery failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        408 | 409 | 423 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

/// Exponential backoff in seconds with cap.
pub fn backoff_seconds(consecutive_failures: i32) -> i64 {
    const MAX_EXPONENT: i32 = 8;
    const BASE_DELAY_SECONDS: i64 = 5;

    let capped = consecutive_failures.clamp(0, MAX_EXPONENT);
    2_i64.pow(capped as u32) * BASE_DELAY_SECONDS
}

/// A delivery failure as reported by the transport.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub message: String,
    pub retry_class: SyncRetryClass,
}

impl DeliveryError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_class: SyncRetryClass::Retryable,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_class: SyncRetryClass::Permanent,
        }
    }
}

/// Transport seam: delivers one record to its destination.
#[async_trait]
pub trait RecordDeliverer: Send + Sync {
    async fn deliver(&self, record: &QueuedRecord) -> std::result::Result<(), DeliveryError>;
}

/// What prompted a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainTrigger {
    Startup,
    Connectivity,
    LocalMutation,
    Periodic,
    Manual,
}

impl DrainTrigger {
    /// Connectivity transitions and explicit requests ignore scheduled
    /// retry windows; background cadences honor them.
    pub fn forces_immediate(&self) -> bool {
        matches!(self, Self::Connectivity | Self::Manual)
    }
}

/// Lightweight persisted engine status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEngineStatus {
    pub last_sync_at: Option<String>,
    pub last_error: Option<String>,
    pub consecutive_failures: i32,
    pub next_retry_at: Option<String>,
    pub last_cycle_status: Option<String>,
    pub last_cycle_duration_ms: Option<i64>,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    /// The pass got through every due record.
    Ok,
    /// Stopped early on a retryable failure or a not-yet-due record.
    Stalled,
    /// Another drain was already in flight; nothing was attempted.
    Coalesced,
}

/// Summary returned to drain callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub status: DrainStatus,
    pub delivered: usize,
    pub dead: usize,
    pub remaining: i64,
}

/// Observable sync events for status surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncEvent {
    RecordDelivered {
        record_id: String,
    },
    DeliveryFailed {
        record_id: String,
        attempts: i32,
        error: String,
    },
    /// Attempt budget exhausted or the service rejected the payload
    /// outright; the record is retained for manual discard.
    RecordDead {
        record_id: String,
        error: Option<String>,
    },
    DrainCompleted {
        delivered: usize,
        status: DrainStatus,
    },
}
