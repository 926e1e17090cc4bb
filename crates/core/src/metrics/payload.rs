//! Wire payloads accepted at the ingest boundary.
//!
//! Payload shape is checked here, against typed structs, instead of at the
//! network edge. Field renames pin the exact keys the aggregation service
//! expects.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Logical remote destination for a queued record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEndpoint {
    UpdateMetrics,
    LogWater,
}

impl SyncEndpoint {
    /// URL path on the aggregation service.
    pub fn path(&self) -> &'static str {
        match self {
            Self::UpdateMetrics => "/update_metrics",
            Self::LogWater => "/log_water",
        }
    }
}

/// One sensor/health sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    #[serde(rename = "Temp")]
    pub body_temp_celsius: f64,
    #[serde(rename = "HR")]
    pub heart_rate_bpm: f64,
    #[serde(rename = "Acc_X")]
    pub acc_x: f64,
    #[serde(rename = "Acc_Y")]
    pub acc_y: f64,
    #[serde(rename = "Acc_Z")]
    pub acc_z: f64,
    #[serde(rename = "EDA")]
    pub eda: f64,
    #[serde(rename = "Steps")]
    pub steps: f64,
    #[serde(rename = "Active Energy")]
    pub active_energy_kcal: f64,
    #[serde(rename = "Water Intake")]
    pub water_intake_liters: f64,
}

/// A single water-log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterLog {
    pub amount_liters: f64,
    /// RFC 3339 with the local offset, so the calendar day the user logged
    /// on survives storage and replay.
    pub logged_at: String,
}

impl WaterLog {
    /// A water log stamped with the current local time.
    pub fn now(amount_liters: f64) -> Self {
        Self {
            amount_liters,
            logged_at: Local::now().to_rfc3339(),
        }
    }
}

/// Payload accepted by [`crate::metrics::IngestService::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum IngestPayload {
    Metrics(MetricsSample),
    Water(WaterLog),
}

impl IngestPayload {
    /// Destination endpoint for this payload.
    pub fn endpoint(&self) -> SyncEndpoint {
        match self {
            Self::Metrics(_) => SyncEndpoint::UpdateMetrics,
            Self::Water(_) => SyncEndpoint::LogWater,
        }
    }

    /// Reject payloads the aggregation service could never accept.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Metrics(sample) => {
                let fields = [
                    sample.body_temp_celsius,
                    sample.heart_rate_bpm,
                    sample.acc_x,
                    sample.acc_y,
                    sample.acc_z,
                    sample.eda,
                    sample.steps,
                    sample.active_energy_kcal,
                    sample.water_intake_liters,
                ];
                if fields.iter().any(|value| !value.is_finite()) {
                    return Err(Error::validation("metric values must be finite numbers"));
                }
                Ok(())
            }
            Self::Water(log) => {
                if !log.amount_liters.is_finite() || log.amount_liters <= 0.0 {
                    return Err(Error::validation(
                        "water amount must be a positive number of liters",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Canonical JSON body for the wire.
    pub fn to_wire_json(&self) -> Result<String> {
        let body = match self {
            Self::Metrics(sample) => serde_json::to_string(sample)?,
            Self::Water(log) => serde_json::to_string(log)?,
        };
        Ok(body)
    }
}
