//! Wire types for the aggregation service API.

use serde::{Deserialize, Serialize};

/// Acknowledgment body for a delivered record.
///
/// The service reports some rejections in-band: HTTP 200 with
/// `status == "error"` and a human-readable message.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server-computed dehydration risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DehydrationRisk {
    pub current_status: String,
    pub future_risk: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub time_to_dehydration: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_response_parses_with_optional_fields() {
        let body = r#"{"current_status":"Hydrated","future_risk":"Low"}"#;
        let risk: DehydrationRisk = serde_json::from_str(body).expect("parse risk");
        assert_eq!(risk.future_risk, "Low");
        assert_eq!(risk.reason, "");
        assert!(risk.time_to_dehydration.is_none());
    }

    #[test]
    fn ack_parses_in_band_errors() {
        let body = r#"{"status":"error","message":"missing field"}"#;
        let ack: DeliveryAck = serde_json::from_str(body).expect("parse ack");
        assert_eq!(ack.status.as_deref(), Some("error"));
    }
}
