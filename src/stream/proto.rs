use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error code for rejected credentials. Never retried automatically.
pub const CODE_AUTHENTICATION_FAILED: &str = "AUTHENTICATION_FAILED";
/// Error code for server-side throttling. Retried after `retryAfter`.
pub const CODE_RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

/// Wire message type that carries the keepalive signal.
pub const HEARTBEAT_TYPE: &str = "heartbeat";
/// Wire message type that reports a server-side error.
pub const ERROR_TYPE: &str = "error";

/// Fallback reconnect delay when a rate-limit error omits `retryAfter`.
pub const DEFAULT_RETRY_AFTER_MS: u64 = 5_000;

/// Generic stream event record.
///
/// The server adds no envelope beyond `type` and an optional `eventId`; all
/// remaining fields are application payload and are carried opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Dispatch key for the message.
    #[serde(rename = "type")]
    pub kind: String,
    /// Recovery cursor attached by the server, when present.
    #[serde(rename = "eventId", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Opaque application payload fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Envelope {
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Control frames originated by the SDK itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Keepalive probe sent while the transport is open.
    Heartbeat,
    /// Replay request sent once after reconnect when a cursor is held.
    Recover {
        #[serde(rename = "lastEventId")]
        last_event_id: String,
    },
}

impl ControlFrame {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of a server-reported `error` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    /// Machine-readable error code, when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Server-suggested delay in milliseconds before reconnecting.
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorInfo {
    /// Extracts error details from a received `error` envelope.
    ///
    /// Unrecognized fields are ignored; a payload with none of the expected
    /// fields yields an empty `ErrorInfo` rather than a parse failure.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let value = Value::Object(
            envelope
                .fields
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        );
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Builds a local protocol error surfaced to handlers.
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: Some(message.into()),
            retry_after: None,
        }
    }

    /// Delay to honor before reconnecting after a rate-limit error.
    pub fn retry_after_ms(&self) -> u64 {
        self.retry_after.unwrap_or(DEFAULT_RETRY_AFTER_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_frame_is_bare_type_tag() {
        let text = ControlFrame::Heartbeat.to_text().expect("encode");
        assert_eq!(text, r#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn recover_frame_carries_last_event_id() {
        let frame = ControlFrame::Recover {
            last_event_id: "e42".to_string(),
        };
        let text = frame.to_text().expect("encode");
        assert_eq!(text, r#"{"type":"recover","lastEventId":"e42"}"#);
    }

    #[test]
    fn envelope_parses_event_id_and_payload() {
        let envelope =
            Envelope::from_text(r#"{"type":"update","eventId":"e7","content":"hello","seq":3}"#)
                .expect("decode");
        assert_eq!(envelope.kind, "update");
        assert_eq!(envelope.event_id.as_deref(), Some("e7"));
        assert_eq!(envelope.fields["content"], Value::from("hello"));
        assert_eq!(envelope.fields["seq"], Value::from(3));
    }

    #[test]
    fn envelope_without_event_id_keeps_cursor_optional() {
        let envelope = Envelope::from_text(r#"{"type":"progress","pct":50}"#).expect("decode");
        assert_eq!(envelope.event_id, None);
    }

    #[test]
    fn error_info_reads_code_and_retry_after() {
        let envelope = Envelope::from_text(
            r#"{"type":"error","code":"RATE_LIMIT_EXCEEDED","message":"slow down","retryAfter":1500}"#,
        )
        .expect("decode");
        let info = ErrorInfo::from_envelope(&envelope);
        assert_eq!(info.code.as_deref(), Some(CODE_RATE_LIMIT_EXCEEDED));
        assert_eq!(info.message.as_deref(), Some("slow down"));
        assert_eq!(info.retry_after_ms(), 1500);
    }

    #[test]
    fn error_info_defaults_retry_after_when_absent() {
        let envelope =
            Envelope::from_text(r#"{"type":"error","code":"RATE_LIMIT_EXCEEDED"}"#).expect("decode");
        let info = ErrorInfo::from_envelope(&envelope);
        assert_eq!(info.retry_after_ms(), DEFAULT_RETRY_AFTER_MS);
    }

    #[test]
    fn error_info_tolerates_unexpected_payload_shape() {
        let envelope =
            Envelope::from_text(r#"{"type":"error","details":{"nested":true}}"#).expect("decode");
        let info = ErrorInfo::from_envelope(&envelope);
        assert_eq!(info.code, None);
        assert_eq!(info.message, None);
    }
}
