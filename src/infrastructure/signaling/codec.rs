//! Signaling codec
//!
//! Messages travel as JSON text objects tagged by a `type` field. Decoding
//! is strict: the type must be one of the five known kinds and every field
//! that kind requires must be present and non-null.

use super::message::SignalingMessage;
use crate::domain::shared::DecodeError;
use serde_json::Value;

const KINDS: [&str; 5] = ["connected", "users", "offer", "answer", "icecandidate"];

/// Serialize a message to its wire form
pub fn encode(message: &SignalingMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

/// Parse a wire message
pub fn decode(raw: &str) -> Result<SignalingMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => return Err(DecodeError::UnknownType(other.to_string())),
        None => return Err(DecodeError::MissingType),
    };

    if !KINDS.contains(&kind.as_str()) {
        return Err(DecodeError::UnknownType(kind));
    }

    for field in payload_fields(&kind) {
        if value.get(*field).map_or(true, Value::is_null) {
            return Err(DecodeError::Malformed {
                kind,
                reason: format!("missing field `{}`", field),
            });
        }
    }

    serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
        kind,
        reason: e.to_string(),
    })
}

/// Opaque payload fields that serde would otherwise accept as `null`
fn payload_fields(kind: &str) -> &'static [&'static str] {
    match kind {
        "offer" => &["offer"],
        "answer" => &["answer"],
        "icecandidate" => &["candidate"],
        _ => &[],
    }
}
