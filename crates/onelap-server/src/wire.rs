use serde::Deserialize;

use onelap_core::events::OutboundEvent;

/// Inbound client message envelope: `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Extract a required string field from an event's data object.
pub fn require_str<'a>(data: &'a serde_json::Value, key: &str) -> Result<&'a str, String> {
    data.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing required field: {key}"))
}

/// Extract a required non-null field. The value itself stays opaque;
/// payload shape is the validator's business, not the wire layer's.
pub fn require_field<'a>(
    data: &'a serde_json::Value,
    key: &str,
) -> Result<&'a serde_json::Value, String> {
    match data.get(key) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(format!("missing required field: {key}")),
    }
}

/// Extract an optional string field.
pub fn optional_str<'a>(data: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(|v| v.as_str())
}

/// Serialize an outbound event to its wire envelope.
pub fn serialize_event(event: &OutboundEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(event = event.event_name(), error = %e, "Failed to serialize event");
            None
        }
    }
}
