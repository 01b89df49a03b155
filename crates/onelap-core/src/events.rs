use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Server → client wire events. Serializes to the envelope the dashboard
/// clients consume: `{"event": "<name>", "data": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Reply to a monitor's session request. Unicast to the requester.
    SessionIdAssigned {
        session_id: SessionId,
        dashboard_url: String,
    },

    /// Car setup changed, or cached setup delivered to a late joiner.
    /// The timestamp is the publisher's, passed through verbatim.
    SetupUpdate {
        session_id: SessionId,
        timestamp: String,
        setup: serde_json::Value,
    },

    /// Latest telemetry snapshot, broadcast or catch-up.
    TelemetryUpdate {
        session_id: SessionId,
        telemetry: serde_json::Value,
    },
}

impl OutboundEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::SessionIdAssigned { session_id, .. }
            | Self::SetupUpdate { session_id, .. }
            | Self::TelemetryUpdate { session_id, .. } => session_id,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SessionIdAssigned { .. } => "session_id_assigned",
            Self::SetupUpdate { .. } => "setup_update",
            Self::TelemetryUpdate { .. } => "telemetry_update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_assigned_wire_shape() {
        let id = SessionId::new();
        let event = OutboundEvent::SessionIdAssigned {
            session_id: id,
            dashboard_url: format!("http://0.0.0.0:5000/dashboard/{id}"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "session_id_assigned");
        assert_eq!(json["data"]["session_id"], id.to_string());
        assert!(json["data"]["dashboard_url"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/dashboard/{id}")));
    }

    #[test]
    fn setup_update_wire_shape() {
        let id = SessionId::new();
        let event = OutboundEvent::SetupUpdate {
            session_id: id,
            timestamp: "2025-11-22T14:30:00.000Z".into(),
            setup: serde_json::json!({"suspension": {"front_spring_rate": 120.5}}),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "setup_update");
        assert_eq!(json["data"]["timestamp"], "2025-11-22T14:30:00.000Z");
        assert_eq!(
            json["data"]["setup"]["suspension"]["front_spring_rate"],
            120.5
        );
    }

    #[test]
    fn telemetry_update_wire_shape() {
        let id = SessionId::new();
        let event = OutboundEvent::TelemetryUpdate {
            session_id: id,
            telemetry: serde_json::json!({"lap": 7, "fuel": 42.0}),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "telemetry_update");
        assert_eq!(json["data"]["telemetry"]["lap"], 7);
    }

    #[test]
    fn accessors_match_variants() {
        let id = SessionId::new();
        let event = OutboundEvent::TelemetryUpdate {
            session_id: id,
            telemetry: serde_json::json!({}),
        };
        assert_eq!(event.session_id(), &id);
        assert_eq!(event.event_name(), "telemetry_update");
    }

    #[test]
    fn serde_roundtrip() {
        let event = OutboundEvent::SetupUpdate {
            session_id: SessionId::new(),
            timestamp: "t".into(),
            setup: serde_json::json!({"aerodynamics": {"rear_wing": 8}}),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: OutboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_name(), "setup_update");
        assert_eq!(parsed.session_id(), event.session_id());
    }
}
