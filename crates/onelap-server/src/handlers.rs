//! Inbound event handlers: the publish/subscribe fan-out.
//!
//! Every rejected operation (unknown session, malformed request,
//! validator refusal) degrades to "no state change, no broadcast" with
//! a log line. Nothing is surfaced back to the remote peer, and no bad
//! input terminates a connection.

use std::sync::Arc;

use onelap_core::errors::RegistryError;
use onelap_core::events::OutboundEvent;
use onelap_core::ids::SessionId;
use onelap_registry::SessionRegistry;

use crate::client::{ClientId, ClientRegistry};
use crate::pages;
use crate::validator::{IngressValidator, PayloadKind};
use crate::wire::{self, Envelope};

/// Shared state available to all event handlers.
pub struct HandlerState {
    pub registry: Arc<SessionRegistry>,
    pub clients: Arc<ClientRegistry>,
    pub validator: Option<Arc<dyn IngressValidator>>,
    pub public_base_url: String,
}

impl HandlerState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        clients: Arc<ClientRegistry>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            clients,
            validator: None,
            public_base_url: public_base_url.into(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn IngressValidator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Dispatch one raw inbound message to the handler for its event name.
pub fn dispatch(state: &HandlerState, client_id: &ClientId, raw: &str) {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(client_id = %client_id, error = %e, "Discarding unparseable message");
            return;
        }
    };

    match envelope.event.as_str() {
        "request_session_id" => request_session_id(state, client_id),
        "setup_data" => setup_data(state, &envelope.data),
        "telemetry_update" => telemetry_update(state, &envelope.data),
        "join_session" => join_session(state, client_id, &envelope.data),
        other => {
            tracing::debug!(client_id = %client_id, event = other, "Ignoring unknown event");
        }
    }
}

/// Monitor requests a new session. The only event with a direct reply.
fn request_session_id(state: &HandlerState, client_id: &ClientId) {
    let session_id = state.registry.allocate();
    let dashboard_url = pages::dashboard_url(&state.public_base_url, &session_id);
    tracing::info!(session_id = %session_id, url = %dashboard_url, "Session allocated");

    send_to(
        state,
        client_id,
        &OutboundEvent::SessionIdAssigned {
            session_id,
            dashboard_url,
        },
    );
}

/// Monitor publishes car setup: validate, store, broadcast to the room.
fn setup_data(state: &HandlerState, data: &serde_json::Value) {
    let Some(session_id) = parse_session_id("setup_data", data) else {
        return;
    };
    let timestamp = match wire::require_str(data, "timestamp") {
        Ok(t) => t.to_string(),
        Err(reason) => {
            tracing::debug!(session_id = %session_id, %reason, "Discarding setup_data");
            return;
        }
    };
    let setup = match wire::require_field(data, "setup") {
        Ok(v) => v.clone(),
        Err(reason) => {
            tracing::debug!(session_id = %session_id, %reason, "Discarding setup_data");
            return;
        }
    };

    if !accept(state, PayloadKind::Setup, &session_id, &setup) {
        return;
    }

    match state
        .registry
        .write_setup(&session_id, setup.clone(), timestamp.clone())
    {
        Ok(()) => {}
        Err(RegistryError::UnknownSession(_)) => {
            tracing::debug!(session_id = %session_id, "Dropping setup for unknown session");
            return;
        }
    }

    broadcast(
        state,
        &OutboundEvent::SetupUpdate {
            session_id,
            timestamp,
            setup,
        },
    );
}

/// Monitor publishes a telemetry snapshot: validate, store, broadcast.
fn telemetry_update(state: &HandlerState, data: &serde_json::Value) {
    let Some(session_id) = parse_session_id("telemetry_update", data) else {
        return;
    };
    let telemetry = match wire::require_field(data, "telemetry") {
        Ok(v) => v.clone(),
        Err(reason) => {
            tracing::debug!(session_id = %session_id, %reason, "Discarding telemetry_update");
            return;
        }
    };

    if !accept(state, PayloadKind::Telemetry, &session_id, &telemetry) {
        return;
    }

    match state.registry.write_telemetry(&session_id, telemetry.clone()) {
        Ok(()) => {}
        Err(RegistryError::UnknownSession(_)) => {
            tracing::debug!(session_id = %session_id, "Dropping telemetry for unknown session");
            return;
        }
    }

    broadcast(
        state,
        &OutboundEvent::TelemetryUpdate {
            session_id,
            telemetry,
        },
    );
}

/// Dashboard joins a session's room, then receives the cached setup and
/// telemetry (each only if present) as unicast catch-up.
///
/// Membership is registered before the snapshot read: a publish racing
/// this join then lands in the catch-up or in the subsequent broadcast,
/// never in neither.
fn join_session(state: &HandlerState, client_id: &ClientId, data: &serde_json::Value) {
    let Some(session_id) = parse_session_id("join_session", data) else {
        return;
    };
    if state.registry.lookup(&session_id).is_none() {
        tracing::debug!(session_id = %session_id, "Ignoring join for unknown session");
        return;
    }

    if !state.clients.join_room(client_id, session_id) {
        return;
    }
    tracing::info!(client_id = %client_id, session_id = %session_id, "Dashboard joined session");

    let Some(session) = state.registry.lookup(&session_id) else {
        return;
    };
    if let Some(setup) = session.setup {
        send_to(
            state,
            client_id,
            &OutboundEvent::SetupUpdate {
                session_id,
                timestamp: setup.received_at,
                setup: setup.payload,
            },
        );
    }
    if let Some(telemetry) = session.telemetry {
        send_to(
            state,
            client_id,
            &OutboundEvent::TelemetryUpdate {
                session_id,
                telemetry: telemetry.payload,
            },
        );
    }
}

fn parse_session_id(event: &str, data: &serde_json::Value) -> Option<SessionId> {
    let raw = match wire::require_str(data, "session_id") {
        Ok(s) => s,
        Err(reason) => {
            tracing::debug!(event, %reason, "Discarding event");
            return None;
        }
    };
    match SessionId::parse(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::debug!(event, session_id = raw, error = %e, "Discarding event with malformed session id");
            None
        }
    }
}

fn accept(
    state: &HandlerState,
    kind: PayloadKind,
    session_id: &SessionId,
    payload: &serde_json::Value,
) -> bool {
    let Some(validator) = &state.validator else {
        return true;
    };
    match validator.validate(kind, payload) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Rejected {kind} payload");
            false
        }
    }
}

fn send_to(state: &HandlerState, client_id: &ClientId, event: &OutboundEvent) {
    if let Some(message) = wire::serialize_event(event) {
        state.clients.send_to(client_id, &message);
    }
}

fn broadcast(state: &HandlerState, event: &OutboundEvent) {
    if let Some(message) = wire::serialize_event(event) {
        let delivered = state.clients.broadcast_to_room(event.session_id(), &message);
        tracing::debug!(
            session_id = %event.session_id(),
            event = event.event_name(),
            recipients = delivered,
            "Broadcast"
        );
    }
}
