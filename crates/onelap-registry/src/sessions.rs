use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::instrument;

use onelap_core::errors::RegistryError;
use onelap_core::ids::SessionId;

/// Latest car setup published for a session. Payload and timestamp are
/// one value so they replace together; the timestamp is the publisher's
/// capture time, stored verbatim.
#[derive(Clone, Debug, Serialize)]
pub struct SetupSnapshot {
    pub payload: serde_json::Value,
    pub received_at: String,
}

/// Latest telemetry snapshot for a session. Overwritten on every publish,
/// no history is kept. The timestamp is stamped by the registry at write
/// time; publishers do not supply it.
#[derive(Clone, Debug, Serialize)]
pub struct TelemetrySnapshot {
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// One live racing session.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub setup: Option<SetupSnapshot>,
    pub telemetry: Option<TelemetrySnapshot>,
}

/// In-memory registry of live racing sessions, keyed by session id.
///
/// All state lives in process memory for the lifetime of the process;
/// sessions represent live, ephemeral runs and are never expired
/// automatically. Mutation goes through this registry only.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create a new session with a fresh random id and empty snapshots.
    #[instrument(skip(self))]
    pub fn allocate(&self) -> SessionId {
        let id = SessionId::new();
        self.sessions.insert(
            id,
            Session {
                id,
                created_at: Utc::now(),
                setup: None,
                telemetry: None,
            },
        );
        tracing::debug!(session_id = %id, "Session allocated");
        id
    }

    /// Read a session. Absent is a normal outcome, not an error.
    pub fn lookup(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// Replace the setup snapshot for a session.
    pub fn write_setup(
        &self,
        id: &SessionId,
        payload: serde_json::Value,
        timestamp: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(RegistryError::UnknownSession(*id))?;
        session.setup = Some(SetupSnapshot {
            payload,
            received_at: timestamp.into(),
        });
        Ok(())
    }

    /// Replace the telemetry snapshot for a session, stamping it with the
    /// current time.
    pub fn write_telemetry(
        &self,
        id: &SessionId,
        payload: serde_json::Value,
    ) -> Result<(), RegistryError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(RegistryError::UnknownSession(*id))?;
        session.telemetry = Some(TelemetrySnapshot {
            payload,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    /// Remove a session. Idempotent: removing an absent session is a no-op.
    #[instrument(skip(self, id), fields(session_id = %id))]
    pub fn delete(&self, id: &SessionId) {
        if self.sessions.remove(id).is_some() {
            tracing::debug!("Session deleted");
        }
    }

    /// Weakly-consistent snapshot of the registered ids: may be stale
    /// relative to concurrent allocate/delete.
    pub fn list_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
