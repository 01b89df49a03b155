use crate::ids::SessionId;

/// Why a string was refused as a session identifier. The message is
/// surfaced to administrative callers, never to remote peers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionIdError {
    #[error("session id is empty")]
    Empty,
    #[error("not a valid session id: {0:?}")]
    Malformed(String),
    #[error("session id is not in canonical lowercase hyphenated form: {0:?}")]
    NonCanonical(String),
}

/// Errors raised by direct registry mutation. Handlers absorb these into
/// silent discards; they never reach a remote peer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
}
