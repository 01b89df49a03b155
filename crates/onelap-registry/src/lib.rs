mod sessions;

pub use sessions::{Session, SessionRegistry, SetupSnapshot, TelemetrySnapshot};
