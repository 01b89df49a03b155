use serde_json::Value;

/// Payload categories subject to ingress validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    Setup,
    Telemetry,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Telemetry => write!(f, "telemetry"),
        }
    }
}

/// Why a payload was refused. Diagnostic only: the reason is logged, the
/// publisher is never told.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} payload is not a JSON object")]
    NotAnObject { kind: PayloadKind },
    #[error("{kind} payload is missing required field {field:?}")]
    MissingField {
        kind: PayloadKind,
        field: &'static str,
    },
    #[error("{kind} payload field {field:?} has the wrong type")]
    WrongType {
        kind: PayloadKind,
        field: &'static str,
    },
    #[error("setup payload has no recognized section")]
    NoKnownSection,
}

/// Structural check applied to publisher payloads before they reach the
/// session registry. Advisory and optional: a server configured without
/// one accepts every payload unconditionally.
pub trait IngressValidator: Send + Sync {
    fn validate(&self, kind: PayloadKind, payload: &Value) -> Result<(), ValidationError>;
}

/// Sections a car setup payload may carry. A valid setup has at least one.
const SETUP_SECTIONS: [&str; 3] = ["suspension", "aerodynamics", "brakes"];

/// Field-presence checks matching the monitor's payload shape.
pub struct StructuralValidator;

impl IngressValidator for StructuralValidator {
    fn validate(&self, kind: PayloadKind, payload: &Value) -> Result<(), ValidationError> {
        let obj = payload
            .as_object()
            .ok_or(ValidationError::NotAnObject { kind })?;

        match kind {
            PayloadKind::Telemetry => {
                require(kind, obj, "timestamp", Value::is_string)?;
                require(kind, obj, "lap", is_integer)?;
                require(kind, obj, "position", is_integer)?;
                require(kind, obj, "fuel", Value::is_number)?;
                Ok(())
            }
            PayloadKind::Setup => {
                let mut found = false;
                for section in SETUP_SECTIONS {
                    if let Some(value) = obj.get(section) {
                        if !value.is_object() {
                            return Err(ValidationError::WrongType {
                                kind,
                                field: section,
                            });
                        }
                        found = true;
                    }
                }
                if found {
                    Ok(())
                } else {
                    Err(ValidationError::NoKnownSection)
                }
            }
        }
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

fn require(
    kind: PayloadKind,
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
    check: impl Fn(&Value) -> bool,
) -> Result<(), ValidationError> {
    match obj.get(field) {
        None => Err(ValidationError::MissingField { kind, field }),
        Some(value) if !check(value) => Err(ValidationError::WrongType { kind, field }),
        Some(_) => Ok(()),
    }
}
