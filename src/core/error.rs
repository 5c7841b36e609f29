use thiserror::Error;

/// Errors that can occur while managing mandates, payments or messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IncassoError {
    /// One or more validation rules failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A state change was requested along an edge the workflow does not allow.
    #[error("invalid {entity} transition from '{from}' to '{to}'")]
    Transition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    /// A referenced record does not exist in the registry.
    #[error("not found: {0}")]
    NotFound(String),

    /// A payment cannot go back to draft while its message has advanced.
    #[error("message '{0}' is not in draft state")]
    MessageNotDraft(String),

    /// A payment cannot succeed before its message is booked.
    #[error("message '{0}' is not booked")]
    MessageNotBooked(String),

    /// Fee feed row could not be parsed.
    #[error("feed error: {0}")]
    Feed(String),

    /// XML serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Message generation failed and every side effect was rolled back.
    #[error("generation of message '{reference}' of '{creditor}' failed: {source}")]
    Generation {
        reference: String,
        creditor: String,
        #[source]
        source: Box<IncassoError>,
    },
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "mandate.identification").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A non-fatal condition surfaced to the caller alongside a successful result,
/// e.g. "mandate X will be detached from N units".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Record the warning is about (reference or identification).
    pub entity: String,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.entity, self.message)
    }
}

impl Warning {
    pub fn new(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

/// Collect validation errors into a single `IncassoError::Validation`.
pub fn into_validation_result(errors: Vec<ValidationError>) -> Result<(), IncassoError> {
    if errors.is_empty() {
        Ok(())
    } else {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(IncassoError::Validation(joined))
    }
}
