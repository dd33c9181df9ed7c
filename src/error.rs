use serde::Serialize;

/// Coarse error taxonomy shared by the scan engine, the stores, and the
/// ingest server. Callers pattern-match on `kind`; `code` is the stable
/// machine-readable string surfaced to bindings and HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    Validation,
    Domain,
    Resource,
    Timeout,
    Cancellation,
    System,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ReplayError {
    pub kind: Kind,
    pub code: &'static str,
    pub message: String,
    pub field: Option<&'static str>,
    #[source]
    pub cause: Option<anyhow::Error>,
}

impl ReplayError {
    pub fn new(kind: Kind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            field: None,
            cause: None,
        }
    }

    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Kind::Validation, code, message)
    }

    pub fn domain(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Kind::Domain, code, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Kind::Resource, "NOT_FOUND", message)
    }

    pub fn system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Kind::System, code, message)
    }

    /// The envelope documented in the ingest HTTP interface: never include
    /// raw seeds, only hashes ever reach this far.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message.clone(),
                field: self.field,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub field: Option<&'static str>,
}

pub type Result<T> = std::result::Result<T, ReplayError>;
