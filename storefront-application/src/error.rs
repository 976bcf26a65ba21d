use storefront_domain::SchemaViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required fields")]
    Validation {
        missing: Vec<&'static str>,
        required: Vec<&'static str>,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The primary store failed; `context` is the stable error string shown to callers.
    #[error("{context}")]
    Primary {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn primary(context: impl Into<String>, source: anyhow::Error) -> Self {
        AppError::Primary {
            context: context.into(),
            source,
        }
    }
}

impl From<SchemaViolation> for AppError {
    fn from(violation: SchemaViolation) -> Self {
        AppError::Validation {
            required: violation.required().to_vec(),
            missing: violation.missing,
        }
    }
}
