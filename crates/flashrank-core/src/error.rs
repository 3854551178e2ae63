use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, FlashrankError>;

#[derive(Debug, Error)]
pub enum FlashrankError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl FlashrankError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_payload(&self, operation: impl Into<String>, entity_id: Option<String>) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            entity_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FlashrankError;

    #[test]
    fn not_found_maps_to_stable_code_and_payload() {
        let err = FlashrankError::NotFound("question q-404".to_string());
        assert_eq!(err.code(), "NOT_FOUND");

        let payload = err.to_payload("resolve_question", Some("q-404".to_string()));
        assert_eq!(payload.code, "NOT_FOUND");
        assert_eq!(payload.operation, "resolve_question");
        assert_eq!(payload.entity_id.as_deref(), Some("q-404"));
        assert!(!payload.trace_id.is_empty());
    }
}
