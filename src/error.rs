use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GradebookError>;

#[derive(Error, Debug)]
pub enum GradebookError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Validation(String),

    #[error("remote sync failed: {0}")]
    RemoteSync(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<bcrypt::BcryptError> for GradebookError {
    fn from(error: bcrypt::BcryptError) -> Self {
        GradebookError::Crypto(error.to_string())
    }
}

impl GradebookError {
    /// Stable code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateEmail(_) => "duplicate_email",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Validation(_) => "bad_params",
            Self::RemoteSync(_) => "remote_sync_failed",
            Self::Store(_) => "db_query_failed",
            Self::Json(_) => "bad_json",
            Self::Crypto(_) => "crypto_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::DuplicateEmail(email) => Some(json!({ "email": email })),
            Self::RemoteSync(_) => Some(json!({ "retryable": true })),
            _ => None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
