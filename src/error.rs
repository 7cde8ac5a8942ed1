use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[source] TransportError),

    #[error("Token acquisition failed: {0}")]
    TokenAcquisitionFailed(String),

    #[error("Field {field} missing from response at {path}")]
    StaleCredentialField { field: String, path: String },

    #[error("Token expired and renewal failed")]
    TokenExpired,

    #[error("Secret not found: {path}")]
    NotFound { path: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn stale_field(field: &str, path: &str) -> Self {
        Self::StaleCredentialField {
            field: field.to_string(),
            path: path.to_string(),
        }
    }
}

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Vault client error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Vault request error: {0}")]
    Request(String),
}

impl TransportError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// 4xx responses: the request was understood and refused.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }
}
