//! Common error types for ResearchHub.

use thiserror::Error;

/// Top-level error type for ResearchHub operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller lacks the role required for the operation.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Operation is not valid for the current membership or project state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The linked provider folder is gone, e.g. deleted or renamed out of band.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// External provider could not be reached or failed internally.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// External provider refused the request.
    #[error("Provider rejected request: {0}")]
    ProviderRejected(String),

    /// The email already has access to the folder.
    #[error("Already shared: {0}")]
    AlreadyShared(String),

    /// OAuth token was rejected or could not be refreshed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// External call exceeded its time budget.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Local persistence failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error originated at an external provider boundary.
    ///
    /// These are the errors the access mirror and folder provisioner absorb.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_)
                | Error::ProviderRejected(_)
                | Error::AlreadyShared(_)
                | Error::Authentication(_)
                | Error::Timeout(_)
                | Error::NotFound(_)
                | Error::FolderNotFound(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        assert!(Error::ProviderUnavailable("down".into()).is_provider_error());
        assert!(Error::Timeout("slow".into()).is_provider_error());
        assert!(Error::FolderNotFound("renamed".into()).is_provider_error());
        assert!(!Error::Unauthorized("nope".into()).is_provider_error());
        assert!(!Error::Conflict("already a member".into()).is_provider_error());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::Conflict("cannot remove the owner".to_string());
        assert_eq!(err.to_string(), "Conflict: cannot remove the owner");
    }
}
