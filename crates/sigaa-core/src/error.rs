//! Error types for the core library.

use thiserror::Error;

/// Core library error type.
///
/// Soft failures of the portal protocol (wrong credentials, a missing success
/// marker) are not errors; they are reported as
/// [`PageOutcome`](crate::portal::PageOutcome) values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The host is not a SIGAA instance, or not a host at all.
    #[error("not a valid SIGAA platform domain: {0}")]
    InvalidDomain(String),

    /// A required state token is missing from the last page, or the
    /// workflow step that produces it has not run yet.
    #[error("token not found: {0}")]
    TokenNotFound(String),

    /// A transport-level failure from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configuration-related error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A path resolution or validation error.
    #[error("path error: {0}")]
    Path(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A generic error for other cases.
    #[error("error: {0}")]
    Other(String),
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;
