//! Error types for message composition.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header name or value cannot be written safely.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// A header the message cannot be built without.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The message has no body.
    #[error("Message has no body")]
    MissingBody,
}
