//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on an established transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake after STARTTLS failed.
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(#[source] io::Error),

    /// Relay hostname is not usable as a TLS server name.
    #[error("Invalid TLS server name: {0}")]
    InvalidHostname(String),

    /// Server returned an error reply where success was required.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 535).
        code: u16,
        /// Reply text from the server.
        message: String,
    },

    /// Malformed or unexpected server output.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server closed the connection mid-conversation.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// A read or write did not complete in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Operation not valid for the current transport.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns the server reply code, if this error carries one.
    #[must_use]
    pub const fn reply_code(&self) -> Option<u16> {
        match self {
            Self::SmtpError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx, timeouts, dropped connections).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::SmtpError { code, .. } => *code >= 400 && *code < 500,
            Self::Timeout(_) | Self::ConnectionClosed => true,
            _ => false,
        }
    }
}
