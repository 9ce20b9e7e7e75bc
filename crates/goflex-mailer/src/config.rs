//! Relay credentials and session tuning.

use std::fmt;
use std::time::Duration;

use goflex_smtp::SessionConfig;

/// Where and as whom to submit mail.
///
/// Shared read-only across concurrent sends.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpCredentials {
    /// Relay hostname, also used as the TLS server name.
    pub host: String,
    /// Submission port (normally 587).
    pub port: u16,
    /// AUTH LOGIN username.
    pub username: String,
    /// AUTH LOGIN password.
    pub password: String,
    /// Envelope sender and `From:` address.
    pub from_address: String,
    /// `From:` display name.
    pub from_name: Option<String>,
}

impl SmtpCredentials {
    /// Creates credentials that send from the login address.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            host: host.into(),
            port,
            from_address: username.clone(),
            username,
            password: password.into(),
            from_name: None,
        }
    }

    /// Sends from a different address than the login.
    #[must_use]
    pub fn with_from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }

    /// Sets the `From:` display name.
    #[must_use]
    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }
}

impl fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .finish()
    }
}

/// Settings that are not secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerConfig {
    /// Domain announced in `EHLO` and used for Message-IDs.
    pub client_domain: String,
    /// Deadline for opening the TCP connection.
    pub connect_timeout: Duration,
    /// Deadline for each read, write and handshake.
    pub io_timeout: Duration,
}

impl Default for MailerConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            client_domain: "goflexconnect.com".to_string(),
            connect_timeout: session.connect_timeout,
            io_timeout: session.io_timeout,
        }
    }
}

impl MailerConfig {
    pub(crate) const fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}
