//! Protocol step tracking.

use std::fmt;

/// The last protocol step a session completed.
///
/// A session only advances after the server has answered the step
/// successfully, so on failure this names where the conversation got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// TCP connection being opened.
    Connecting,
    /// Greeting received.
    Greeted,
    /// First EHLO accepted (plaintext).
    Ehlo1,
    /// STARTTLS accepted, handshake pending.
    TlsStarting,
    /// TLS handshake complete.
    TlsEstablished,
    /// EHLO accepted over TLS.
    Ehlo2,
    /// AUTH LOGIN challenge received.
    Authenticating,
    /// Credentials accepted.
    Authenticated,
    /// Sender accepted.
    MailFrom,
    /// RCPT TO answered for the recipient at this zero-based index.
    RcptTo(usize),
    /// DATA accepted with 354.
    DataStart,
    /// Message body being written.
    DataSending,
    /// Relay accepted the message.
    Accepted,
    /// QUIT sent.
    Quitting,
    /// Transport shut down.
    Closed,
}

impl SessionState {
    /// Returns true while the session is running over TLS.
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        !matches!(
            self,
            Self::Connecting | Self::Greeted | Self::Ehlo1 | Self::TlsStarting | Self::Closed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Greeted => f.write_str("greeted"),
            Self::Ehlo1 => f.write_str("ehlo"),
            Self::TlsStarting => f.write_str("starttls"),
            Self::TlsEstablished => f.write_str("tls established"),
            Self::Ehlo2 => f.write_str("ehlo (tls)"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::MailFrom => f.write_str("mail from"),
            Self::RcptTo(index) => write!(f, "rcpt to #{}", index + 1),
            Self::DataStart => f.write_str("data"),
            Self::DataSending => f.write_str("sending data"),
            Self::Accepted => f.write_str("accepted"),
            Self::Quitting => f.write_str("quit"),
            Self::Closed => f.write_str("closed"),
        }
    }
}
