//! Send failures.

use std::io;

use goflex_smtp::SessionState;

use crate::receipt::RejectedRecipient;

/// Why a send failed.
///
/// `step` is the last protocol step that completed before the failure.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// DNS failure, refused connection or connect timeout.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Relay host.
        host: String,
        /// Relay port.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Stream closed mid-conversation or a malformed reply.
    #[error("protocol error after {step}: {message}")]
    Protocol {
        /// Last completed step.
        step: SessionState,
        /// What went wrong.
        message: String,
    },

    /// The relay answered with a failure where success was required.
    #[error("relay rejected the request after {step}: {code} {message}")]
    Rejected {
        /// Last completed step.
        step: SessionState,
        /// Reply code.
        code: u16,
        /// Reply text.
        message: String,
    },

    /// TLS handshake failed or the host is not a valid server name.
    #[error("TLS failure after {step}: {message}")]
    Tls {
        /// Last completed step.
        step: SessionState,
        /// Handshake error.
        message: String,
    },

    /// A read or write exceeded the I/O timeout.
    #[error("timed out after {step}")]
    Timeout {
        /// Last completed step.
        step: SessionState,
    },

    /// The relay refused every recipient; nothing was sent.
    #[error("all {} recipient(s) were rejected", rejected.len())]
    NoRecipientsAccepted {
        /// Refusals in envelope order.
        rejected: Vec<RejectedRecipient>,
    },

    /// Other transport errors.
    #[error("I/O error after {step}: {source}")]
    Io {
        /// Last completed step.
        step: SessionState,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The configured sender address is unusable.
    #[error("invalid sender address: {0:?}")]
    InvalidSender(String),

    /// The message could not be composed.
    #[error("failed to compose message: {0}")]
    Compose(#[from] goflex_mime::Error),
}

impl SendError {
    /// Maps a wire-level error raised after `step` completed.
    pub(crate) fn at_step(err: goflex_smtp::Error, step: SessionState) -> Self {
        use goflex_smtp::Error as E;
        match err {
            E::SmtpError { code, message } => Self::Rejected {
                step,
                code,
                message,
            },
            E::TlsHandshake(source) => Self::Tls {
                step,
                message: source.to_string(),
            },
            E::InvalidHostname(host) => Self::Tls {
                step,
                message: format!("invalid server name {host:?}"),
            },
            E::Timeout(_) => Self::Timeout { step },
            E::Io(source) => Self::Io { step, source },
            E::ConnectionClosed => Self::Protocol {
                step,
                message: "connection closed by relay".into(),
            },
            E::Protocol(message) | E::InvalidAddress(message) | E::InvalidState(message) => {
                Self::Protocol { step, message }
            }
        }
    }

    /// Maps a failure to open the connection.
    pub(crate) fn connect(host: &str, port: u16, err: goflex_smtp::Error) -> Self {
        let source = match err {
            goflex_smtp::Error::Io(source) => source,
            goflex_smtp::Error::Timeout(limit) => {
                io::Error::new(io::ErrorKind::TimedOut, format!("no connection within {limit:?}"))
            }
            other => io::Error::other(other.to_string()),
        };
        Self::Connect {
            host: host.to_string(),
            port,
            source,
        }
    }

    /// Returns the last completed step, when the session got that far.
    #[must_use]
    pub const fn step(&self) -> Option<SessionState> {
        match self {
            Self::Protocol { step, .. }
            | Self::Rejected { step, .. }
            | Self::Tls { step, .. }
            | Self::Timeout { step }
            | Self::Io { step, .. } => Some(*step),
            Self::Connect { .. } => Some(SessionState::Connecting),
            Self::NoRecipientsAccepted { rejected } => {
                Some(SessionState::RcptTo(rejected.len().saturating_sub(1)))
            }
            Self::InvalidSender(_) | Self::Compose(_) => None,
        }
    }

    /// Returns the relay's reply code, if the failure carried one.
    #[must_use]
    pub const fn reply_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if retrying the same message cannot succeed.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Rejected { code, .. } => (500..600).contains(code),
            Self::NoRecipientsAccepted { rejected } => {
                rejected.iter().all(|r| (500..600).contains(&r.code))
            }
            Self::InvalidSender(_) | Self::Compose(_) => true,
            _ => false,
        }
    }

    /// Returns true if a later retry may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rejected { code, .. } => (400..500).contains(code),
            Self::NoRecipientsAccepted { rejected } => {
                rejected.iter().any(|r| (400..500).contains(&r.code))
            }
            Self::Connect { .. } | Self::Timeout { .. } | Self::Protocol { .. } | Self::Io { .. } => {
                true
            }
            Self::Tls { .. } | Self::InvalidSender(_) | Self::Compose(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rejected(code: u16) -> RejectedRecipient {
        RejectedRecipient {
            address: "a@x.com".into(),
            code,
            message: "nope".into(),
        }
    }

    #[test]
    fn maps_wire_errors() {
        let step = SessionState::Authenticating;
        let err = SendError::at_step(goflex_smtp::Error::smtp_error(535, "bad"), step);
        assert!(matches!(err, SendError::Rejected { code: 535, .. }));
        assert_eq!(err.step(), Some(step));
        assert!(err.is_permanent());

        let err = SendError::at_step(goflex_smtp::Error::Timeout(Duration::from_secs(1)), step);
        assert!(matches!(err, SendError::Timeout { .. }));
        assert!(err.is_transient());

        let err = SendError::at_step(goflex_smtp::Error::ConnectionClosed, step);
        assert!(matches!(err, SendError::Protocol { .. }));
    }

    #[test]
    fn connect_timeout_is_connect_error() {
        let err = SendError::connect(
            "smtp.ionos.com",
            587,
            goflex_smtp::Error::Timeout(Duration::from_secs(30)),
        );
        let SendError::Connect { source, .. } = &err else {
            panic!("expected connect error");
        };
        assert_eq!(source.kind(), io::ErrorKind::TimedOut);
        assert!(err.to_string().contains("smtp.ionos.com:587"));
    }

    #[test]
    fn classifies_recipient_refusals() {
        let all_permanent = SendError::NoRecipientsAccepted {
            rejected: vec![rejected(550), rejected(553)],
        };
        assert!(all_permanent.is_permanent());
        assert!(!all_permanent.is_transient());

        let mixed = SendError::NoRecipientsAccepted {
            rejected: vec![rejected(550), rejected(450)],
        };
        assert!(!mixed.is_permanent());
        assert!(mixed.is_transient());
        assert_eq!(mixed.step(), Some(SessionState::RcptTo(1)));
    }
}
