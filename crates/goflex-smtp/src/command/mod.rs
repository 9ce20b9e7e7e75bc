//! SMTP command serialization.

use crate::types::{Address, AuthMechanism};

/// SMTP command sent by the client.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client domain announced to the relay
        domain: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
    },
    /// A base64 line answering an AUTH challenge.
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close the session
    Quit,
}

impl Command {
    /// Returns the command verb, safe for logging.
    ///
    /// AUTH responses carry credentials and are never rendered.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::AuthResponse(_) => "<auth response>",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        }
    }

    /// Serializes the command to bytes, including the trailing CRLF.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);

        match self {
            Self::Ehlo { domain } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(domain.as_bytes());
            }
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Auth { mechanism } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_str().as_bytes());
            }
            Self::AuthResponse(encoded) => buf.extend_from_slice(encoded.as_bytes()),
            Self::MailFrom { from } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::Data => buf.extend_from_slice(b"DATA"),
            Self::Quit => buf.extend_from_slice(b"QUIT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ehlo { domain } => write!(f, "EHLO {domain}"),
            Self::Auth { mechanism } => write!(f, "AUTH {}", mechanism.as_str()),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            other => f.write_str(other.verb()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ehlo_carries_client_domain() {
        let cmd = Command::Ehlo {
            domain: "goflexconnect.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO goflexconnect.com\r\n");
    }

    #[test]
    fn auth_login_has_no_initial_response() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
        };
        assert_eq!(cmd.serialize(), b"AUTH LOGIN\r\n");
    }

    #[test]
    fn envelope_commands_wrap_addresses() {
        let from = Command::MailFrom {
            from: Address::new("forgot@goflexconnect.com").unwrap(),
        };
        let to = Command::RcptTo {
            to: Address::new("a@x.com").unwrap(),
        };
        assert_eq!(from.serialize(), b"MAIL FROM:<forgot@goflexconnect.com>\r\n");
        assert_eq!(to.serialize(), b"RCPT TO:<a@x.com>\r\n");
    }

    #[test]
    fn bare_verbs() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn auth_response_is_sent_verbatim_but_never_printed() {
        let cmd = Command::AuthResponse("c2VjcmV0".to_string());
        assert_eq!(cmd.serialize(), b"c2VjcmV0\r\n");
        assert_eq!(format!("{cmd:?}"), "<auth response>");
        assert!(!cmd.verb().contains("c2VjcmV0"));
    }
}
