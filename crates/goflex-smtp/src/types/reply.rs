//! SMTP reply types.

use std::fmt;

/// A complete, possibly multi-line, relay reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit code shared by every line.
    pub code: ReplyCode,
    /// Reply text, one entry per line with the code and separator stripped.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if this is a positive completion reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a positive intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code.is_intermediate()
    }

    /// Returns the full reply text with lines joined by newlines.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Returns the first whitespace-separated word of the first line.
    ///
    /// For a greeting this is the relay's announced hostname.
    #[must_use]
    pub fn first_word(&self) -> Option<&str> {
        self.message
            .first()
            .and_then(|line| line.split_whitespace().next())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message.join(" / "))
    }
}

/// Reply category, taken from the first digit of the code (RFC 5321 §4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2xx
    PositiveCompletion,
    /// 3xx
    PositiveIntermediate,
    /// 4xx
    TransientNegative,
    /// 5xx
    PermanentNegative,
    /// Anything outside 200-599.
    Unknown,
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 closing
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 ok
    pub const OK: Self = Self(250);
    /// 334 Server challenge during AUTH
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 relay is shutting the channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 mailbox busy, try later
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 454 TLS not available due to temporary reason
    pub const TLS_UNAVAILABLE: Self = Self(454);
    /// 503 commands out of order
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 535 bad credentials
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 no such mailbox
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 transaction refused
    pub const TRANSACTION_FAILED: Self = Self(554);

    /// Wraps a raw code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The raw code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the reply category.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::PositiveCompletion,
            3 => ReplyClass::PositiveIntermediate,
            4 => ReplyClass::TransientNegative,
            5 => ReplyClass::PermanentNegative,
            _ => ReplyClass::Unknown,
        }
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self.class(), ReplyClass::PositiveCompletion)
    }

    /// 3xx
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        matches!(self.class(), ReplyClass::PositiveIntermediate)
    }

    /// 4xx
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self.class(), ReplyClass::TransientNegative)
    }

    /// 5xx
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        matches!(self.class(), ReplyClass::PermanentNegative)
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_first_digit() {
        assert_eq!(ReplyCode::OK.class(), ReplyClass::PositiveCompletion);
        assert_eq!(
            ReplyCode::START_DATA.class(),
            ReplyClass::PositiveIntermediate
        );
        assert_eq!(
            ReplyCode::TLS_UNAVAILABLE.class(),
            ReplyClass::TransientNegative
        );
        assert_eq!(ReplyCode::AUTH_FAILED.class(), ReplyClass::PermanentNegative);
        assert_eq!(ReplyCode::new(99).class(), ReplyClass::Unknown);
        assert_eq!(ReplyCode::new(600).class(), ReplyClass::Unknown);
    }

    #[test]
    fn predicates_are_exclusive() {
        let code = ReplyCode::AUTH_CONTINUE;
        assert!(code.is_intermediate());
        assert!(!code.is_success());
        assert!(!code.is_transient());
        assert!(!code.is_permanent());
    }

    #[test]
    fn greeting_hostname_is_first_word() {
        let reply = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["smtp.ionos.com ESMTP ready".to_string()],
        );
        assert_eq!(reply.first_word(), Some("smtp.ionos.com"));
        assert_eq!(Reply::new(ReplyCode::OK, vec![]).first_word(), None);
    }

    #[test]
    fn message_text_joins_lines() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec!["relay.test".to_string(), "STARTTLS".to_string()],
        );
        assert_eq!(reply.message_text(), "relay.test\nSTARTTLS");
        assert_eq!(reply.to_string(), "250 relay.test / STARTTLS");
    }
}
