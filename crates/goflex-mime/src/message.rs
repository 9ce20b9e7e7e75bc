//! Outbound message structure and builder.

use crate::content_type::ContentType;
use crate::encoding::{
    encode_quoted_printable, encode_rfc2047, is_seven_bit_safe, normalize_line_endings,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide sequence for Message-IDs and boundaries.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII, lines within SMTP limits.
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Picks the lightest encoding that can carry `text` over SMTP.
    #[must_use]
    pub fn for_text(text: &str) -> Self {
        if is_seven_bit_safe(text) {
            Self::SevenBit
        } else {
            Self::QuotedPrintable
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// A display name and address, as written in `From:` and `To:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name.
    pub name: Option<String>,
    /// Bare address.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox without a display name.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Creates a mailbox with a display name.
    #[must_use]
    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    fn domain(&self) -> Option<&str> {
        self.address.rsplit_once('@').map(|(_, domain)| domain)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            None => f.write_str(&self.address),
            Some(name) if !name.is_ascii() => {
                write!(f, "{} <{}>", encode_rfc2047(name), self.address)
            }
            Some(name) if name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.address)
            }
            Some(name) => write!(f, "{name} <{}>", self.address),
        }
    }
}

/// One encoded body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Content type of the part.
    pub content_type: ContentType,
    /// Transfer encoding applied to `content`.
    pub encoding: TransferEncoding,
    /// Encoded content with CRLF line endings.
    pub content: String,
}

impl Part {
    /// Creates a text part, normalizing line endings and choosing an encoding.
    #[must_use]
    pub fn text(content_type: ContentType, text: &str) -> Self {
        let encoding = TransferEncoding::for_text(text);
        let content = match encoding {
            TransferEncoding::SevenBit => normalize_line_endings(text),
            TransferEncoding::QuotedPrintable => encode_quoted_printable(text),
        };
        Self {
            content_type,
            encoding,
            content,
        }
    }

    fn write_content(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)?;
        if !self.content.ends_with("\r\n") {
            f.write_str("\r\n")?;
        }
        Ok(())
    }
}

/// Message body layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A single part; its type and encoding live in the message headers.
    Single(Part),
    /// `multipart/alternative`, least preferred part first.
    Alternative {
        /// Boundary delimiter, without the leading dashes.
        boundary: String,
        /// Parts in order.
        parts: Vec<Part>,
    },
}

/// A composed message ready for `DATA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Top-level headers.
    pub headers: Headers,
    /// Body.
    pub body: Body,
}

impl Message {
    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header as written on the wire.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Renders the message with CRLF line endings.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.headers)?;

        match &self.body {
            Body::Single(part) => part.write_content(f),
            Body::Alternative { boundary, parts } => {
                for part in parts {
                    write!(f, "--{boundary}\r\n")?;
                    write!(f, "Content-Type: {}\r\n", part.content_type)?;
                    write!(f, "Content-Transfer-Encoding: {}\r\n\r\n", part.encoding)?;
                    part.write_content(f)?;
                }
                write!(f, "--{boundary}--\r\n")
            }
        }
    }
}

/// Builds an outbound message.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<Mailbox>,
    to: Vec<Mailbox>,
    subject: Option<String>,
    html: Option<String>,
    text: Option<String>,
    date: Option<DateTime<Utc>>,
    message_id_domain: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    #[must_use]
    pub fn from(mut self, from: Mailbox) -> Self {
        self.from = Some(from);
        self
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, to: Mailbox) -> Self {
        self.to.push(to);
        self
    }

    /// Sets the subject (unencoded).
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the plain-text alternative.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Overrides the Date header (defaults to now).
    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the domain used in the Message-ID (defaults to the sender's).
    #[must_use]
    pub fn message_id_domain(mut self, domain: impl Into<String>) -> Self {
        self.message_id_domain = Some(domain.into());
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] without a sender, recipient or
    /// subject, [`Error::MissingBody`] without an HTML body, and
    /// [`Error::InvalidHeader`] if any header value contains a line break.
    pub fn build(self) -> Result<Message> {
        let from = self
            .from
            .ok_or_else(|| Error::MissingHeader("From".into()))?;
        if self.to.is_empty() {
            return Err(Error::MissingHeader("To".into()));
        }
        let subject = self
            .subject
            .ok_or_else(|| Error::MissingHeader("Subject".into()))?;
        let html = self.html.ok_or(Error::MissingBody)?;

        if subject.contains(['\r', '\n']) {
            return Err(Error::InvalidHeader("line break in Subject header".into()));
        }

        let now = Utc::now();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let domain = self
            .message_id_domain
            .or_else(|| from.domain().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());

        let mut headers = Headers::new();
        headers.add("From", from.to_string())?;
        let to = self
            .to
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        headers.add("To", to)?;
        headers.add("Subject", encode_rfc2047(&subject))?;
        headers.add("Date", self.date.unwrap_or(now).to_rfc2822())?;
        headers.add(
            "Message-ID",
            format!("<{}.{sequence}@{domain}>", now.timestamp_millis()),
        )?;
        headers.add("MIME-Version", "1.0")?;

        let html_part = Part::text(ContentType::text_html(), &html);
        let body = match self.text {
            Some(text) => {
                let boundary = format!(
                    "----=_GoFlex_{:x}_{sequence:x}",
                    now.timestamp_millis()
                );
                headers.add(
                    "Content-Type",
                    ContentType::multipart_alternative(&boundary).to_string(),
                )?;
                Body::Alternative {
                    boundary,
                    parts: vec![Part::text(ContentType::text_plain(), &text), html_part],
                }
            }
            None => {
                headers.add("Content-Type", html_part.content_type.to_string())?;
                headers.add("Content-Transfer-Encoding", html_part.encoding.to_string())?;
                Body::Single(html_part)
            }
        };

        Ok(Message { headers, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn builder() -> MessageBuilder {
        MessageBuilder::new()
            .from(Mailbox::named(
                "GoFlexConnect Support",
                "forgot@goflexconnect.com",
            ))
            .to(Mailbox::new("a@x.com"))
            .to(Mailbox::new("b@y.com"))
            .subject("Test Email")
            .html_body("<p>Hello</p>")
            .message_id_domain("goflexconnect.com")
    }

    #[test]
    fn test_single_part_layout() {
        let date = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let message = builder().date(date).build().unwrap();
        let names: Vec<&str> = message.headers.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            [
                "From",
                "To",
                "Subject",
                "Date",
                "Message-ID",
                "MIME-Version",
                "Content-Type",
                "Content-Transfer-Encoding"
            ]
        );

        let wire = message.to_string();
        assert!(wire.starts_with(
            "From: GoFlexConnect Support <forgot@goflexconnect.com>\r\n\
             To: a@x.com, b@y.com\r\n\
             Subject: Test Email\r\n\
             Date: Thu, 2 Jan 2025 03:04:05 +0000\r\n"
        ));
        assert!(wire.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(wire.ends_with("\r\n\r\n<p>Hello</p>\r\n"));
    }

    #[test]
    fn test_getters() {
        let message = builder().build().unwrap();
        assert_eq!(message.to(), Some("a@x.com, b@y.com"));
        assert_eq!(message.subject(), Some("Test Email"));
        let id = message.message_id().unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@goflexconnect.com>"));
    }

    #[test]
    fn test_message_ids_are_unique() {
        let first = builder().build().unwrap();
        let second = builder().build().unwrap();
        assert_ne!(first.message_id(), second.message_id());
    }

    #[test]
    fn test_multipart_alternative() {
        let message = builder().text_body("Hello").build().unwrap();
        let Body::Alternative { boundary, parts } = &message.body else {
            panic!("expected multipart body");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].content_type, ContentType::text_plain());
        assert_eq!(parts[1].content_type, ContentType::text_html());
        assert!(message.headers.get("Content-Transfer-Encoding").is_none());

        let wire = message.to_string();
        let delimiter = format!("--{boundary}\r\n");
        assert_eq!(wire.matches(&delimiter).count(), 2);
        assert!(wire.ends_with(&format!("--{boundary}--\r\n")));
        assert!(wire.find("text/plain").unwrap() < wire.find("text/html; charset").unwrap());
    }

    #[test]
    fn test_non_ascii_subject_and_body() {
        let message = builder()
            .subject("Señal débil")
            .html_body("<p>Señal</p>\n")
            .build()
            .unwrap();
        assert!(message.subject().unwrap().starts_with("=?utf-8?B?"));
        assert_eq!(
            message.headers.get("Content-Transfer-Encoding"),
            Some("quoted-printable")
        );
        assert!(message.to_string().contains("<p>Se=C3=B1al</p>\r\n"));
    }

    #[test]
    fn test_display_name_quoting() {
        assert_eq!(
            Mailbox::named("Palomino, Isaac", "i@x.com").to_string(),
            "\"Palomino, Isaac\" <i@x.com>"
        );
        assert_eq!(Mailbox::named("  ", "i@x.com").to_string(), "i@x.com");
        assert!(
            Mailbox::named("Señal", "i@x.com")
                .to_string()
                .starts_with("=?utf-8?B?")
        );
    }

    #[test]
    fn test_missing_pieces() {
        assert!(matches!(
            MessageBuilder::new().build(),
            Err(Error::MissingHeader(h)) if h == "From"
        ));
        let no_body = MessageBuilder::new()
            .from(Mailbox::new("f@x.com"))
            .to(Mailbox::new("t@x.com"))
            .subject("s")
            .build();
        assert!(matches!(no_body, Err(Error::MissingBody)));
    }

    #[test]
    fn test_subject_injection_rejected() {
        let result = builder().subject("Hi\r\nBcc: evil@example.com").build();
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_bare_newlines_normalized() {
        let message = builder().html_body("a\nb\rc").build().unwrap();
        assert!(message.to_string().ends_with("\r\n\r\na\r\nb\r\nc\r\n"));
    }

    proptest! {
        #[test]
        fn wire_form_has_only_crlf(subject in "\\PC{1,60}", body in "[ -~\n\r]{1,200}") {
            let message = builder().subject(subject).html_body(body).build().unwrap();
            let wire = message.to_string();
            let stripped = wire.replace("\r\n", "");
            prop_assert!(!stripped.contains('\r'));
            prop_assert!(!stripped.contains('\n'));
        }
    }
}
