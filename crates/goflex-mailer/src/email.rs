//! Validated outbound email.

use goflex_mime::{Mailbox, Message, MessageBuilder};
use goflex_smtp::Address;

use crate::config::SmtpCredentials;

/// Why an [`OutboundEmail`] could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    /// No recipients were given.
    #[error("at least one recipient is required")]
    NoRecipients,

    /// A recipient is not a usable address.
    #[error("invalid recipient address: {0:?}")]
    InvalidAddress(String),

    /// Subject is empty or whitespace.
    #[error("subject is required")]
    EmptySubject,

    /// HTML body is empty or whitespace.
    #[error("html body is required")]
    EmptyBody,

    /// Subject contains a line break.
    #[error("subject must not contain line breaks")]
    HeaderInjection,
}

/// One email, ready to send to an ordered list of recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    recipients: Vec<Address>,
    subject: String,
    html_body: String,
    plain_text_body: Option<String>,
}

impl OutboundEmail {
    /// Validates and creates an email.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] if there are no recipients, any recipient
    /// is malformed, the subject is blank or spans lines, or the HTML body is
    /// blank.
    pub fn new<I, S>(
        recipients: I,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Result<Self, EmailError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let recipients = recipients
            .into_iter()
            .map(|r| {
                let raw = r.as_ref();
                Address::new(raw).map_err(|_| EmailError::InvalidAddress(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(EmailError::NoRecipients);
        }

        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(EmailError::EmptySubject);
        }
        if subject.contains(['\r', '\n']) {
            return Err(EmailError::HeaderInjection);
        }

        let html_body = html_body.into();
        if html_body.trim().is_empty() {
            return Err(EmailError::EmptyBody);
        }

        Ok(Self {
            recipients,
            subject,
            html_body,
            plain_text_body: None,
        })
    }

    /// Adds a plain-text alternative; blank text is ignored.
    #[must_use]
    pub fn with_plain_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.plain_text_body = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Recipients in envelope order.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Subject as given.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// HTML body.
    #[must_use]
    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    /// Plain-text alternative, if any.
    #[must_use]
    pub fn plain_text_body(&self) -> Option<&str> {
        self.plain_text_body.as_deref()
    }

    /// Composes the message as it will be written after `DATA`.
    ///
    /// # Errors
    ///
    /// Returns an error if a header cannot be written safely, which for a
    /// validated email only happens with a malformed sender.
    pub fn compose(
        &self,
        credentials: &SmtpCredentials,
        client_domain: &str,
    ) -> goflex_mime::Result<Message> {
        let from = match credentials.from_name.as_deref() {
            Some(name) => Mailbox::named(name, &credentials.from_address),
            None => Mailbox::new(&credentials.from_address),
        };

        let mut builder = MessageBuilder::new()
            .from(from)
            .subject(&self.subject)
            .html_body(&self.html_body)
            .message_id_domain(client_domain);
        for recipient in &self.recipients {
            builder = builder.to(Mailbox::new(recipient.as_str()));
        }
        if let Some(text) = &self.plain_text_body {
            builder = builder.text_body(text);
        }

        builder.build()
    }
}
