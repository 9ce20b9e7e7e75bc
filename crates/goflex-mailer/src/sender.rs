//! SMTP delivery.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use goflex_smtp::{Address, Connector, Reply, RustlsConnector, Session};
use tracing::{debug, info, instrument, warn};

use crate::config::{MailerConfig, SmtpCredentials};
use crate::email::OutboundEmail;
use crate::error::SendError;
use crate::receipt::{RejectedRecipient, SendReceipt};

/// Anything that can deliver an [`OutboundEmail`].
///
/// HTTP handlers hold a `dyn MailTransport` so they can be exercised
/// without a relay.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Delivers one email.
    async fn send(&self, email: OutboundEmail) -> Result<SendReceipt, SendError>;
}

/// Sends each email over its own authenticated STARTTLS session.
pub struct SmtpMailSender<C: Connector = RustlsConnector> {
    credentials: Arc<SmtpCredentials>,
    config: MailerConfig,
    connector: C,
}

impl<C: Connector> std::fmt::Debug for SmtpMailSender<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailSender")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SmtpMailSender {
    /// Creates a sender using tokio TCP and rustls.
    #[must_use]
    pub fn new(credentials: SmtpCredentials, config: MailerConfig) -> Self {
        Self::with_connector(credentials, config, RustlsConnector::new())
    }
}

/// Conversation outcome before the transport is released.
struct Delivery {
    accepted: Vec<Address>,
    rejected: Vec<RejectedRecipient>,
    final_reply: Reply,
}

enum Failure {
    Smtp(goflex_smtp::Error),
    NoRecipients(Vec<RejectedRecipient>),
}

impl From<goflex_smtp::Error> for Failure {
    fn from(err: goflex_smtp::Error) -> Self {
        Self::Smtp(err)
    }
}

impl<C: Connector> SmtpMailSender<C> {
    /// Creates a sender with a custom connector.
    #[must_use]
    pub fn with_connector(credentials: SmtpCredentials, config: MailerConfig, connector: C) -> Self {
        Self {
            credentials: Arc::new(credentials),
            config,
            connector,
        }
    }

    /// Returns the relay credentials.
    #[must_use]
    pub fn credentials(&self) -> &SmtpCredentials {
        &self.credentials
    }

    /// Returns the session settings.
    #[must_use]
    pub const fn config(&self) -> &MailerConfig {
        &self.config
    }

    /// Delivers one email over a fresh session.
    ///
    /// Recipients refused at `RCPT TO` are listed in the receipt; the send
    /// only fails on them when none were accepted, in which case `DATA` is
    /// never sent. The transport is shut down before this returns.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] naming the last completed step.
    #[instrument(
        name = "smtp_send",
        skip_all,
        fields(relay = %self.credentials.host, recipients = email.recipients().len())
    )]
    pub async fn deliver(&self, email: &OutboundEmail) -> Result<SendReceipt, SendError> {
        let started = Instant::now();
        let creds = &self.credentials;

        let from = Address::new(creds.from_address.as_str())
            .map_err(|_| SendError::InvalidSender(creds.from_address.clone()))?;
        let message = email.compose(creds, &self.config.client_domain)?.to_bytes();

        let mut session = Session::connect(
            &self.connector,
            &creds.host,
            creds.port,
            &self.config.session_config(),
        )
        .await
        .map_err(|err| SendError::connect(&creds.host, creds.port, err))?;

        let outcome = self.converse(&mut session, &from, email, &message).await;
        let step = session.state();

        // Only say goodbye to a relay that is still answering.
        let still_talking = match &outcome {
            Ok(_) | Err(Failure::NoRecipients(_)) => true,
            Err(Failure::Smtp(err)) => err.reply_code().is_some(),
        };
        if still_talking {
            if let Err(err) = session.quit().await {
                debug!(error = %err, "QUIT not acknowledged");
            }
        }
        if let Err(err) = session.close().await {
            warn!(error = %err, "failed to close SMTP transport");
        }

        let relay = session.server_info().hostname.clone();
        let elapsed = started.elapsed();

        match outcome {
            Ok(delivery) => {
                info!(
                    relay = %relay,
                    accepted = delivery.accepted.len(),
                    rejected = delivery.rejected.len(),
                    elapsed_ms = elapsed.as_millis(),
                    "message accepted by relay"
                );
                Ok(SendReceipt {
                    accepted: delivery.accepted,
                    rejected: delivery.rejected,
                    relay,
                    final_reply: delivery.final_reply,
                    elapsed,
                })
            }
            Err(Failure::NoRecipients(rejected)) => {
                warn!(rejected = rejected.len(), "relay refused every recipient");
                Err(SendError::NoRecipientsAccepted { rejected })
            }
            Err(Failure::Smtp(err)) => {
                warn!(step = %step, error = %err, "send failed");
                Err(SendError::at_step(err, step))
            }
        }
    }

    async fn converse(
        &self,
        session: &mut Session<C>,
        from: &Address,
        email: &OutboundEmail,
        message: &[u8],
    ) -> Result<Delivery, Failure> {
        let creds = &self.credentials;
        let domain = &self.config.client_domain;

        session.read_greeting().await?;
        session.ehlo(domain).await?;
        session.starttls(&self.connector, &creds.host).await?;
        session.ehlo(domain).await?;
        session.auth_login(&creds.username, &creds.password).await?;
        session.mail_from(from).await?;

        let mut accepted = Vec::with_capacity(email.recipients().len());
        let mut rejected = Vec::new();
        for recipient in email.recipients() {
            let reply = session.rcpt_to(recipient).await?;
            if reply.is_success() {
                accepted.push(recipient.clone());
            } else {
                warn!(
                    recipient = %recipient,
                    code = reply.code.as_u16(),
                    "recipient rejected"
                );
                rejected.push(RejectedRecipient {
                    address: recipient.to_string(),
                    code: reply.code.as_u16(),
                    message: reply.message_text(),
                });
            }
        }

        if accepted.is_empty() {
            return Err(Failure::NoRecipients(rejected));
        }

        session.data().await?;
        let final_reply = session.send_message(message).await?;

        Ok(Delivery {
            accepted,
            rejected,
            final_reply,
        })
    }
}

#[async_trait]
impl<C: Connector> MailTransport for SmtpMailSender<C> {
    async fn send(&self, email: OutboundEmail) -> Result<SendReceipt, SendError> {
        self.deliver(&email).await
    }
}
