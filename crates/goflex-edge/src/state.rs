//! Shared handler state.

use std::fmt;
use std::sync::Arc;

use goflex_mailer::{MailTransport, SmtpMailSender};

use crate::config::EdgeConfig;
use crate::error::ApiError;

/// What every handler can reach.
///
/// Cloned per request; the transport and recipient lists are shared.
#[derive(Clone, Default)]
pub struct AppState {
    transport: Option<Arc<dyn MailTransport>>,
    notification_email: Option<Arc<str>>,
    admin_emails: Arc<Vec<String>>,
    relay: Option<Arc<RelayInfo>>,
}

/// Where mail goes out, shown in the SMTP test email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    /// Relay hostname.
    pub host: String,
    /// Sender address.
    pub from: String,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("configured", &self.transport.is_some())
            .field("notification_email", &self.notification_email)
            .field("admin_emails", &self.admin_emails)
            .field("relay", &self.relay)
            .finish()
    }
}

impl AppState {
    /// State with no transport and no recipients.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the SMTP sender and recipients from configuration.
    #[must_use]
    pub fn from_config(config: &EdgeConfig) -> Self {
        let mut state = Self::new().with_admin_emails(config.admin_emails.clone());
        if let Some(credentials) = config.credentials() {
            state = state.with_relay(RelayInfo {
                host: credentials.host.clone(),
                from: credentials.from_address.clone(),
            });
            state = state.with_transport(Arc::new(SmtpMailSender::new(
                credentials,
                config.mailer_config(),
            )));
        }
        if let Some(to) = config.notification_email.as_deref() {
            state = state.with_notification_email(to);
        }
        state
    }

    /// Uses `transport` for every send.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the recipient of test emails and new-user notices.
    #[must_use]
    pub fn with_notification_email(mut self, to: impl Into<String>) -> Self {
        let to = to.into();
        self.notification_email = (!to.trim().is_empty()).then(|| Arc::from(to.trim()));
        self
    }

    /// Sets the admin test recipients.
    #[must_use]
    pub fn with_admin_emails(mut self, admins: Vec<String>) -> Self {
        self.admin_emails = Arc::new(admins);
        self
    }

    /// Records the relay shown in the SMTP test email.
    #[must_use]
    pub fn with_relay(mut self, relay: RelayInfo) -> Self {
        self.relay = Some(Arc::new(relay));
        self
    }

    /// The relay, when known.
    #[must_use]
    pub fn relay(&self) -> Option<&RelayInfo> {
        self.relay.as_deref()
    }

    /// True if a transport is available.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// The transport, or 503 when credentials were not configured.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotConfigured`] without a transport.
    pub fn transport(&self) -> Result<&dyn MailTransport, ApiError> {
        self.transport
            .as_deref()
            .ok_or_else(|| ApiError::NotConfigured("SMTP credentials are not configured".into()))
    }

    /// The notification recipient, or 503 when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotConfigured`] without a notification address.
    pub fn notification_email(&self) -> Result<&str, ApiError> {
        self.notification_email
            .as_deref()
            .ok_or_else(|| ApiError::NotConfigured("NOTIFICATION_EMAIL is not configured".into()))
    }

    /// Admin test recipients; may be empty.
    #[must_use]
    pub fn admin_emails(&self) -> &[String] {
        &self.admin_emails
    }
}
