//! SMTP connection management.

mod connector;
mod session;
mod state;
mod stream;

pub use connector::{Connector, RustlsConnector};
pub use session::{Session, SessionConfig};
pub use state::SessionState;
pub use stream::{MAX_LINE_BYTES, SmtpStream};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// What the relay told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Hostname announced in the greeting.
    pub hostname: String,
    /// Extensions from the most recent EHLO reply.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the advertised authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Checks if a specific AUTH mechanism is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: AuthMechanism) -> bool {
        self.auth_mechanisms().contains(&mechanism)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    pub(crate) fn record_ehlo(&mut self, lines: &[String]) {
        // First line is the relay's hostname, the rest are keywords.
        self.extensions = lines.iter().skip(1).map(|l| Extension::parse(l)).collect();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn records_extensions_from_ehlo() {
        let mut info = ServerInfo::default();
        info.record_ehlo(&[
            "smtp.ionos.com".to_string(),
            "STARTTLS".to_string(),
            "SIZE 1000".to_string(),
        ]);
        assert!(info.supports_starttls());
        assert_eq!(info.max_message_size(), Some(1000));
        assert!(info.auth_mechanisms().is_empty());

        info.record_ehlo(&["smtp.ionos.com".to_string(), "AUTH LOGIN".to_string()]);
        assert!(!info.supports_starttls());
        assert!(info.supports_auth(AuthMechanism::Login));
        assert!(!info.supports_auth(AuthMechanism::Plain));
    }
}
