//! Service configuration.
//!
//! Values are merged in order of increasing priority:
//!
//! 1. Built-in defaults
//! 2. `goflex-edge.toml` (or the file named by `GOFLEX_EDGE_CONFIG`), if present
//! 3. Environment variables (`SMTP_HOST`, `SMTP_USER`, `ADMIN_EMAILS`, ...)
//!
//! Relay credentials have no default. Without `SMTP_USER` and `SMTP_PASS`
//! the service still starts, but every sending endpoint answers 503.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use goflex_mailer::{MailerConfig, SmtpCredentials};
use serde::{Deserialize, Deserializer, Serialize};

/// Config file read when `GOFLEX_EDGE_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "goflex-edge.toml";

/// Environment variables read on top of the config file.
const ENV_KEYS: &[&str] = &[
    "BIND_ADDR",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASS",
    "SMTP_FROM",
    "SMTP_FROM_NAME",
    "SMTP_CLIENT_DOMAIN",
    "SMTP_CONNECT_TIMEOUT_SECS",
    "SMTP_IO_TIMEOUT_SECS",
    "NOTIFICATION_EMAIL",
    "ADMIN_EMAILS",
];

/// Everything the service needs at startup.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Socket address to listen on.
    pub bind_addr: String,
    /// Relay hostname.
    pub smtp_host: String,
    /// Relay submission port.
    pub smtp_port: u16,
    /// AUTH LOGIN username.
    #[serde(deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub smtp_user: Option<String>,
    /// AUTH LOGIN password.
    #[serde(deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub smtp_pass: Option<String>,
    /// Sender address, when it differs from the login.
    #[serde(deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub smtp_from: Option<String>,
    /// `From:` display name.
    pub smtp_from_name: String,
    /// Domain announced in `EHLO`.
    pub smtp_client_domain: String,
    /// TCP connect deadline in seconds.
    pub smtp_connect_timeout_secs: u64,
    /// Per read/write deadline in seconds.
    pub smtp_io_timeout_secs: u64,
    /// Recipient of test emails and new-user notices.
    #[serde(deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub notification_email: Option<String>,
    /// Recipients of the admin test email.
    #[serde(deserialize_with = "address_list")]
    pub admin_emails: Vec<String>,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        let mailer = MailerConfig::default();
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            smtp_host: "smtp.ionos.com".to_string(),
            smtp_port: 587,
            smtp_user: None,
            smtp_pass: None,
            smtp_from: None,
            smtp_from_name: "GoFlexConnect Support".to_string(),
            smtp_client_domain: mailer.client_domain,
            smtp_connect_timeout_secs: mailer.connect_timeout.as_secs(),
            smtp_io_timeout_secs: mailer.io_timeout.as_secs(),
            notification_email: None,
            admin_emails: Vec::new(),
        }
    }
}

impl fmt::Debug for EdgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeConfig")
            .field("bind_addr", &self.bind_addr)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &self.smtp_pass.as_ref().map(|_| "<redacted>"))
            .field("smtp_from", &self.smtp_from)
            .field("smtp_from_name", &self.smtp_from_name)
            .field("smtp_client_domain", &self.smtp_client_domain)
            .field("smtp_connect_timeout_secs", &self.smtp_connect_timeout_secs)
            .field("smtp_io_timeout_secs", &self.smtp_io_timeout_secs)
            .field("notification_email", &self.notification_email)
            .field("admin_emails", &self.admin_emails)
            .finish()
    }
}

impl EdgeConfig {
    /// Loads configuration from defaults, the config file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a value has the wrong type.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("GOFLEX_EDGE_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(path)
    }

    /// Loads configuration using a specific file.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed, a value has the wrong type,
    /// or a timeout is zero.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values the types alone do not rule out.
    ///
    /// # Errors
    ///
    /// Returns an error if either SMTP timeout is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.smtp_connect_timeout_secs > 0,
            "SMTP_CONNECT_TIMEOUT_SECS must be at least 1"
        );
        anyhow::ensure!(
            self.smtp_io_timeout_secs > 0,
            "SMTP_IO_TIMEOUT_SECS must be at least 1"
        );
        Ok(())
    }

    /// The provider chain behind [`EdgeConfig::load_from`].
    #[must_use]
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::raw().only(ENV_KEYS))
    }

    /// Relay credentials, or `None` if the username or password is missing.
    #[must_use]
    pub fn credentials(&self) -> Option<SmtpCredentials> {
        let user = self.smtp_user.as_deref().filter(|u| !u.trim().is_empty())?;
        let pass = self.smtp_pass.as_deref().filter(|p| !p.is_empty())?;

        let mut credentials = SmtpCredentials::new(&self.smtp_host, self.smtp_port, user, pass);
        if let Some(from) = self.smtp_from.as_deref().filter(|f| !f.trim().is_empty()) {
            credentials = credentials.with_from_address(from);
        }
        if !self.smtp_from_name.trim().is_empty() {
            credentials = credentials.with_from_name(&self.smtp_from_name);
        }
        Some(credentials)
    }

    /// Session settings for the mailer.
    #[must_use]
    pub fn mailer_config(&self) -> MailerConfig {
        MailerConfig {
            client_domain: self.smtp_client_domain.clone(),
            connect_timeout: Duration::from_secs(self.smtp_connect_timeout_secs),
            io_timeout: Duration::from_secs(self.smtp_io_timeout_secs),
        }
    }
}

/// Environment values that look numeric arrive as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressList {
    Joined(String),
    List(Vec<String>),
}

/// Accepts `"a@x.com, b@y.com"` as well as a TOML array.
fn address_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match AddressList::deserialize(deserializer)? {
        AddressList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        AddressList::List(list) => list,
    };
    Ok(raw
        .iter()
        .map(|addr| addr.trim())
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::result_large_err)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_have_no_credentials() {
        let config = EdgeConfig::default();
        assert_eq!(config.smtp_host, "smtp.ionos.com");
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.credentials().is_none());
        assert!(config.admin_emails.is_empty());
    }

    #[test]
    fn env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("SMTP_USER", "forgot@goflexconnect.com");
            jail.set_env("SMTP_PASS", "s3cret");
            jail.set_env("SMTP_PORT", "2525");
            jail.set_env("SMTP_IO_TIMEOUT_SECS", "5");
            jail.set_env("NOTIFICATION_EMAIL", "newacct@goflexconnect.com");

            let config: EdgeConfig = EdgeConfig::figment(DEFAULT_CONFIG_FILE).extract()?;
            assert_eq!(config.smtp_port, 2525);
            assert_eq!(config.mailer_config().io_timeout, Duration::from_secs(5));
            assert_eq!(
                config.notification_email.as_deref(),
                Some("newacct@goflexconnect.com")
            );

            let creds = config.credentials().unwrap();
            assert_eq!(creds.host, "smtp.ionos.com");
            assert_eq!(creds.port, 2525);
            assert_eq!(creds.from_address, "forgot@goflexconnect.com");
            assert_eq!(creds.from_name.as_deref(), Some("GoFlexConnect Support"));
            Ok(())
        });
    }

    #[test]
    fn missing_password_means_unconfigured() {
        Jail::expect_with(|jail| {
            jail.set_env("SMTP_USER", "forgot@goflexconnect.com");
            let config: EdgeConfig = EdgeConfig::figment(DEFAULT_CONFIG_FILE).extract()?;
            assert!(config.credentials().is_none());
            Ok(())
        });
    }

    #[test]
    fn numeric_password_stays_text() {
        Jail::expect_with(|jail| {
            jail.set_env("SMTP_USER", "forgot@goflexconnect.com");
            jail.set_env("SMTP_PASS", "123456");
            let config: EdgeConfig = EdgeConfig::figment(DEFAULT_CONFIG_FILE).extract()?;
            assert_eq!(config.credentials().unwrap().password, "123456");
            Ok(())
        });
    }

    #[test]
    fn admin_emails_are_split_and_trimmed() {
        Jail::expect_with(|jail| {
            jail.set_env("ADMIN_EMAILS", " ops@goflexconnect.com, ,owner@goflexconnect.com ");
            let config: EdgeConfig = EdgeConfig::figment(DEFAULT_CONFIG_FILE).extract()?;
            assert_eq!(
                config.admin_emails,
                ["ops@goflexconnect.com", "owner@goflexconnect.com"]
            );
            Ok(())
        });
    }

    #[test]
    fn file_values_lose_to_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "edge.toml",
                r#"
                smtp_host = "smtp.example.net"
                smtp_from = "noreply@goflexconnect.com"
                admin_emails = ["ops@goflexconnect.com"]
                bind_addr = "127.0.0.1:9000"
                "#,
            )?;
            jail.set_env("SMTP_HOST", "smtp.ionos.de");

            let config: EdgeConfig = EdgeConfig::figment("edge.toml").extract()?;
            assert_eq!(config.smtp_host, "smtp.ionos.de");
            assert_eq!(config.bind_addr, "127.0.0.1:9000");
            assert_eq!(config.admin_emails, ["ops@goflexconnect.com"]);
            assert_eq!(config.smtp_from.as_deref(), Some("noreply@goflexconnect.com"));
            Ok(())
        });
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        for key in ["SMTP_CONNECT_TIMEOUT_SECS", "SMTP_IO_TIMEOUT_SECS"] {
            Jail::expect_with(|jail| {
                jail.set_env(key, "0");
                let err = EdgeConfig::load_from(DEFAULT_CONFIG_FILE).unwrap_err();
                assert!(err.to_string().contains(key), "{err}");
                Ok(())
            });
        }
    }

    #[test]
    fn default_timeouts_are_valid() {
        assert!(EdgeConfig::default().validate().is_ok());
        Jail::expect_with(|jail| {
            jail.set_env("SMTP_CONNECT_TIMEOUT_SECS", "1");
            let config = EdgeConfig::load_from(DEFAULT_CONFIG_FILE).unwrap();
            assert_eq!(config.mailer_config().connect_timeout, Duration::from_secs(1));
            Ok(())
        });
    }

    #[test]
    fn debug_redacts_password() {
        let config = EdgeConfig {
            smtp_user: Some("forgot@goflexconnect.com".into()),
            smtp_pass: Some("hunter2".into()),
            ..EdgeConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
