//! Branded email bodies.
//!
//! Each template yields an HTML body and a plain-text alternative. Values
//! that come from requests are HTML-escaped.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use goflex_mailer::{EmailError, OutboundEmail};

use crate::state::RelayInfo;

const LOGO_URL: &str =
    "https://raw.githubusercontent.com/ipalominoPC/goflexconnect/main/public/icons/logo-128.png";

/// A rendered email, not yet addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text alternative.
    pub text: String,
}

impl Rendered {
    /// Addresses the email.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] if a recipient is invalid or none are given.
    pub fn into_email<I, S>(self, recipients: I) -> Result<OutboundEmail, EmailError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(OutboundEmail::new(recipients, self.subject, self.html)?.with_plain_text(self.text))
    }
}

/// The SMTP test message.
#[must_use]
pub fn smtp_test(relay: Option<&RelayInfo>) -> Rendered {
    let mut content = String::from(
        "<h1>SMTP Test Successful!</h1>\n    \
         <p>Your SMTP configuration is working correctly.</p>",
    );
    let mut text = String::from(
        "SMTP Test Successful!\n\nYour SMTP configuration is working correctly.\n",
    );
    if let Some(relay) = relay {
        // Writing to a String cannot fail.
        let _ = write!(
            content,
            "\n    <p>Server: {}</p>\n    <p>From: {}</p>",
            escape_html(&relay.host),
            escape_html(&relay.from)
        );
        let _ = writeln!(text, "Server: {}\nFrom: {}", relay.host, relay.from);
    }

    Rendered {
        subject: "SMTP Test - GoFlex Connect".to_string(),
        html: layout("GoFlexConnect", &content),
        text,
    }
}

/// The admin routing test message.
#[must_use]
pub fn admin_test(test_id: &str, timestamp: &str, recipients: usize) -> Rendered {
    let content = format!(
        "<h2>Admin Email Test - SUCCESS</h2>
    <p><strong>Test ID:</strong> {id}</p>
    <p><strong>Timestamp:</strong> {ts}</p>
    <p><strong>Recipients:</strong> {recipients} admin(s)</p>
    <hr>
    <p>This is an automated test email from the GoFlexConnect Admin Dashboard.</p>
    <p><em>If you received this, SMTP and admin email routing are working correctly.</em></p>
    <p style=\"margin-top: 20px; color: #666; font-size: 12px;\">
      GoFlexConnect Admin System
    </p>",
        id = escape_html(test_id),
        ts = escape_html(timestamp),
    );
    let text = format!(
        "Admin Email Test - SUCCESS\n\n\
         Test ID: {test_id}\n\
         Timestamp: {timestamp}\n\
         Recipients: {recipients} admin(s)\n\n\
         If you received this, SMTP and admin email routing are working correctly.\n"
    );

    Rendered {
        subject: "[GoFlexConnect] Admin Email Test".to_string(),
        html: layout("GoFlexConnect Admin", &content),
        text,
    }
}

/// Notice that a user signed up.
///
/// `created_at` is shown as UTC when it parses as RFC 3339, verbatim
/// otherwise.
#[must_use]
pub fn new_user(email: &str, created_at: Option<&str>) -> Rendered {
    let registered = created_at.map_or_else(|| "unknown".to_string(), registration_time);
    let content = format!(
        "<h2>New User Registration</h2>
    <p><strong>Email:</strong> {email}</p>
    <p><strong>Registration Time:</strong> {time}</p>
    <hr>
    <p><em>This is an automated notification from GoFlexConnect</em></p>",
        email = escape_html(email),
        time = escape_html(&registered),
    );
    let text = format!(
        "New User Registration\n\n\
         Email: {email}\n\
         Registration Time: {registered}\n\n\
         This is an automated notification from GoFlexConnect\n"
    );

    Rendered {
        subject: "New User Registration - GoFlex Connect".to_string(),
        html: layout("GoFlexConnect", &content),
        text,
    }
}

fn registration_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| raw.to_string(),
        |at| {
            at.with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
        },
    )
}

fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin:0;padding:0;background-color:#f8fafc;font-family:system-ui,-apple-system,sans-serif;">
  <div style="background-color:#ffffff;max-width:600px;margin:0 auto;padding:24px;">
    <img
      src="{LOGO_URL}"
      alt="GoFlexConnect"
      width="80"
      height="80"
      style="display:block; margin:0 auto 20px auto; border:0; outline:none; text-decoration:none;"
    />
    <div style="font-size: 28px; font-weight: bold; color: #1a1a1a; padding-bottom: 20px; text-align: center;">
      {title}
    </div>
    {content}
  </div>
</body>
</html>
"#
    )
}

/// Escapes text for use in HTML element content and attribute values.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
