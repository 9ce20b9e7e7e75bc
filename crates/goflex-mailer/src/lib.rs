//! # goflex-mailer
//!
//! Sends one email per SMTP session through an authenticated relay.
//!
//! [`SmtpMailSender`] drives the whole conversation: greeting, `EHLO`,
//! `STARTTLS`, a second `EHLO`, `AUTH LOGIN`, the envelope, `DATA` and
//! `QUIT`. Recipients refused by the relay are reported in the
//! [`SendReceipt`] instead of failing the send, unless none were accepted.
//! The transport is shut down before `deliver` returns, whatever happened.
//!
//! ```ignore
//! use goflex_mailer::{MailerConfig, OutboundEmail, SmtpCredentials, SmtpMailSender};
//!
//! let credentials = SmtpCredentials::new("smtp.ionos.com", 587, user, password)
//!     .with_from_name("GoFlexConnect Support");
//! let sender = SmtpMailSender::new(credentials, MailerConfig::default());
//!
//! let email = OutboundEmail::new(["a@x.com", "b@y.com"], "Test Email", "<p>Hi</p>")?;
//! let receipt = sender.deliver(&email).await?;
//! assert!(!receipt.is_partial());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod email;
mod error;
mod receipt;
mod sender;

pub use config::{MailerConfig, SmtpCredentials};
pub use email::{EmailError, OutboundEmail};
pub use error::SendError;
pub use receipt::{RejectedRecipient, SendReceipt};
pub use sender::{MailTransport, SmtpMailSender};

pub use goflex_smtp::{Address, Reply, ReplyCode, SessionState};
