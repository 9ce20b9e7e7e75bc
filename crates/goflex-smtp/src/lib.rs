//! # goflex-smtp
//!
//! SMTP submission client used by the GoFlexConnect mail relay.
//!
//! The client speaks the submission dialect the GoFlexConnect relay needs and
//! nothing more: greeting, `EHLO`, in-band `STARTTLS`, `AUTH LOGIN`,
//! `MAIL FROM`, `RCPT TO`, `DATA` and `QUIT`. Every command is a single
//! blocking round-trip; nothing is pipelined.
//!
//! ## Quick Start
//!
//! ```ignore
//! use goflex_smtp::{Address, RustlsConnector, Session, SessionConfig};
//!
//! # async fn run() -> goflex_smtp::Result<()> {
//! let connector = RustlsConnector::new();
//! let config = SessionConfig::default();
//! let mut session = Session::connect(&connector, "smtp.example.com", 587, &config).await?;
//!
//! session.read_greeting().await?;
//! session.ehlo("client.example.com").await?;
//! session.starttls(&connector, "smtp.example.com").await?;
//! session.ehlo("client.example.com").await?;
//! session.auth_login("user@example.com", "secret").await?;
//!
//! session.mail_from(&Address::new("user@example.com")?).await?;
//! let reply = session.rcpt_to(&Address::new("someone@example.net")?).await?;
//! assert!(reply.is_success());
//!
//! session.data().await?;
//! session.send_message(b"Subject: Hi\r\n\r\nHello\r\n").await?;
//! session.quit().await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Connecting -> Greeted -> Ehlo1 -> TlsStarting -> TlsEstablished -> Ehlo2
//!   -> Authenticating -> Authenticated -> MailFrom -> RcptTo(i)...
//!   -> DataStart -> DataSending -> Accepted -> Quitting -> Closed
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command serialization
//! - [`connection`]: Transport, connector seam and the step-tracked session
//! - [`parser`]: Reply parser
//! - [`types`]: Addresses, extensions and replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
#[cfg(feature = "testing")]
pub mod testing;
pub mod types;

pub use connection::{
    Connector, RustlsConnector, ServerInfo, Session, SessionConfig, SessionState, SmtpStream,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyClass, ReplyCode};
