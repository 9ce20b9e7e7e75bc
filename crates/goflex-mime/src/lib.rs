//! # goflex-mime
//!
//! Outbound message composition for GoFlexConnect mail.
//!
//! ## Features
//!
//! - **Ordered headers**: written in insertion order, CR/LF rejected
//! - **RFC 2047**: non-ASCII subjects and display names become encoded words
//! - **Bodies**: single `text/html`, or `multipart/alternative` with a plain part
//! - **Line endings**: everything is normalized to CRLF
//!
//! ## Quick Start
//!
//! ```ignore
//! use goflex_mime::{Mailbox, MessageBuilder};
//!
//! let message = MessageBuilder::new()
//!     .from(Mailbox::named("GoFlexConnect Support", "forgot@goflexconnect.com"))
//!     .to(Mailbox::new("newacct@goflexconnect.com"))
//!     .subject("Test Email")
//!     .html_body("<h1>Hello</h1>")
//!     .text_body("Hello")
//!     .message_id_domain("goflexconnect.com")
//!     .build()?;
//!
//! let wire: Vec<u8> = message.to_bytes();
//! ```
//!
//! Dot-stuffing is left to the SMTP layer, which applies it on transmission.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Mailbox, Message, MessageBuilder, Part, TransferEncoding};
