//! Delivery outcome.

use std::time::Duration;

use goflex_smtp::{Address, Reply};
use serde::Serialize;

/// A recipient the relay refused at `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecipient {
    /// The refused address.
    pub address: String,
    /// Reply code (e.g., 550).
    pub code: u16,
    /// Reply text.
    pub message: String,
}

/// What happened to a delivered message.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Recipients the relay accepted, in envelope order.
    pub accepted: Vec<Address>,
    /// Recipients the relay refused.
    pub rejected: Vec<RejectedRecipient>,
    /// Hostname from the relay's greeting.
    pub relay: String,
    /// The relay's answer to the end of data.
    pub final_reply: Reply,
    /// Wall time from connect to close.
    pub elapsed: Duration,
}

impl SendReceipt {
    /// Returns true if some recipients were refused.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }

    /// Accepted addresses as strings.
    #[must_use]
    pub fn accepted_addresses(&self) -> Vec<String> {
        self.accepted.iter().map(ToString::to_string).collect()
    }
}
