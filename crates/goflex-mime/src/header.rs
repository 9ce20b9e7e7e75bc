//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// Ordered collection of message headers.
///
/// Headers are written in the order they were added. Values are validated
/// on insertion so a caller-supplied string can never start a new header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the name is not a valid field name
    /// or the value contains a line break that is not folding whitespace.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        validate_name(&name)?;
        validate_value(&name, &value)?;
        self.entries.push((name, value));
        Ok(())
    }

    /// Sets a header, replacing any existing values with the same name.
    ///
    /// # Errors
    ///
    /// Same as [`Headers::add`].
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.remove(&name);
        self.add(name, value)
    }

    /// Gets the first value for a header (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no headers have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
        return Err(Error::InvalidHeader(format!("bad field name {name:?}")));
    }
    Ok(())
}

fn validate_value(name: &str, value: &str) -> Result<()> {
    // Folded continuation lines ("\r\n " or "\r\n\t") are allowed, nothing else.
    let mut rest = value;
    while let Some(pos) = rest.find(['\r', '\n']) {
        let tail = &rest[pos..];
        let folded = tail.starts_with("\r\n ") || tail.starts_with("\r\n\t");
        if !folded {
            return Err(Error::InvalidHeader(format!(
                "line break in {name} header"
            )));
        }
        rest = &tail[3..];
    }
    Ok(())
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_keep_insertion_order() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com").unwrap();
        headers.add("To", "recipient@example.com").unwrap();
        headers.add("Subject", "Test").unwrap();

        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\r\nTo: recipient@example.com\r\nSubject: Test\r\n"
        );
    }

    #[test]
    fn test_headers_get_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain").unwrap();
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_set_replaces() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com").unwrap();
        headers.add("To", "bob@example.com").unwrap();
        headers.set("to", "charlie@example.com").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("To"), Some("charlie@example.com"));
    }

    #[test]
    fn test_headers_reject_injection() {
        let mut headers = Headers::new();
        assert!(headers.add("Subject", "Hi\r\nBcc: evil@example.com").is_err());
        assert!(headers.add("Subject", "Hi\nthere").is_err());
        assert!(headers.add("Subject", "Hi\r").is_err());
        assert!(headers.add("Bad Name", "x").is_err());
        assert!(headers.add("Bad:Name", "x").is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_allow_folding() {
        let mut headers = Headers::new();
        headers
            .add("Subject", "=?utf-8?B?YQ==?=\r\n =?utf-8?B?Yg==?=")
            .unwrap();
        assert_eq!(headers.len(), 1);
    }
}
