//! Encoding utilities for outbound messages.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header encoding and CRLF
//! normalization.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum line length for Quoted-Printable encoding, soft break included.
const MAX_LINE_LENGTH: usize = 76;

/// Maximum line length SMTP allows, excluding CRLF.
pub const MAX_SMTP_LINE: usize = 998;

/// UTF-8 bytes per RFC 2047 encoded word, keeping each word under 75 chars.
const MAX_WORD_BYTES: usize = 45;

/// Encodes data as Base64 (standard alphabet, padded, no line wrapping).
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Converts bare `\n` and bare `\r` to `\r\n`.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 32);
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            other => out.push(other),
        }
    }

    out
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Hard line breaks are kept as CRLF; long lines get `=` soft breaks so no
/// encoded line exceeds 76 characters. Trailing whitespace on a line is
/// always encoded.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let normalized = normalize_line_endings(text);
    let mut result = String::with_capacity(normalized.len() + normalized.len() / 8);

    for (index, line) in normalized.split("\r\n").enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }

        let bytes = line.as_bytes();
        let mut width = 0;
        for (pos, &byte) in bytes.iter().enumerate() {
            let literal = match byte {
                b'!'..=b'<' | b'>'..=b'~' => true,
                b' ' | b'\t' => pos + 1 < bytes.len(),
                _ => false,
            };
            let len = if literal { 1 } else { 3 };

            if width + len > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                width = 0;
            }

            if literal {
                result.push(char::from(byte));
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            width += len;
        }
    }

    result
}

/// Encodes a header value using RFC 2047 `B` encoding when it is not ASCII.
///
/// ASCII input is returned unchanged. Long values are split into several
/// encoded words on character boundaries, joined by folding whitespace.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut len = 0;
    for (idx, ch) in text.char_indices() {
        if len + ch.len_utf8() > MAX_WORD_BYTES {
            words.push(encoded_word(&text[start..idx]));
            start = idx;
            len = 0;
        }
        len += ch.len_utf8();
    }
    words.push(encoded_word(&text[start..]));

    words.join("\r\n ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes()))
}

/// Returns true if `text` can be sent as 7bit without transfer encoding.
#[must_use]
pub fn is_seven_bit_safe(text: &str) -> bool {
    text.is_ascii()
        && !text.contains('\0')
        && text
            .split('\n')
            .all(|line| line.trim_end_matches('\r').len() <= MAX_SMTP_LINE)
}
