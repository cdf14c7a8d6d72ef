//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words in headers.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Quoted-Printable text (RFC 2045) into raw bytes.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        match bytes.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        // Hex encoded byte
        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Invalid escape sequence".to_string()))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

/// Converts bytes in the given charset to a string.
///
/// UTF-8 and ASCII are decoded strictly; ISO-8859-1 and Windows-1252 map
/// bytes to code points directly. Other charsets are decoded as lossy UTF-8.
///
/// # Errors
///
/// Returns an error if UTF-8/ASCII input is not valid UTF-8.
pub fn decode_charset(bytes: Vec<u8>, charset: &str) -> Result<String> {
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8(bytes).map_err(Into::into),
        "iso-8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252" => {
            Ok(bytes.into_iter().map(char::from).collect())
        }
        _ => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Decodes a single encoded word body (`charset?encoding?text`).
fn decode_word(inner: &str) -> Result<String> {
    let parts: Vec<&str> = inner.splitn(3, '?').collect();
    let [charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    };

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or_default();

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(encoded_text)?,
        // Quoted-Printable with underscore for space
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " "))?,
        other => {
            return Err(Error::InvalidEncoding(format!("Unknown encoding: {other}")));
        }
    };

    decode_charset(bytes, charset)
}

/// Decodes RFC 2047 encoded words anywhere in a header value.
///
/// Format: `=?charset?encoding?encoded-text?=`. Whitespace between two
/// adjacent encoded words is dropped; plain text is kept as is.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space = String::new();
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let before = &rest[..start];
        let after = &rest[start + 2..];

        // Locate `?=` after the charset and encoding separators
        let Some(end) = find_word_end(after) else {
            break;
        };

        if last_was_word && before.chars().all(char::is_whitespace) {
            pending_space.clear();
        } else {
            result.push_str(&pending_space);
            result.push_str(before);
            pending_space.clear();
        }

        result.push_str(&decode_word(&after[..end])?);
        last_was_word = true;
        rest = &after[end + 2..];

        let trailing = rest.len() - rest.trim_start().len();
        pending_space.push_str(&rest[..trailing]);
        rest = &rest[trailing..];
    }

    result.push_str(&pending_space);
    result.push_str(rest);
    Ok(result)
}

/// Returns the offset of the closing `?=` of an encoded word body.
fn find_word_end(body: &str) -> Option<usize> {
    let first = body.find('?')?;
    let second = first + 1 + body[first + 1..].find('?')?;
    body[second + 1..].find("?=").map(|end| second + 1 + end)
}
