//! POP3 response parser.

use crate::error::{Error, Result};
use crate::types::{MailboxStat, Response, Status};

/// Parses a POP3 status line.
///
/// Status lines look like:
/// - `+OK 2 320`
/// - `-ERR no such message`
///
/// Trailing CRLF is ignored. Bytes that are not valid UTF-8 are replaced.
///
/// # Errors
///
/// Returns an error if the line does not start with `+OK` or `-ERR`.
pub fn parse_status_line(line: &[u8]) -> Result<Response> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);

    let (status, rest) = if let Some(rest) = text.strip_prefix("+OK") {
        (Status::Ok, rest)
    } else if let Some(rest) = text.strip_prefix("-ERR") {
        (Status::Err, rest)
    } else {
        return Err(Error::Protocol(format!("Malformed status line: {text}")));
    };

    if !rest.is_empty() && !rest.starts_with(' ') {
        return Err(Error::Protocol(format!("Malformed status line: {text}")));
    }

    Ok(Response::new(status, rest.trim()))
}

/// Parses the text of a positive `STAT` response (`count size`).
///
/// # Errors
///
/// Returns an error if either number is missing or not numeric.
pub fn parse_stat(text: &str) -> Result<MailboxStat> {
    let mut fields = text.split_whitespace();
    let count = fields
        .next()
        .and_then(|c| c.parse::<u32>().ok())
        .ok_or_else(|| Error::Protocol(format!("Invalid STAT response: {text}")))?;
    let size = fields
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::Protocol(format!("Invalid STAT response: {text}")))?;

    Ok(MailboxStat { count, size })
}

/// Checks if a line terminates a multi-line response (a lone `.`).
#[must_use]
pub fn is_terminator(line: &[u8]) -> bool {
    matches!(line, b".\r\n" | b".\n" | b".")
}

/// Removes the byte-stuffed leading dot from a multi-line response line.
#[must_use]
pub fn unstuff(line: &[u8]) -> &[u8] {
    if line.starts_with(b"..") { &line[1..] } else { line }
}
