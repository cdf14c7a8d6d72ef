//! Downloaded message structure.

use crate::header::Headers;

/// A message split into its header section and body.
///
/// The body is kept as raw bytes; this crate never interprets MIME parts.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Header fields in encountered order.
    pub headers: Headers,
    /// Everything after the first empty line.
    pub body: Vec<u8>,
}

impl Message {
    /// Parses a message from raw bytes.
    ///
    /// Never fails: input without an empty line is treated as headers only.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (head, body) = split_header_body(raw);
        Self {
            headers: Headers::parse(head),
            body: body.to_vec(),
        }
    }

    /// First value of a header, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_first(name)
    }

    /// Raw `Subject` value.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }

    /// Raw `From` value.
    #[must_use]
    pub fn from_header(&self) -> Option<&str> {
        self.header("From")
    }

    /// Raw `To` value.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.header("To")
    }

    /// Raw `Cc` value.
    #[must_use]
    pub fn cc(&self) -> Option<&str> {
        self.header("Cc")
    }

    /// Raw `Bcc` value.
    #[must_use]
    pub fn bcc(&self) -> Option<&str> {
        self.header("Bcc")
    }

    /// Raw `Message-ID` value.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.header("Message-ID")
    }

    /// Raw `Date` value.
    #[must_use]
    pub fn date_raw(&self) -> Option<&str> {
        self.header("Date")
    }
}

/// Splits raw bytes at the first empty line (CRLF CRLF or LF LF).
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = raw.windows(2).position(|w| w == b"\n\n");

    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => (&raw[..l], &raw[l + 2..]),
        (Some(c), _) => (&raw[..c], &raw[c + 4..]),
        (None, Some(l)) => (&raw[..l], &raw[l + 2..]),
        (None, None) => (raw, &[]),
    }
}
