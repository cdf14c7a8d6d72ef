//! Header fingerprints used as the deduplication key.
//!
//! A fingerprint is the SHA-256 of the ordered header fields, each formatted
//! as `name: value` and joined with CRLF. It is computed from a `TOP n 0`
//! response, so a message can be recognised before its body is downloaded.

use std::fmt::{self, Write as _};

use popledger_mime::Headers;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a message's header fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints a parsed header set in its encountered order.
    #[must_use]
    pub fn of_headers(headers: &Headers) -> Self {
        Self::of_pairs(headers.iter())
    }

    /// Fingerprints raw header bytes. Invalid UTF-8 is replaced, never rejected.
    #[must_use]
    pub fn of_raw(raw: &[u8]) -> Self {
        Self::of_headers(&Headers::parse(raw))
    }

    /// Fingerprints ordered `(name, value)` pairs.
    #[must_use]
    pub fn of_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut hasher = Sha256::new();
        for (i, (name, value)) in pairs.into_iter().enumerate() {
            if i > 0 {
                hasher.update(b"\r\n");
            }
            hasher.update(name.as_bytes());
            hasher.update(b": ");
            hasher.update(value.as_bytes());
        }

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// The 64-character hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first `len` hex characters.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
