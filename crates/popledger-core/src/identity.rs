//! Sender, recipient and subject extraction, and filename derivation.

use popledger_mime::Address;
use popledger_mime::address::parse_list;
use popledger_mime::encoding::decode_rfc2047;
use tracing::warn;

use crate::fingerprint::Fingerprint;

/// Sender display used when nothing better is available.
pub const UNKNOWN_SENDER: &str = "N/A";

/// Subject used when the header is missing or cannot be decoded.
pub const NO_SUBJECT: &str = "No Subject";

const SEPARATOR: &str = " --- ";
const EXTENSION: &str = ".eml";

/// Chooses the sender display string from a `From` header.
///
/// Prefers the address, then the display name, then the raw header.
#[must_use]
pub fn resolve_sender(from: Option<&str>) -> String {
    let Some(raw) = from.map(str::trim).filter(|v| !v.is_empty()) else {
        return UNKNOWN_SENDER.to_string();
    };

    let address = parse_list(raw).into_iter().next().unwrap_or_default();
    if !address.email.is_empty() {
        address.email
    } else if !address.name.is_empty() {
        address.name
    } else {
        raw.to_string()
    }
}

/// Extracts the addresses of a `To`, `Cc` or `Bcc` header.
///
/// Entries without an address are dropped.
#[must_use]
pub fn parse_recipients(header: Option<&str>) -> Vec<String> {
    header
        .map(parse_list)
        .unwrap_or_default()
        .into_iter()
        .map(|Address { email, .. }| email)
        .filter(|email| !email.is_empty())
        .collect()
}

/// Decodes a `Subject` header.
///
/// A missing or undecodable subject gives [`NO_SUBJECT`].
#[must_use]
pub fn decode_subject(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return NO_SUBJECT.to_string();
    };
    match decode_rfc2047(raw) {
        Ok(subject) => subject,
        Err(e) => {
            warn!("Failed to decode subject {raw:?}: {e}");
            NO_SUBJECT.to_string()
        }
    }
}

/// Keeps alphanumerics, `_`, `-`, `.` and spaces.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
        .collect()
}

/// Derives the storage filename of a message.
///
/// The name is `{fragment} --- {subject} --- {sender}.eml` with both text
/// parts sanitized. When it exceeds `max_len` bytes only the subject is
/// shortened. Without a date fragment the name is
/// `Email_NoDate_{first 10 hex of fingerprint}.eml`.
#[must_use]
pub fn build_filename(
    fragment: &str,
    subject: &str,
    sender: &str,
    fingerprint: &Fingerprint,
    max_len: usize,
) -> String {
    if fragment.is_empty() {
        return format!("Email_NoDate_{}{EXTENSION}", fingerprint.short(10));
    }

    let subject = sanitize(subject);
    let sender = sanitize(sender);
    let name = format!("{fragment}{SEPARATOR}{subject}{SEPARATOR}{sender}{EXTENSION}");
    if name.len() <= max_len {
        return name;
    }

    let fixed = fragment.len() + sender.len() + 2 * SEPARATOR.len() + EXTENSION.len();
    let subject = truncate_bytes(&subject, max_len.saturating_sub(fixed)).trim();
    format!("{fragment}{SEPARATOR}{subject}{SEPARATOR}{sender}{EXTENSION}")
}

/// Filename for a message whose plain name is taken by another message.
///
/// Same as [`build_filename`] with `_{first 10 hex of fingerprint}` before
/// the extension, still within `max_len`.
#[must_use]
pub fn build_distinct_filename(
    fragment: &str,
    subject: &str,
    sender: &str,
    fingerprint: &Fingerprint,
    max_len: usize,
) -> String {
    let suffix = format!("_{}", fingerprint.short(10));
    let name = build_filename(
        fragment,
        subject,
        sender,
        fingerprint,
        max_len.saturating_sub(suffix.len()),
    );
    let stem = name.strip_suffix(EXTENSION).unwrap_or(&name);
    format!("{stem}{suffix}{EXTENSION}")
}

/// Longest prefix of at most `max` bytes that ends on a char boundary.
fn truncate_bytes(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fp() -> Fingerprint {
        Fingerprint::of_pairs([("Subject", "x")])
    }

    #[test]
    fn test_resolve_sender_preference() {
        assert_eq!(
            resolve_sender(Some("Alice <alice@example.com>")),
            "alice@example.com"
        );
        assert_eq!(resolve_sender(Some("\"Mailer Daemon\"")), "Mailer Daemon");
        assert_eq!(resolve_sender(Some("   ")), UNKNOWN_SENDER);
        assert_eq!(resolve_sender(None), UNKNOWN_SENDER);
    }

    #[test]
    fn test_resolve_sender_falls_back_to_raw() {
        assert_eq!(resolve_sender(Some("<>")), "<>");
    }

    #[test]
    fn test_parse_recipients() {
        let to = parse_recipients(Some(
            "a@example.com, \"Doe, J\" <j@example.com>, Nobody, <c@example.com>",
        ));
        assert_eq!(to, vec!["a@example.com", "j@example.com", "c@example.com"]);
        assert!(parse_recipients(Some("")).is_empty());
        assert!(parse_recipients(None).is_empty());
    }

    #[test]
    fn test_decode_subject() {
        assert_eq!(decode_subject(Some("=?utf-8?Q?Caf=C3=A9?=")), "Café");
        assert_eq!(decode_subject(Some("Plain")), "Plain");
        assert_eq!(decode_subject(None), NO_SUBJECT);
        assert_eq!(decode_subject(Some("=?utf-8?B?!!!?=")), NO_SUBJECT);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Re: a/b\\c <ok>_-. ñ"), "Re abc ok_-. ñ");
        assert_eq!(sanitize("alice@example.com"), "aliceexample.com");
    }

    #[test]
    fn test_build_filename() {
        let name = build_filename("02-01-2006_15-04", "Hi: there", "a@b.c", &fp(), 150);
        assert_eq!(name, "02-01-2006_15-04 --- Hi there --- ab.c.eml");
    }

    #[test]
    fn test_build_filename_without_date() {
        let fingerprint = fp();
        let name = build_filename("", "Hi", "a@b.c", &fingerprint, 150);
        assert_eq!(name, format!("Email_NoDate_{}.eml", &fingerprint.as_str()[..10]));
    }

    #[test]
    fn test_build_filename_truncates_subject_only() {
        let subject = "s".repeat(300);
        let name = build_filename("02-01-2006_15-04", &subject, "sender@example.com", &fp(), 150);
        assert_eq!(name.len(), 150);
        assert!(name.starts_with("02-01-2006_15-04 --- sss"));
        assert!(name.ends_with(" --- senderexample.com.eml"));
    }

    #[test]
    fn test_build_filename_multibyte_subject() {
        let subject = "é".repeat(200);
        let name = build_filename("02-01-2006_15-04", &subject, "x", &fp(), 150);
        assert!(name.len() <= 150);
        assert!(name.ends_with(" --- x.eml"));
    }

    #[test]
    fn test_build_distinct_filename() {
        let name = build_distinct_filename("02-01-2006_15-04", "Hello", "a@b.com", &fp(), 150);
        assert_eq!(
            name,
            format!("02-01-2006_15-04 --- Hello --- ab.com_{}.eml", fp().short(10))
        );

        let long = "x".repeat(300);
        let name = build_distinct_filename("02-01-2006_15-04", &long, "a@b.com", &fp(), 150);
        assert!(name.len() <= 150);
        assert!(name.ends_with(&format!(" --- ab.com_{}.eml", fp().short(10))));
    }

    proptest! {
        #[test]
        fn filename_respects_cap(subject in "\\PC{0,400}", sender in "[a-z@.]{1,40}") {
            let name = build_filename("02-01-2006_15-04", &subject, &sender, &fp(), 150);
            let sender = sanitize(&sender);
            prop_assert!(name.len() <= 150);
            prop_assert!(name.starts_with("02-01-2006_15-04 --- "));
            let suffix = format!(" --- {sender}.eml");
            prop_assert!(name.ends_with(&suffix));
        }

        #[test]
        fn sanitize_only_keeps_allowed(value in "\\PC{0,100}") {
            let clean = sanitize(&value);
            prop_assert!(clean
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ')));
        }
    }
}
