//! Mailbox address parsing for `From`, `To`, `Cc` and `Bcc` values.

use crate::encoding::decode_rfc2047;

/// A parsed mailbox: optional display name and address.
///
/// Either part may be empty. Parsing never fails; unrecognizable input
/// yields empty parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name, with quotes removed and encoded words decoded.
    pub name: String,
    /// Address (`local@domain`).
    pub email: String,
}

impl Address {
    /// Parses a single mailbox.
    ///
    /// Accepted forms:
    /// - `Name <local@domain>` / `"Quoted, Name" <local@domain>`
    /// - `<local@domain>`
    /// - `local@domain (Comment Name)`
    /// - `local@domain`
    /// - `Name only` (address left empty)
    #[must_use]
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        if entry.is_empty() {
            return Self::default();
        }

        // Try to parse "Name <email@example.com>" format
        if let Some(start) = entry.rfind('<')
            && let Some(len) = entry[start..].find('>')
        {
            let email = entry[start + 1..start + len].trim().to_string();
            let name = clean_name(&entry[..start]);
            return Self { name, email };
        }

        let (bare, comment) = split_comment(entry);
        if bare.contains('@') {
            return Self {
                name: clean_name(&comment),
                email: bare.split_whitespace().collect(),
            };
        }

        // No address at all, keep whatever text there was as the name
        let name = if bare.is_empty() { comment } else { bare };
        Self {
            name: clean_name(&name),
            email: String::new(),
        }
    }

    /// Returns true if neither a name nor an address was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty()
    }
}

/// Splits an address list on commas that separate mailboxes.
///
/// Commas inside quoted names, angle brackets or comments do not split.
#[must_use]
pub fn split_list(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth_angle = 0usize;
    let mut depth_comment = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => depth_angle += 1,
            '>' if !in_quotes => depth_angle = depth_angle.saturating_sub(1),
            '(' if !in_quotes => depth_comment += 1,
            ')' if !in_quotes => depth_comment = depth_comment.saturating_sub(1),
            ',' if !in_quotes && depth_angle == 0 && depth_comment == 0 => {
                parts.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Parses an address list into its mailboxes.
#[must_use]
pub fn parse_list(value: &str) -> Vec<Address> {
    split_list(value).into_iter().map(Address::parse).collect()
}

/// Separates `text (comment)` into the text and the comment content.
fn split_comment(entry: &str) -> (String, String) {
    let mut bare = String::new();
    let mut comment = String::new();
    let mut depth = 0usize;

    for ch in entry.chars() {
        match ch {
            '(' => {
                if depth > 0 {
                    comment.push(ch);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth > 0 {
                    comment.push(ch);
                }
            }
            _ if depth > 0 => comment.push(ch),
            _ => bare.push(ch),
        }
    }

    (bare.trim().to_string(), comment.trim().to_string())
}

/// Trims, unquotes and decodes a display name.
fn clean_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map_or_else(|| trimmed.to_string(), |s| s.replace("\\\"", "\""));
    decode_rfc2047(&unquoted).unwrap_or(unquoted)
}
