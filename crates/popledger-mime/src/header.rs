//! Ordered header handling.


/// Ordered collection of message headers.
///
/// Headers keep the order in which they were encountered, duplicates
/// included, and keep the original spelling of each name. Lookups are
/// case-insensitive.
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

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns true if at least one header with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get_first(name).is_some()
    }

    /// Returns an iterator over all headers in encountered order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header fields (duplicates counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses headers from raw bytes.
    ///
    /// Parsing stops at the first empty line. Bytes that are not valid UTF-8
    /// are replaced, never rejected. Folded lines are unfolded into a single
    /// value. Lines without a colon outside a fold are ignored.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self::parse_str(&String::from_utf8_lossy(raw))
    }

    /// Parses headers from text.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    ///   continuation
    /// ```
    #[must_use]
    pub fn parse_str(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                // Empty line signals end of headers
                break;
            }

            // Check for continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_some() {
                    current_value.push(' ');
                    current_value.push_str(line.trim());
                }
                continue;
            }

            // Save previous header if exists
            if let Some(name) = current_name.take() {
                headers.add(name, current_value.trim());
                current_value.clear();
            }

            if let Some((name, value)) = line.split_once(':') {
                current_name = Some(name.trim().to_string());
                current_value = value.trim().to_string();
            }
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim());
        }

        headers
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
        assert_eq!(headers.len(), 0);
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get_first("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get_first("content-type"), Some("text/plain")); // Case insensitive
        assert_eq!(headers.get_first("Subject"), None);
    }

    #[test]
    fn test_duplicates_preserved_in_order() {
        let mut headers = Headers::new();
        headers.add("Received", "from a");
        headers.add("Subject", "Hi");
        headers.add("Received", "from b");

        assert_eq!(headers.get_first("received"), Some("from a"));
        assert_eq!(headers.get_all("Received"), vec!["from a", "from b"]);
        assert!(headers.get_all("Cc").is_empty());

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Received", "Subject", "Received"]);
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text.as_bytes());
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get_first("From"), Some("sender@example.com"));
        assert_eq!(headers.get_first("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get_first("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(!headers.contains("Body"));
    }

    #[test]
    fn test_headers_parse_keeps_name_spelling() {
        let headers = Headers::parse(b"X-Mailer: foo\r\nMESSAGE-ID: <a@b>\r\n");
        let pairs: Vec<(&str, &str)> = headers.iter().collect();
        assert_eq!(pairs, vec![("X-Mailer", "foo"), ("MESSAGE-ID", "<a@b>")]);
    }

    #[test]
    fn test_headers_parse_invalid_utf8() {
        let headers = Headers::parse(b"Subject: caf\xe9\r\n\r\n");
        assert_eq!(headers.get_first("subject"), Some("caf\u{FFFD}"));
    }
}
