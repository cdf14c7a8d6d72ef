//! POP3 status responses.

/// Status indicator of a POP3 response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `+OK`
    Ok,
    /// `-ERR`
    Err,
}

/// A single-line POP3 status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Positive or negative status.
    pub status: Status,
    /// Text following the status indicator (may be empty).
    pub text: String,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    /// Returns true for `+OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok)
    }
}
