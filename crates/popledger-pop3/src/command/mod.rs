//! POP3 command builder.

use std::fmt;

/// POP3 command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Identify the mailbox
    User {
        /// Mailbox name
        name: String,
    },
    /// PASS - Mailbox password
    Pass {
        /// Password
        secret: String,
    },
    /// STLS - Upgrade to TLS (RFC 2595)
    Stls,
    /// STAT - Message count and maildrop size
    Stat,
    /// TOP - Headers plus the first lines of the body
    Top {
        /// Message number (1-based)
        msg: u32,
        /// Number of body lines to include
        lines: u32,
    },
    /// RETR - Full message
    Retr {
        /// Message number (1-based)
        msg: u32,
    },
    /// QUIT - Close the session
    Quit,
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::User { .. } => "USER",
            Self::Pass { .. } => "PASS",
            Self::Stls => "STLS",
            Self::Stat => "STAT",
            Self::Top { .. } => "TOP",
            Self::Retr { .. } => "RETR",
            Self::Quit => "QUIT",
        }
    }

    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.keyword().as_bytes());

        match self {
            Self::User { name } => {
                buf.push(b' ');
                buf.extend_from_slice(name.as_bytes());
            }
            Self::Pass { secret } => {
                buf.push(b' ');
                buf.extend_from_slice(secret.as_bytes());
            }
            Self::Top { msg, lines } => {
                buf.extend_from_slice(format!(" {msg} {lines}").as_bytes());
            }
            Self::Retr { msg } => {
                buf.extend_from_slice(format!(" {msg}").as_bytes());
            }
            Self::Stls | Self::Stat | Self::Quit => {}
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

// Keeps the password out of logs.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { name } => write!(f, "USER {name}"),
            Self::Pass { .. } => write!(f, "PASS ****"),
            Self::Top { msg, lines } => write!(f, "TOP {msg} {lines}"),
            Self::Retr { msg } => write!(f, "RETR {msg}"),
            other => f.write_str(other.keyword()),
        }
    }
}
