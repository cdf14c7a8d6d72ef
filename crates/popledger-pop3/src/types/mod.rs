//! Core POP3 types.

mod response;
mod stat;

pub use response::{Response, Status};
pub use stat::MailboxStat;
