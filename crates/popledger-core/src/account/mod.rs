//! Account management module.
//!
//! Provides the account credential model and the `accounts.txt` parser.

mod model;
mod parser;

pub use model::{Account, Security};
pub use parser::{AccountLineError, load_accounts, parse_accounts, parse_line};
