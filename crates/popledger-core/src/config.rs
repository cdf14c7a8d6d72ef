//! Runtime configuration and on-disk layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Environment variable that overrides the data root.
pub const DATA_DIR_ENV: &str = "POPLEDGER_DATA_DIR";

/// What to do when the metadata index document cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptIndexPolicy {
    /// Start from an empty index and overwrite the document on save.
    #[default]
    Degrade,
    /// Skip the cycle and leave the document untouched.
    Fail,
}

/// Settings read from `settings.json` in the data root.
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between polling cycles.
    pub check_interval_secs: u64,
    /// Timeout for every network round trip, in seconds.
    pub io_timeout_secs: u64,
    /// IANA zone used for filename fragments and timestamps.
    pub target_timezone: String,
    /// Maximum filename length in bytes.
    pub max_filename_len: usize,
    /// Recovery policy for an unreadable index document.
    pub corrupt_index_policy: CorruptIndexPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval_secs: 900,
            io_timeout_secs: 30,
            target_timezone: "America/Mexico_City".to_string(),
            max_filename_len: 150,
            corrupt_index_policy: CorruptIndexPolicy::Degrade,
        }
    }
}

impl Config {
    /// Loads settings from a JSON file.
    ///
    /// A missing file gives the defaults; a malformed one is logged and also
    /// gives the defaults.
    pub async fn load(path: &Path) -> Self {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read settings {}, using defaults: {e}", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("Settings loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Malformed settings {}, using defaults: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Interval between cycles.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Per-operation network timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

/// Locations of everything popledger reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Data root.
    pub root: PathBuf,
    /// Root of the per-account message directories.
    pub emails: PathBuf,
    /// Diagnostic log directory.
    pub logs: PathBuf,
    /// Account credentials file.
    pub accounts: PathBuf,
    /// Consolidated metadata index document.
    pub index: PathBuf,
    /// File whose presence restarts the wait between cycles.
    pub trigger: PathBuf,
    /// Settings file.
    pub settings: PathBuf,
}

impl Paths {
    /// Derives every location from a data root.
    #[must_use]
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            emails: root.join("emails"),
            logs: root.join("Logs"),
            accounts: root.join("accounts.txt"),
            index: root.join("emails_metadata.json"),
            trigger: root.join("trigger_check.txt"),
            settings: root.join("settings.json"),
            root,
        }
    }

    /// Resolves the data root: `$POPLEDGER_DATA_DIR`, else the platform data
    /// directory joined with `popledger`, else the working directory.
    #[must_use]
    pub fn resolve() -> Self {
        let root = std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map_or_else(
                || {
                    dirs::data_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join("popledger")
                },
                PathBuf::from,
            );
        Self::from_root(root)
    }

    /// Creates the message and log directories.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.emails).await?;
        tokio::fs::create_dir_all(&self.logs).await?;
        Ok(())
    }

    /// Storage directory of one account.
    #[must_use]
    pub fn account_dir(&self, identity: &str) -> PathBuf {
        self.emails.join(identity)
    }
}
