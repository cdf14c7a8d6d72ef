//! Message persistence and metadata record assembly.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use popledger_mime::Message;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::fingerprint::Fingerprint;
use crate::identity::{
    build_distinct_filename, build_filename, decode_subject, parse_recipients, resolve_sender,
};
use crate::temporal::TemporalNormalizer;

/// Value of both spam classification flags.
pub const FLAG_NO: &str = "no";

/// Headers searched for a spam score, in order.
const SPAM_HEADERS: [&str; 4] = [
    "X-Spam-Score",
    "X-Spam-Level",
    "X-Mail-filter-Score",
    "X-Spam-Status",
];

/// Headers whose whole value may be the score.
const DIRECT_SCORE_HEADERS: [&str; 2] = ["X-Spam-Score", "X-Spam-Level"];

#[allow(clippy::expect_used)]
static SCORE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)score=([\d.]+)").expect("valid spam score regex"));

/// Errors from writing a message file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The message file could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Metadata of one persisted message, as stored in the index document.
///
/// Unknown fields of records read from disk are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRecord {
    /// Filename.
    pub name: String,
    /// Path relative to the message root (`identity/filename`).
    pub path: String,
    /// `DD-MM-YYYY`, or empty.
    pub date: String,
    /// `HH-MM`, or empty.
    pub time: String,
    /// Decoded subject.
    pub subject: String,
    /// Sender display string.
    pub sender: String,
    /// Identity of the account that downloaded the message.
    pub recipient: String,
    /// `To` addresses.
    pub to: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// `Bcc` addresses.
    pub bcc: Vec<String>,
    /// `Message-ID`, or `N/A`.
    pub message_id: String,
    /// RFC 3339 timestamp in the target zone, or empty.
    pub date_iso: String,
    /// Size of the written file in bytes, or -1.
    pub size: i64,
    /// Header fingerprint.
    pub hash: String,
    /// Informational spam score.
    pub spam_score: Option<f64>,
    /// Spam classification flag, always `no`.
    pub spam_filter: String,
    /// Whitelist flag, always `no`.
    pub spam_filter_whitelist: String,
    /// Fields not known to this version.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            date: String::new(),
            time: String::new(),
            subject: String::new(),
            sender: String::new(),
            recipient: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            message_id: String::new(),
            date_iso: String::new(),
            size: -1,
            hash: String::new(),
            spam_score: None,
            spam_filter: FLAG_NO.to_string(),
            spam_filter_whitelist: FLAG_NO.to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Extracts the informational spam score from a message's headers.
///
/// The first header holding a `score=<number>` pattern, or for
/// `X-Spam-Score`/`X-Spam-Level` a plain number, wins.
#[must_use]
pub fn extract_spam_score(message: &Message) -> Option<f64> {
    SPAM_HEADERS.iter().find_map(|&name| {
        let value = message.header(name).filter(|v| !v.is_empty())?;

        let from_pattern = SCORE_PATTERN
            .captures(value)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());

        from_pattern
            .or_else(|| {
                DIRECT_SCORE_HEADERS
                    .contains(&name)
                    .then(|| value.trim().parse::<f64>().ok())
                    .flatten()
            })
            .filter(|score| score.is_finite())
    })
}

/// Result of writing a message under its plain filename.
enum Written {
    Created,
    /// The file already holds these exact bytes.
    AlreadyStored,
    /// The file holds a different message.
    NameTaken,
}

/// Writes `raw` to `path` without replacing an existing file.
async fn write_new(path: &Path, raw: &[u8]) -> io::Result<Written> {
    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let same = tokio::fs::read(path)
                .await
                .is_ok_and(|existing| existing == raw);
            return Ok(if same {
                Written::AlreadyStored
            } else {
                Written::NameTaken
            });
        }
        Err(e) => return Err(e),
    };

    let written = async {
        file.write_all(raw).await?;
        file.flush().await
    }
    .await;
    if let Err(e) = written {
        drop(file);
        if let Err(remove) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove partial file {}: {remove}", path.display());
        }
        return Err(e);
    }
    Ok(Written::Created)
}

/// Writes raw messages under the message root and builds their records.
#[derive(Debug, Clone)]
pub struct MessagePersister {
    root: PathBuf,
    normalizer: TemporalNormalizer,
    max_filename_len: usize,
}

impl MessagePersister {
    /// Creates a persister writing into `root/{identity}/`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, normalizer: TemporalNormalizer, max_filename_len: usize) -> Self {
        Self {
            root: root.into(),
            normalizer,
            max_filename_len,
        }
    }

    /// Writes a message verbatim and returns its metadata record.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Write`] if the file cannot be written; the
    /// message must then not be registered as seen.
    pub async fn persist(
        &self,
        identity: &str,
        raw: &[u8],
        message: &Message,
        fingerprint: &Fingerprint,
    ) -> Result<MetadataRecord, PersistError> {
        let sender = resolve_sender(message.from_header());
        let subject = decode_subject(message.subject());
        let timestamp = self.normalizer.normalize(identity, message.date_raw()).await;

        let name = build_filename(
            &timestamp.fragment,
            &subject,
            &sender,
            fingerprint,
            self.max_filename_len,
        );
        if !timestamp.is_resolved() {
            warn!("No usable date for message from {sender}, using '{name}'");
        }

        let dir = self.root.join(identity);
        debug!("Saving message '{subject}' from {sender}");
        let name = match write_new(&dir.join(&name), raw).await {
            Ok(Written::Created | Written::AlreadyStored) => name,
            Ok(Written::NameTaken) => {
                let distinct = build_distinct_filename(
                    &timestamp.fragment,
                    &subject,
                    &sender,
                    fingerprint,
                    self.max_filename_len,
                );
                warn!("'{name}' holds another message, saving as '{distinct}'");
                let path = dir.join(&distinct);
                tokio::fs::write(&path, raw)
                    .await
                    .map_err(|source| PersistError::Write { path, source })?;
                distinct
            }
            Err(source) => {
                return Err(PersistError::Write {
                    path: dir.join(&name),
                    source,
                });
            }
        };
        let path = dir.join(&name);
        info!("Saved {}", path.display());

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => i64::try_from(meta.len()).unwrap_or(-1),
            Err(e) => {
                warn!("Failed to read size of {}: {e}", path.display());
                -1
            }
        };

        let spam_score = extract_spam_score(message);
        debug!("Spam score for {name}: {spam_score:?}");

        Ok(MetadataRecord {
            path: format!("{identity}/{name}"),
            date: timestamp.date_part().to_string(),
            time: timestamp.time_part().to_string(),
            name,
            subject,
            sender,
            recipient: identity.to_string(),
            to: parse_recipients(message.to()),
            cc: parse_recipients(message.cc()),
            bcc: parse_recipients(message.bcc()),
            message_id: message.message_id().unwrap_or("N/A").to_string(),
            date_iso: timestamp.iso,
            size,
            hash: fingerprint.to_string(),
            spam_score,
            ..MetadataRecord::default()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com, \"Doe, J\" <j@example.com>\r\n\
Cc: carol@example.com\r\n\
Subject: Quarterly: report\r\n\
Date: Mon, 02 Jan 2006 15:04:05 -0600\r\n\
Message-ID: <m1@example.com>\r\n\
X-Spam-Status: No, score=2.5 required=5.0\r\n\
\r\n\
Body\r\n";

    fn persister(root: &std::path::Path) -> MessagePersister {
        MessagePersister::new(root, TemporalNormalizer::new("America/Mexico_City"), 150)
    }

    #[test]
    fn test_spam_score_pattern() {
        let msg = Message::parse(b"X-Spam-Status: Yes, SCORE=7.1 tests=FOO\r\n\r\n");
        assert_eq!(extract_spam_score(&msg), Some(7.1));
    }

    #[test]
    fn test_spam_score_direct_value() {
        let msg = Message::parse(b"X-Spam-Score: 3.25\r\n\r\n");
        assert_eq!(extract_spam_score(&msg), Some(3.25));

        // Direct parsing only applies to the first two headers
        let msg = Message::parse(b"X-Mail-filter-Score: 4\r\n\r\n");
        assert_eq!(extract_spam_score(&msg), None);
    }

    #[test]
    fn test_spam_score_header_order() {
        let msg = Message::parse(
            b"X-Spam-Status: score=9.0\r\nX-Spam-Level: ****\r\nX-Spam-Score: 1.5\r\n\r\n",
        );
        assert_eq!(extract_spam_score(&msg), Some(1.5));

        let msg = Message::parse(b"X-Spam-Level: ****\r\nX-Spam-Status: score=9.0\r\n\r\n");
        assert_eq!(extract_spam_score(&msg), Some(9.0));
        assert_eq!(extract_spam_score(&Message::parse(b"Subject: x\r\n\r\n")), None);
    }

    #[tokio::test]
    async fn test_persist_writes_file_and_builds_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("alice")).unwrap();
        let message = Message::parse(RAW);
        let fingerprint = Fingerprint::of_headers(&message.headers);

        let record = persister(dir.path())
            .persist("alice", RAW, &message, &fingerprint)
            .await
            .unwrap();

        assert_eq!(
            record.name,
            "02-01-2006_15-04 --- Quarterly report --- aliceexample.com.eml"
        );
        assert_eq!(record.path, format!("alice/{}", record.name));
        assert_eq!(std::fs::read(dir.path().join(&record.path)).unwrap(), RAW);
        assert_eq!(record.size, i64::try_from(RAW.len()).unwrap());
        assert_eq!(record.date, "02-01-2006");
        assert_eq!(record.time, "15-04");
        assert_eq!(record.date_iso, "2006-01-02T15:04:05-06:00");
        assert_eq!(record.subject, "Quarterly: report");
        assert_eq!(record.sender, "alice@example.com");
        assert_eq!(record.recipient, "alice");
        assert_eq!(record.to, vec!["bob@example.com", "j@example.com"]);
        assert_eq!(record.cc, vec!["carol@example.com"]);
        assert!(record.bcc.is_empty());
        assert_eq!(record.message_id, "<m1@example.com>");
        assert_eq!(record.hash, fingerprint.as_str());
        assert_eq!(record.spam_score, Some(2.5));
        assert_eq!(record.spam_filter, "no");
        assert_eq!(record.spam_filter_whitelist, "no");
    }

    #[tokio::test]
    async fn test_persist_without_date_or_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("alice")).unwrap();
        let raw = b"X-Other: 1\r\n\r\nBody";
        let message = Message::parse(raw);
        let fingerprint = Fingerprint::of_headers(&message.headers);

        let record = persister(dir.path())
            .persist("alice", raw, &message, &fingerprint)
            .await
            .unwrap();

        assert_eq!(record.name, format!("Email_NoDate_{}.eml", fingerprint.short(10)));
        assert_eq!(record.date, "");
        assert_eq!(record.time, "");
        assert_eq!(record.date_iso, "");
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.sender, "N/A");
        assert_eq!(record.message_id, "N/A");
        assert_eq!(record.spam_score, None);
    }

    #[tokio::test]
    async fn test_persist_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // Account directory missing
        let message = Message::parse(RAW);
        let fingerprint = Fingerprint::of_headers(&message.headers);

        let err = persister(dir.path())
            .persist("ghost", RAW, &message, &fingerprint)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Write { .. }));
    }

    #[tokio::test]
    async fn test_name_collision_keeps_both_messages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("alice")).unwrap();
        let persister = persister(dir.path());

        let first = Message::parse(RAW);
        let first_fp = Fingerprint::of_headers(&first.headers);
        let first_record = persister.persist("alice", RAW, &first, &first_fp).await.unwrap();

        // Same minute, subject and sender; different Message-ID
        let other_raw = String::from_utf8_lossy(RAW)
            .replace("<m1@example.com>", "<m2@example.com>")
            .into_bytes();
        let other = Message::parse(&other_raw);
        let other_fp = Fingerprint::of_headers(&other.headers);
        let other_record = persister
            .persist("alice", &other_raw, &other, &other_fp)
            .await
            .unwrap();

        assert_ne!(first_record.name, other_record.name);
        assert_eq!(
            other_record.name,
            format!(
                "02-01-2006_15-04 --- Quarterly report --- aliceexample.com_{}.eml",
                other_fp.short(10)
            )
        );
        assert_eq!(std::fs::read(dir.path().join(&first_record.path)).unwrap(), RAW);
        assert_eq!(
            std::fs::read(dir.path().join(&other_record.path)).unwrap(),
            other_raw
        );
    }

    #[tokio::test]
    async fn test_same_message_reuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("alice")).unwrap();
        let persister = persister(dir.path());
        let message = Message::parse(RAW);
        let fingerprint = Fingerprint::of_headers(&message.headers);

        let first = persister.persist("alice", RAW, &message, &fingerprint).await.unwrap();
        let again = persister.persist("alice", RAW, &message, &fingerprint).await.unwrap();

        assert_eq!(first.name, again.name);
        assert_eq!(std::fs::read_dir(dir.path().join("alice")).unwrap().count(), 1);
    }

    #[test]
    fn test_score_pattern_compiles() {
        assert!(SCORE_PATTERN.is_match("score=1.0"));
    }

    #[test]
    fn test_record_serialization() {
        let record = MetadataRecord {
            name: "n.eml".to_string(),
            hash: "abc".to_string(),
            ..MetadataRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "n.eml");
        assert_eq!(json["size"], -1);
        assert_eq!(json["spam_score"], serde_json::Value::Null);
        assert_eq!(json["spam_filter"], "no");
        assert!(json["to"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_record_keeps_unknown_fields() {
        let json = r#"{"name": "old.eml", "hash": "h1", "legacy_field": 42}"#;
        let record: MetadataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "old.eml");
        assert_eq!(record.size, -1);
        assert_eq!(record.extra["legacy_field"], 42);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["legacy_field"], 42);
    }
}
