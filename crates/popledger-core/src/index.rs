//! Consolidated metadata index.
//!
//! The index document is `{"emails": [...], "total_emails": N}`. It is loaded
//! once per cycle, grows additively while accounts are processed and is
//! written once at the end of the cycle through a temporary file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CorruptIndexPolicy;
use crate::fingerprint::Fingerprint;
use crate::persist::MetadataRecord;

/// Errors from loading or saving the index document.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The document exists but could not be read.
    #[error("Failed to read index {path}: {source}")]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid index.
    #[error("Corrupt index {path}: {reason}")]
    Corrupt {
        /// Document path.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// The document could not be written.
    #[error("Failed to write index {path}: {source}")]
    Write {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The index could not be serialized.
    #[error("Failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One entry of the `emails` array.
///
/// Entries that do not fit [`MetadataRecord`] are kept verbatim so a save
/// never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexEntry {
    /// A well-formed record.
    Record(MetadataRecord),
    /// Anything else found in the document.
    Opaque(serde_json::Value),
}

impl IndexEntry {
    /// The entry's fingerprint, if it has a non-empty one.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        let hash = match self {
            Self::Record(record) => Some(record.hash.as_str()),
            Self::Opaque(value) => value.get("hash").and_then(serde_json::Value::as_str),
        };
        hash.filter(|h| !h.is_empty())
    }
}

#[derive(Serialize)]
struct IndexDocumentRef<'a> {
    emails: &'a [IndexEntry],
    total_emails: usize,
}

#[derive(Deserialize)]
struct IndexDocument {
    emails: Vec<IndexEntry>,
}

/// Ordered records plus the set of fingerprints already seen.
///
/// Every record fingerprint is in the set; the set is only ever updated
/// through [`MetadataIndex::insert`].
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    entries: Vec<IndexEntry>,
    seen: HashSet<String>,
    loaded: usize,
}

impl MetadataIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_entries(entries: Vec<IndexEntry>) -> Self {
        let seen = entries
            .iter()
            .filter_map(IndexEntry::hash)
            .map(str::to_string)
            .collect();
        let loaded = entries.len();
        Self {
            entries,
            seen,
            loaded,
        }
    }

    /// Returns true if a message with this fingerprint is already recorded.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint.as_str())
    }

    /// Appends a record and registers its fingerprint.
    ///
    /// Returns false, leaving the index unchanged, if the fingerprint is
    /// already known.
    pub fn insert(&mut self, record: MetadataRecord) -> bool {
        if !record.hash.is_empty() && !self.seen.insert(record.hash.clone()) {
            return false;
        }
        self.entries.push(IndexEntry::Record(record));
        true
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries added since the index was loaded.
    #[must_use]
    pub fn added(&self) -> usize {
        self.entries.len() - self.loaded
    }
}

/// Reads and writes the index document.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
    policy: CorruptIndexPolicy,
}

impl IndexStore {
    /// Creates a store for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, policy: CorruptIndexPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// Document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the index.
    ///
    /// A missing document gives an empty index. An unreadable or corrupt one
    /// gives an empty index under [`CorruptIndexPolicy::Degrade`].
    ///
    /// # Errors
    ///
    /// Under [`CorruptIndexPolicy::Fail`], returns the read or parse error.
    pub async fn load(&self) -> Result<MetadataIndex, IndexError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No index at {}, starting empty", self.path.display());
                return Ok(MetadataIndex::new());
            }
            Err(source) => {
                return self.recover(IndexError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        match serde_json::from_slice::<IndexDocument>(&contents) {
            Ok(document) => {
                let index = MetadataIndex::from_entries(document.emails);
                info!(
                    "Loaded {} index record(s) from {}",
                    index.len(),
                    self.path.display()
                );
                Ok(index)
            }
            Err(e) => self.recover(IndexError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn recover(&self, error: IndexError) -> Result<MetadataIndex, IndexError> {
        match self.policy {
            CorruptIndexPolicy::Degrade => {
                warn!("{error}; starting with an empty index");
                Ok(MetadataIndex::new())
            }
            CorruptIndexPolicy::Fail => Err(error),
        }
    }

    /// Writes the index, replacing the previous document.
    ///
    /// The document is written to a sibling temporary file and renamed into
    /// place. A missing parent directory is created.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, the write or the rename fails.
    pub async fn save(&self, index: &MetadataIndex) -> Result<(), IndexError> {
        let write_err = |source| IndexError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let document = IndexDocumentRef {
            emails: index.entries(),
            total_emails: index.len(),
        };
        let contents = serde_json::to_vec_pretty(&document)?;

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, contents).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        info!(
            "Saved {} index record(s) to {}",
            index.len(),
            self.path.display()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(hash: &str) -> MetadataRecord {
        MetadataRecord {
            name: format!("{hash}.eml"),
            hash: hash.to_string(),
            ..MetadataRecord::default()
        }
    }

    fn fp(value: &str) -> Fingerprint {
        Fingerprint::of_pairs([("Message-ID", value)])
    }

    #[test]
    fn test_insert_registers_fingerprint() {
        let mut index = MetadataIndex::new();
        let fingerprint = fp("a");
        assert!(!index.contains(&fingerprint));
        assert!(index.insert(record(fingerprint.as_str())));
        assert!(index.contains(&fingerprint));
        assert!(!index.insert(record(fingerprint.as_str())));
        assert_eq!(index.len(), 1);
        assert_eq!(index.added(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.json"), CorruptIndexPolicy::Fail);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("emails_metadata.json");
        let store = IndexStore::new(&path, CorruptIndexPolicy::Degrade);

        let mut index = MetadataIndex::new();
        index.insert(record("h1"));
        index.insert(record("h2"));
        store.save(&index).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total_emails"], 2);
        assert_eq!(json["emails"][1]["hash"], "h2");
        assert!(!dir.path().join("nested").join("emails_metadata.json.tmp").exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.added(), 0);
        let names: Vec<&str> = loaded
            .entries()
            .iter()
            .filter_map(|entry| match entry {
                IndexEntry::Record(record) => Some(record.name.as_str()),
                IndexEntry::Opaque(_) => None,
            })
            .collect();
        assert_eq!(names, vec!["h1.eml", "h2.eml"]);
    }

    #[tokio::test]
    async fn test_corrupt_document_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails_metadata.json");
        std::fs::write(&path, r#"{"emails": [{"hash": "h1"#).unwrap();
        let store = IndexStore::new(&path, CorruptIndexPolicy::Degrade);

        let mut index = store.load().await.unwrap();
        assert!(index.is_empty());

        index.insert(record("h9"));
        store.save(&index).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_structure_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails_metadata.json");
        std::fs::write(&path, r"[1, 2, 3]").unwrap();
        let store = IndexStore::new(&path, CorruptIndexPolicy::Degrade);
        assert!(store.load().await.unwrap().is_empty());

        std::fs::write(&path, r#"{"emails": "nope"}"#).unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_fail_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails_metadata.json");
        std::fs::write(&path, "not json").unwrap();
        let store = IndexStore::new(&path, CorruptIndexPolicy::Fail);

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, IndexError::Corrupt { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }

    #[tokio::test]
    async fn test_unusual_entries_survive_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails_metadata.json");
        std::fs::write(
            &path,
            r#"{"emails": [
                {"name": "a.eml", "hash": "h1", "custom": true},
                {"name": "b.eml", "to": "not-a-list", "hash": "h2"},
                {"name": "c.eml"}
            ], "total_emails": 3}"#,
        )
        .unwrap();
        let store = IndexStore::new(&path, CorruptIndexPolicy::Degrade);

        let mut index = store.load().await.unwrap();
        assert_eq!(index.len(), 3);
        assert!(matches!(index.entries()[1], IndexEntry::Opaque(_)));
        assert!(!index.insert(record("h2")));
        assert!(index.insert(record("h3")));
        store.save(&index).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total_emails"], 4);
        assert_eq!(json["emails"][0]["custom"], true);
        assert_eq!(json["emails"][1]["to"], "not-a-list");
        assert_eq!(json["emails"][3]["hash"], "h3");
    }
}
