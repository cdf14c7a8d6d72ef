//! `Date` header normalization.
//!
//! Resolves a raw `Date` header into the target timezone and produces the
//! filename fragment (`DD-MM-YYYY_HH-MM`) and an RFC 3339 timestamp. Every
//! attempt is appended to a per-day diagnostic log.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use chrono_tz::Tz;
use popledger_mime::date::parse_date;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Raw-value placeholder logged when a message has no `Date` header.
pub const NO_DATE_HEADER: &str = "No Date Header";

/// A resolved date: filename fragment plus RFC 3339 timestamp.
///
/// Both fields are empty when the date could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timestamp {
    /// `DD-MM-YYYY_HH-MM` in the target zone.
    pub fragment: String,
    /// Zone-aware RFC 3339 representation.
    pub iso: String,
}

impl Timestamp {
    fn from_zoned(dt: &DateTime<Tz>) -> Self {
        Self {
            fragment: dt.format("%d-%m-%Y_%H-%M").to_string(),
            iso: dt.to_rfc3339(),
        }
    }

    /// Returns true if a date was resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.fragment.is_empty()
    }

    /// The `DD-MM-YYYY` part of the fragment, or empty.
    #[must_use]
    pub fn date_part(&self) -> &str {
        self.fragment
            .split_once('_')
            .map_or(self.fragment.as_str(), |(date, _)| date)
    }

    /// The `HH-MM` part of the fragment, or empty.
    #[must_use]
    pub fn time_part(&self) -> &str {
        self.fragment.split_once('_').map_or("", |(_, time)| time)
    }
}

/// Outcome of resolving one `Date` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateResolution {
    /// The date was resolved.
    Resolved(Timestamp),
    /// The message had no `Date` header.
    MissingHeader,
    /// Neither parser accepted the value.
    NotParsable,
    /// The configured target zone is unknown.
    UnknownZone,
}

impl DateResolution {
    /// The value written to the diagnostic log's converted column.
    #[must_use]
    pub fn converted(&self) -> &str {
        match self {
            Self::Resolved(ts) => &ts.fragment,
            Self::MissingHeader => "N/A (Header not found)",
            Self::NotParsable => "N/A (Not parsable)",
            Self::UnknownZone => "N/A (Timezone not found)",
        }
    }

    /// The timestamp, empty unless resolved.
    #[must_use]
    pub fn into_timestamp(self) -> Timestamp {
        match self {
            Self::Resolved(ts) => ts,
            _ => Timestamp::default(),
        }
    }
}

/// Converts `Date` headers into the target timezone.
#[derive(Debug, Clone)]
pub struct TemporalNormalizer {
    zone: Option<Tz>,
    audit: Option<DateAuditLog>,
}

impl TemporalNormalizer {
    /// Creates a normalizer for an IANA zone name.
    ///
    /// An unknown name is logged; every date then resolves to
    /// [`DateResolution::UnknownZone`].
    #[must_use]
    pub fn new(zone_name: &str) -> Self {
        let zone = zone_name.parse::<Tz>().ok();
        if zone.is_none() {
            warn!("Unknown target timezone '{zone_name}', dates will not be resolved");
        }
        Self { zone, audit: None }
    }

    /// Appends every attempt to a diagnostic log.
    #[must_use]
    pub fn with_audit_log(mut self, audit: DateAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Resolves a raw header value without logging.
    #[must_use]
    pub fn resolve(&self, raw: Option<&str>) -> DateResolution {
        let Some(raw) = raw else {
            return DateResolution::MissingHeader;
        };
        let Some(parsed) = parse_date(raw) else {
            return DateResolution::NotParsable;
        };
        let Some(zone) = self.zone else {
            return DateResolution::UnknownZone;
        };

        DateResolution::Resolved(Timestamp::from_zoned(&parsed.to_utc().with_timezone(&zone)))
    }

    /// Resolves a raw header value and records the attempt for `identity`.
    pub async fn normalize(&self, identity: &str, raw: Option<&str>) -> Timestamp {
        let resolution = self.resolve(raw);
        debug!(
            "Date for {identity}: {:?} -> '{}'",
            raw.unwrap_or(NO_DATE_HEADER),
            resolution.converted()
        );
        if let Some(audit) = &self.audit {
            audit.record(identity, raw, &resolution).await;
        }
        resolution.into_timestamp()
    }
}

/// Append-only per-day log of raw `Date` values and their conversions.
///
/// Files are named `RawDates_{YYYY-MM-DD}.log` after the local date.
#[derive(Debug, Clone)]
pub struct DateAuditLog {
    dir: PathBuf,
}

impl DateAuditLog {
    /// Creates a log writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Log file for a given day.
    #[must_use]
    pub fn file_for(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("RawDates_{}.log", day.format("%Y-%m-%d")))
    }

    /// Formats one log line (without the trailing newline).
    #[must_use]
    pub fn format_line(
        at: &DateTime<Local>,
        identity: &str,
        raw: Option<&str>,
        converted: &str,
    ) -> String {
        format!(
            "[{}]: User: {identity} | Raw Date: '{}' | Converted: '{converted}'",
            at.format("%Y-%m-%d %H:%M:%S"),
            raw.unwrap_or(NO_DATE_HEADER),
        )
    }

    /// Appends one attempt. Failures are logged and otherwise ignored.
    pub async fn record(&self, identity: &str, raw: Option<&str>, resolution: &DateResolution) {
        let now = Local::now();
        let path = self.file_for(now.date_naive());
        let mut line = Self::format_line(&now, identity, raw, resolution.converted());
        line.push('\n');

        if let Err(e) = append(&path, line.as_bytes()).await {
            warn!("Failed to write date log {}: {e}", path.display());
        }
    }
}

async fn append(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.flush().await
}
