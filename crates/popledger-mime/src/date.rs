//! `Date` header parsing.
//!
//! Two parsers are tried in order: a strict RFC 5322 parser, then a loose
//! token-based parser that accepts the date tuples real mail clients send
//! (missing zones, comments, two-digit years, ISO-like dates, month-first
//! order).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Which parser produced a [`ParsedDate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Strict RFC 5322 parsing.
    Rfc5322,
    /// Loose date-tuple parsing.
    Loose,
}

/// A parsed `Date` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    /// Wall-clock date and time as written in the header.
    pub local: NaiveDateTime,
    /// Zone offset, if the header carried a usable one.
    pub offset: Option<FixedOffset>,
    /// Parser that succeeded.
    pub source: DateSource,
}

impl ParsedDate {
    /// Returns the instant in UTC. A value without offset is taken as UTC.
    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self.offset {
            Some(offset) => offset
                .from_local_datetime(&self.local)
                .single()
                .map_or_else(
                    || Utc.from_utc_datetime(&self.local),
                    |dt| dt.with_timezone(&Utc),
                ),
            None => Utc.from_utc_datetime(&self.local),
        }
    }
}

/// Parses a `Date` header, trying the strict parser first.
#[must_use]
pub fn parse_date(value: &str) -> Option<ParsedDate> {
    parse_rfc5322(value).or_else(|| parse_loose(value))
}

/// Strict RFC 5322 (RFC 2822) date parsing.
#[must_use]
pub fn parse_rfc5322(value: &str) -> Option<ParsedDate> {
    let dt = DateTime::parse_from_rfc2822(value.trim()).ok()?;
    Some(ParsedDate {
        local: dt.naive_local(),
        offset: Some(*dt.offset()),
        source: DateSource::Rfc5322,
    })
}

/// Loose date-tuple parsing.
///
/// Needs at least a day, a month and a year; the time defaults to midnight.
#[must_use]
pub fn parse_loose(value: &str) -> Option<ParsedDate> {
    let cleaned = strip_comments(value).replace(',', " ");

    let mut day: Option<u32> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;
    let mut time: Option<NaiveTime> = None;
    let mut offset: Option<FixedOffset> = None;

    for token in cleaned.split_whitespace() {
        // ISO-like 2006-01-02 or 2006-01-02T15:04:05
        if let Some((date, rest)) = parse_iso_date(token) {
            year = Some(date.0);
            month = Some(date.1);
            day = Some(date.2);
            if let Some(rest) = rest {
                let (time_part, zone_part) = split_time_zone(rest);
                time = parse_time(time_part);
                if let Some(zone) = zone_part {
                    offset = parse_zone(zone);
                }
            }
            continue;
        }

        if let Some(m) = month_from_name(token) {
            month = Some(m);
            continue;
        }
        if is_weekday(token) {
            continue;
        }
        if token.contains(':') && time.is_none() {
            let (time_part, zone_part) = split_time_zone(token);
            time = parse_time(time_part);
            if let Some(zone) = zone_part {
                offset = parse_zone(zone);
            }
            continue;
        }
        if let Some(zone) = parse_zone(token) {
            offset = Some(zone);
            continue;
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            let n: i32 = token.parse().ok()?;
            if token.len() >= 3 {
                year = Some(n);
            } else if day.is_none() && (1..=31).contains(&n) {
                day = u32::try_from(n).ok();
            } else if year.is_none() {
                year = Some(expand_two_digit_year(n));
            }
        }
    }

    let date = NaiveDate::from_ymd_opt(year?, month?, day?)?;
    let time = time.unwrap_or(NaiveTime::MIN);
    Some(ParsedDate {
        local: date.and_time(time),
        offset,
        source: DateSource::Loose,
    })
}

/// Two-digit years: 69..=99 are 19xx, everything else 20xx.
const fn expand_two_digit_year(yy: i32) -> i32 {
    if yy > 68 { 1900 + yy } else { 2000 + yy }
}

fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    for ch in value.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

fn month_from_name(token: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = token.trim_end_matches('.').to_ascii_lowercase();
    if lower.len() < 3 || !lower.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .and_then(|i| u32::try_from(i + 1).ok())
}

fn is_weekday(token: &str) -> bool {
    const DAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
    let lower = token.trim_end_matches('.').to_ascii_lowercase();
    lower.len() >= 3 && DAYS.iter().any(|d| lower.starts_with(d))
}

/// Splits `15:04:05+0600` / `15:04:05Z` into time and zone parts.
fn split_time_zone(token: &str) -> (&str, Option<&str>) {
    token
        .find(['+', '-', 'Z', 'z'])
        .map_or((token, None), |i| (&token[..i], Some(&token[i..])))
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    let mut fields = token.split(':');
    let hour: u32 = fields.next()?.parse().ok()?;
    let minute: u32 = fields.next()?.parse().ok()?;
    let second: u32 = fields
        .next()
        .map_or(Some(0), |s| s.split('.').next().and_then(|s| s.parse().ok()))?;
    // Leap second 60 is clamped
    NaiveTime::from_hms_opt(hour, minute, second.min(59))
}

fn parse_zone(token: &str) -> Option<FixedOffset> {
    let hours = match token.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => Some(0),
        "EDT" => Some(-4),
        "EST" | "CDT" => Some(-5),
        "CST" | "MDT" => Some(-6),
        "MST" | "PDT" => Some(-7),
        "PST" => Some(-8),
        _ => None,
    };
    if let Some(hours) = hours {
        return FixedOffset::east_opt(hours * 3600);
    }

    let sign = match token.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = token[1..].chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hh: i32 = digits[..2].parse().ok()?;
    let mm: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hh * 3600 + mm * 60))
}

/// Parses `YYYY-MM-DD` with an optional `T...` time suffix.
fn parse_iso_date(token: &str) -> Option<((i32, u32, u32), Option<&str>)> {
    let (date, rest) = match token.find(['T', 't']) {
        Some(i) => (&token[..i], Some(&token[i + 1..])),
        None => (token, None),
    };
    let mut fields = date.split('-');
    let year = fields.next()?;
    if year.len() != 4 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = fields.next()?.parse().ok()?;
    let day: u32 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(((year, month, day), rest))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_rfc5322_with_offset() {
        let parsed = parse_date("Mon, 02 Jan 2006 15:04:05 -0600").unwrap();
        assert_eq!(parsed.source, DateSource::Rfc5322);
        assert_eq!(parsed.offset, FixedOffset::west_opt(6 * 3600));
        assert_eq!(parsed.local.hour(), 15);
        assert_eq!(parsed.to_utc().hour(), 21);
    }

    #[test]
    fn test_missing_zone_falls_back_to_loose() {
        let parsed = parse_date("02 Jan 2006 15:04:05").unwrap();
        assert_eq!(parsed.source, DateSource::Loose);
        assert_eq!(parsed.offset, None);
        assert_eq!(parsed.to_utc().hour(), 15);
    }

    #[test]
    fn test_loose_with_comment_and_named_zone() {
        let parsed = parse_loose("Tue, 3 Jan 2006 10:00:00 (Central) CST").unwrap();
        assert_eq!(parsed.offset, FixedOffset::west_opt(6 * 3600));
        assert_eq!(parsed.local.day(), 3);
    }

    #[test]
    fn test_loose_two_digit_year_and_month_first() {
        let parsed = parse_loose("Jan 2 06 3:04").unwrap();
        assert_eq!(parsed.local.year(), 2006);
        assert_eq!(parsed.local.day(), 2);
        assert_eq!(parsed.local.hour(), 3);
        assert_eq!(parsed.local.second(), 0);

        let parsed = parse_loose("2 Jan 99 00:00:00").unwrap();
        assert_eq!(parsed.local.year(), 1999);
    }

    #[test]
    fn test_loose_iso_like() {
        let parsed = parse_loose("2006-01-02T15:04:05+01:00").unwrap();
        assert_eq!(parsed.offset, FixedOffset::east_opt(3600));
        assert_eq!(parsed.to_utc().hour(), 14);

        let parsed = parse_loose("2006-01-02 15:04:05").unwrap();
        assert_eq!(parsed.offset, None);
        assert_eq!(parsed.local.minute(), 4);
    }

    #[test]
    fn test_date_without_time_is_midnight() {
        let parsed = parse_loose("2 Jan 2006").unwrap();
        assert_eq!(parsed.local.hour(), 0);
    }

    #[test]
    fn test_unparseable() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date at all").is_none());
        assert!(parse_date("31 Feb 2006 10:00").is_none());
        assert!(parse_date("yesterday 10:00").is_none());
    }
}
