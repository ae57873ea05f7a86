//! Time utilities for XMLTV timestamps and display timezones
//!
//! XMLTV times are a run of digits, `YYYYMMDD` optionally extended with hour,
//! minute and second, optionally followed by whitespace and a `+HHMM`/`-HHMM`
//! offset. Anything else is treated as "no timestamp", never as an error.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const NAIVE_DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn xmltv_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<stamp>[0-9]{8}(?:[0-9]{2}(?:[0-9]{2}(?:[0-9]{2})?)?)?)(?:\s+(?P<tz>[+-][0-9]{4}))?$")
            .expect("XMLTV timestamp regex is valid")
    })
}

/// How many digits of an XMLTV token were present
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precision {
    Day,
    Hour,
    Minute,
    Second,
}

impl Precision {
    /// Map a digit count to a precision; only 8, 10, 12 and 14 are valid
    pub fn from_digit_count(digits: usize) -> Option<Self> {
        match digits {
            8 => Some(Self::Day),
            10 => Some(Self::Hour),
            12 => Some(Self::Minute),
            14 => Some(Self::Second),
            _ => None,
        }
    }

    pub fn digit_count(self) -> usize {
        match self {
            Self::Day => 8,
            Self::Hour => 10,
            Self::Minute => 12,
            Self::Second => 14,
        }
    }

    fn format_str(self) -> &'static str {
        match self {
            Self::Day => "%Y%m%d",
            Self::Hour => "%Y%m%d%H",
            Self::Minute => "%Y%m%d%H%M",
            Self::Second => "%Y%m%d%H%M%S",
        }
    }
}

/// A normalized XMLTV timestamp
///
/// `Floating` values carry no offset in the source and are never assigned one
/// here; `Anchored` values keep the fixed offset written in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmltvTimestamp {
    Floating(NaiveDateTime),
    Anchored(DateTime<FixedOffset>),
}

impl XmltvTimestamp {
    /// Parse a raw XMLTV token, returning `None` for anything malformed
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = xmltv_time_regex().captures(raw.trim())?;
        let stamp = caps.name("stamp")?.as_str();
        Precision::from_digit_count(stamp.len())?;

        let local = parse_digit_run(stamp)?;
        match caps.name("tz") {
            Some(tz) => {
                let offset = parse_offset(tz.as_str())?;
                offset
                    .from_local_datetime(&local)
                    .single()
                    .map(Self::Anchored)
            }
            None => Some(Self::Floating(local)),
        }
    }

    /// Wall-clock time as written in the token
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            Self::Floating(naive) => *naive,
            Self::Anchored(dt) => dt.naive_local(),
        }
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            Self::Floating(_) => None,
            Self::Anchored(dt) => Some(*dt.offset()),
        }
    }

    /// Absolute instant; floating times are read as UTC
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Self::Floating(naive) => Utc.from_utc_datetime(naive),
            Self::Anchored(dt) => dt.with_timezone(&Utc),
        }
    }

    /// Render back to an XMLTV token at the given precision
    pub fn to_xmltv(&self, precision: Precision) -> String {
        let digits = self.naive_local().format(precision.format_str()).to_string();
        match self {
            Self::Floating(_) => digits,
            Self::Anchored(dt) => format!("{} {}", digits, dt.format("%z")),
        }
    }
}

impl fmt::Display for XmltvTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Floating(naive) => write!(f, "{}", naive.format(NAIVE_DISPLAY_FORMAT)),
            Self::Anchored(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl FromStr for XmltvTimestamp {
    type Err = chrono::ParseError;

    /// Parse the serialized form produced by `Display`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Ok(Self::Anchored(dt)),
            Err(_) => NaiveDateTime::parse_from_str(s, NAIVE_DISPLAY_FORMAT).map(Self::Floating),
        }
    }
}

impl Serialize for XmltvTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for XmltvTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalize an optional raw token; absent, empty and malformed all map to `None`
pub fn normalize_timestamp(raw: Option<&str>) -> Option<XmltvTimestamp> {
    match raw {
        Some(value) if !value.is_empty() => XmltvTimestamp::parse(value),
        _ => None,
    }
}

fn parse_digit_run(stamp: &str) -> Option<NaiveDateTime> {
    let field = |range: std::ops::Range<usize>| -> Option<u32> {
        match stamp.get(range) {
            Some(digits) => digits.parse().ok(),
            None => Some(0),
        }
    };

    let year: i32 = stamp.get(0..4)?.parse().ok()?;
    if year < 1 {
        return None;
    }
    let month = field(4..6)?;
    let day = field(6..8)?;
    let hour = field(8..10)?;
    let minute = field(10..12)?;
    let second = field(12..14)?;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Parse `+HHMM` / `-HHMM` into a fixed offset
fn parse_offset(tz: &str) -> Option<FixedOffset> {
    let sign = match tz.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = tz.get(1..3)?.parse().ok()?;
    let minutes: i32 = tz.get(3..5)?.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse and validate a named display timezone such as `America/New_York`
pub fn parse_display_timezone(tz_str: &str) -> Result<Tz, String> {
    tz_str.parse::<Tz>().map_err(|_| {
        format!("Invalid timezone: '{tz_str}'. Use a named timezone (e.g., 'America/New_York')")
    })
}

/// Convert an instant into the display timezone, keeping a serializable offset
pub fn to_display_time(utc: DateTime<Utc>, tz: &Tz) -> DateTime<FixedOffset> {
    let local = utc.with_timezone(tz);
    local.with_timezone(&local.offset().fix())
}
