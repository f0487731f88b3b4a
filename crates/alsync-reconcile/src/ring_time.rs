//! ISO-8601 ring time -> absolute epoch seconds.
//!
//! Accepted shapes:
//! - RFC 3339 with `Z` or `±hh:mm` offset
//! - offset without colon (`+0100`)
//! - `T`, `t` or a space between date and time
//! - optional fractional seconds (truncated)
//! - no offset at all, resolved in the [`FallbackZone`]
//!
//! A local time that falls in a DST gap is rejected; an ambiguous local time
//! resolves to the earliest instant.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Zone used for ring times that carry no UTC offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackZone {
    /// The system local zone.
    #[default]
    Local,
    /// A fixed IANA zone.
    Named(Tz),
}

impl FallbackZone {
    /// Resolve an IANA zone name such as `Europe/Paris`.
    pub fn from_name(name: &str) -> Result<Self, RingTimeError> {
        name.trim()
            .parse::<Tz>()
            .map(FallbackZone::Named)
            .map_err(|_| RingTimeError::UnknownZone {
                name: name.to_string(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RingTimeError {
    Empty,
    Unparseable { raw: String },
    /// Local time skipped by a DST transition in the fallback zone.
    NonexistentLocalTime { raw: String },
    UnknownZone { name: String },
}

impl std::fmt::Display for RingTimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingTimeError::Empty => write!(f, "ring time is empty"),
            RingTimeError::Unparseable { raw } => {
                write!(f, "ring time '{raw}' is not an ISO-8601 timestamp")
            }
            RingTimeError::NonexistentLocalTime { raw } => {
                write!(f, "ring time '{raw}' does not exist in the fallback zone")
            }
            RingTimeError::UnknownZone { name } => write!(f, "unknown time zone '{name}'"),
        }
    }
}

impl std::error::Error for RingTimeError {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RingTimeParser {
    fallback: FallbackZone,
}

impl RingTimeParser {
    pub fn new(fallback: FallbackZone) -> Self {
        Self { fallback }
    }

    /// Parser that resolves offset-less times as UTC.
    pub fn utc() -> Self {
        Self::new(FallbackZone::Named(Tz::UTC))
    }

    pub fn fallback(&self) -> FallbackZone {
        self.fallback
    }

    pub fn parse_epoch_seconds(&self, raw: &str) -> Result<i64, RingTimeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RingTimeError::Empty);
        }
        let s = normalize_separator(trimmed);

        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return Ok(dt.timestamp());
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
                return Ok(dt.timestamp());
            }
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&s, fmt) {
                return self.resolve_naive(&naive, raw);
            }
        }

        Err(RingTimeError::Unparseable {
            raw: raw.to_string(),
        })
    }

    fn resolve_naive(&self, naive: &NaiveDateTime, raw: &str) -> Result<i64, RingTimeError> {
        let resolved = match self.fallback {
            FallbackZone::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.timestamp()),
            FallbackZone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.timestamp()),
        };
        resolved.ok_or_else(|| RingTimeError::NonexistentLocalTime {
            raw: raw.to_string(),
        })
    }
}

/// Rewrite a `t` or space date/time separator to `T`.
fn normalize_separator(s: &str) -> String {
    let b = s.as_bytes();
    if b.len() > 10 && (b[10] == b' ' || b[10] == b't') {
        format!("{}T{}", &s[..10], &s[11..])
    } else {
        s.to_string()
    }
}
