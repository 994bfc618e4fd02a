//! Transit time handling.
//!
//! The data source reports instants as ISO 8601 strings carrying the agency's
//! local offset, and accepts time-of-day bounds as "HH:MM" strings on a
//! service date. Service dates run past midnight, so time-of-day values range
//! over 00:00-47:59 rather than wrapping at 24:00.

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::ops::{Add, Sub};

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// An offset-aware instant reported by the transit agency.
///
/// Equality and ordering compare the absolute instant, so a time reported as
/// `-04:00` and the same moment in UTC are equal. `Display` renders the local
/// "HH:MM" in the offset the record carried.
///
/// # Examples
///
/// ```
/// use connection_planner::domain::TransitTime;
///
/// let t = TransitTime::parse_iso("2024-03-15T17:05:00-04:00").unwrap();
/// assert_eq!(t.to_string(), "17:05");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TransitTime(DateTime<FixedOffset>);

impl TransitTime {
    /// Wrap any zoned `DateTime`.
    pub fn from_datetime<Z: TimeZone>(dt: DateTime<Z>) -> Self {
        Self(dt.fixed_offset())
    }

    /// Parse an RFC 3339 timestamp such as `2024-03-15T17:05:00-04:00`.
    pub fn parse_iso(s: &str) -> Result<Self, TimeError> {
        DateTime::parse_from_rfc3339(s)
            .map(Self)
            .map_err(|_| TimeError::new("expected RFC 3339 timestamp"))
    }

    /// Interpret a wall-clock reading in the given zone.
    ///
    /// Readings inside a DST gap do not exist and are rejected. Readings in
    /// the repeated hour resolve to the earlier instant.
    pub fn from_local(naive: NaiveDateTime, tz: Tz) -> Result<Self, TimeError> {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(Self::from_datetime(dt)),
            LocalResult::Ambiguous(earlier, _) => Ok(Self::from_datetime(earlier)),
            LocalResult::None => Err(TimeError::new("local time does not exist")),
        }
    }

    /// Returns the underlying instant.
    pub fn instant(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// Wall-clock reading of this instant in `tz`.
    pub fn local(&self, tz: Tz) -> NaiveDateTime {
        self.0.with_timezone(&tz).naive_local()
    }

    /// Add a duration, returning `None` on overflow.
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        self.0.checked_add_signed(duration).map(Self)
    }

    /// Subtract a duration, returning `None` on overflow.
    pub fn checked_sub(&self, duration: Duration) -> Option<Self> {
        self.0.checked_sub_signed(duration).map(Self)
    }

    /// Returns the duration between two times.
    ///
    /// Returns a negative duration if `other` is after `self`.
    pub fn signed_duration_since(&self, other: Self) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Whole minutes from `self` until `later`, rounded towards negative infinity.
    ///
    /// ```
    /// use connection_planner::domain::TransitTime;
    ///
    /// let a = TransitTime::parse_iso("2024-03-15T17:00:00-04:00").unwrap();
    /// let b = TransitTime::parse_iso("2024-03-15T17:05:59-04:00").unwrap();
    /// assert_eq!(a.minutes_until(b), 5);
    /// assert_eq!(b.minutes_until(a), -6);
    /// ```
    pub fn minutes_until(&self, later: Self) -> i64 {
        later.signed_duration_since(*self).num_seconds().div_euclid(60)
    }

    /// Format as RFC 3339, as used in wire-level group keys.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

/// Panics on overflow; see [`TransitTime::checked_add`].
impl Add<Duration> for TransitTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// Panics on overflow; see [`TransitTime::checked_sub`].
impl Sub<Duration> for TransitTime {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl fmt::Debug for TransitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransitTime({})", self.0.to_rfc3339())
    }
}

impl fmt::Display for TransitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

/// Latest time of day a service date can express.
const MAX_SERVICE_MINUTES: u16 = 47 * 60 + 59;

/// Minute-granular time of day on a service date, 00:00 through 47:59.
///
/// # Examples
///
/// ```
/// use connection_planner::domain::TimeOfDay;
///
/// let t = TimeOfDay::parse_hhmm("25:30").unwrap();
/// assert_eq!(t.minutes(), 25 * 60 + 30);
/// assert_eq!(t.to_string(), "25:30");
///
/// assert!(TimeOfDay::parse_hhmm("48:00").is_err());
/// assert!(TimeOfDay::parse_hhmm("7:30").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Midnight at the start of the service date.
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);

    /// The last minute of a calendar day.
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(23 * 60 + 59);

    /// Build from minutes past the service date's midnight.
    pub fn from_minutes(minutes: u16) -> Result<Self, TimeError> {
        if minutes > MAX_SERVICE_MINUTES {
            return Err(TimeError::new("time of day must be 00:00-47:59"));
        }
        Ok(Self(minutes))
    }

    /// Parse "HH:MM" with hours 00-47.
    pub fn parse_hhmm(s: &str) -> Result<Self, TimeError> {
        if s.len() != 5 {
            return Err(TimeError::new("expected HH:MM format"));
        }

        let bytes = s.as_bytes();

        if bytes[2] != b':' {
            return Err(TimeError::new("expected colon at position 2"));
        }

        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minute > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        Self::from_minutes((hour * 60 + minute) as u16)
    }

    /// The minute containing `time` (seconds are dropped).
    pub fn floor(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    /// The first whole minute at or after `time`, capped at 23:59.
    pub fn ceil_within_day(time: NaiveTime) -> Self {
        let floor = Self::floor(time);
        if time.second() == 0 && time.nanosecond() == 0 {
            floor
        } else {
            Self((floor.0 + 1).min(Self::END_OF_DAY.0))
        }
    }

    /// Minutes past the service date's midnight.
    pub fn minutes(&self) -> u16 {
        self.0
    }

    /// Shift by whole minutes, failing outside 00:00-47:59.
    pub fn shifted(&self, minutes: i32) -> Result<Self, TimeError> {
        let shifted = i32::from(self.0) + minutes;
        let shifted =
            u16::try_from(shifted).map_err(|_| TimeError::new("time of day before 00:00"))?;
        Self::from_minutes(shifted)
    }
}

impl fmt::Debug for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeOfDay({self})")
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

/// Parse a simulated "now" entered as a local `YYYY-MM-DDTHH:MM[:SS]` reading.
///
/// Parsing is strict: any other shape, including a trailing offset, is rejected.
///
/// ```
/// use connection_planner::domain::parse_override;
///
/// let tz = chrono_tz::America::New_York;
/// let t = parse_override("2024-03-15T17:00", tz).unwrap();
/// assert_eq!(t.to_string(), "17:00");
///
/// assert!(parse_override("2024-03-15 17:00", tz).is_err());
/// assert!(parse_override("2024-03-15T17:00Z", tz).is_err());
/// assert!(parse_override("tomorrow", tz).is_err());
/// ```
pub fn parse_override(input: &str, tz: Tz) -> Result<TransitTime, TimeError> {
    let trimmed = input.trim();
    let format = match trimmed.len() {
        16 => "%Y-%m-%dT%H:%M",
        19 => "%Y-%m-%dT%H:%M:%S",
        _ => return Err(TimeError::new("expected YYYY-MM-DDTHH:MM")),
    };
    let naive = NaiveDateTime::parse_from_str(trimmed, format)
        .map_err(|_| TimeError::new("expected YYYY-MM-DDTHH:MM"))?;
    TransitTime::from_local(naive, tz)
}
