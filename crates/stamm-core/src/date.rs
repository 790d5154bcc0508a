//! Normalised date representation.
//!
//! Genealogical dates are frequently partial or qualified ("ABT 1842",
//! "BEF MAR 1900"). Every event carries the raw text together with the
//! earliest plausible calendar date (used for ordering), an optional end of
//! range, and a [`DatePrecision`] telling consumers how much of the date is
//! actually known.

use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Calendar date ───────────────────────────────────────────────────────────

/// A year/month/day triple as written in the source.
///
/// Unlike [`NaiveDate`] this may hold a day that does not exist (31 February),
/// which is exactly what the `impossible_date` rule needs to see. Ordering is
/// lexicographic on `(year, month, day)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarDate {
  pub year:  i32,
  pub month: u32,
  pub day:   u32,
}

impl CalendarDate {
  pub fn new(year: i32, month: u32, day: u32) -> Self { Self { year, month, day } }

  /// Whether the triple names a day that exists in the proleptic Gregorian
  /// calendar.
  pub fn is_valid(&self) -> bool { self.to_naive().is_some() }

  pub fn to_naive(&self) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(self.year, self.month, self.day)
  }

  /// Whole years elapsed from `self` to `later`. Mirrored (and negated)
  /// when `later` precedes `self`.
  pub fn years_until(&self, later: &CalendarDate) -> i32 {
    if later < self {
      return -later.years_until(self);
    }
    let mut years = later.year - self.year;
    if (later.month, later.day) < (self.month, self.day) {
      years -= 1;
    }
    years
  }
}

impl From<NaiveDate> for CalendarDate {
  fn from(d: NaiveDate) -> Self { Self::new(d.year(), d.month(), d.day()) }
}

impl PartialOrd for CalendarDate {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for CalendarDate {
  fn cmp(&self, other: &Self) -> Ordering {
    (self.year, self.month, self.day).cmp(&(other.year, other.month, other.day))
  }
}

impl fmt::Display for CalendarDate {
  /// ISO 8601 `YYYY-MM-DD`, zero padded.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
  }
}

impl FromStr for CalendarDate {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidCalendarDate(s.to_string());
    let mut parts = s.splitn(3, '-');
    let year = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let month = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let day = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    Ok(Self::new(year, month, day))
  }
}

// ─── Precision ───────────────────────────────────────────────────────────────

/// How much of a normalised date is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
  /// Day, month and year given.
  Exact,
  /// Month and year; the day used for sorting is a placeholder.
  Month,
  /// Year only.
  Year,
  /// Qualified with ABT / EST / CAL.
  Estimated,
  /// "BEF X": the event happened before the sort date.
  Before,
  /// "AFT X": the event happened after the sort date.
  After,
  /// "BET X AND Y" / "FROM X TO Y": both ends populated.
  Range,
  #[default]
  Unknown,
}

// ─── Normalised date ─────────────────────────────────────────────────────────

/// The four-part date representation stored on every event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedDate {
  /// The date text exactly as it appeared in the source.
  pub raw:       Option<String>,
  /// Earliest plausible date implied by `raw`; used for all ordering.
  pub sort:      Option<CalendarDate>,
  /// End of range, only for [`DatePrecision::Range`].
  pub end:       Option<CalendarDate>,
  pub precision: DatePrecision,
}

impl NormalizedDate {
  /// A date with no usable information.
  pub fn unknown(raw: Option<String>) -> Self {
    Self { raw, sort: None, end: None, precision: DatePrecision::Unknown }
  }
}
