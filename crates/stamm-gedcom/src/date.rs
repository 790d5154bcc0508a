//! GEDCOM date phrases → [`NormalizedDate`].
//!
//! Never fails: anything not understood becomes [`DatePrecision::Unknown`]
//! with no sort date. Days are taken as written, so `30 FEB 1900` survives
//! as an impossible calendar date for the validator to flag.

use stamm_core::date::{CalendarDate, DatePrecision, NormalizedDate};

const MONTHS: [(&str, u32); 24] = [
  ("JAN", 1),
  ("FEB", 2),
  ("MAR", 3),
  ("APR", 4),
  ("MAY", 5),
  ("JUN", 6),
  ("JUL", 7),
  ("AUG", 8),
  ("SEP", 9),
  ("OCT", 10),
  ("NOV", 11),
  ("DEC", 12),
  ("JANUARY", 1),
  ("FEBRUARY", 2),
  ("MARCH", 3),
  ("APRIL", 4),
  ("JUNE", 6),
  ("JULY", 7),
  ("AUGUST", 8),
  ("SEPTEMBER", 9),
  ("SEPT", 9),
  ("OCTOBER", 10),
  ("NOVEMBER", 11),
  ("DECEMBER", 12),
];

fn digits(s: &str, len: std::ops::RangeInclusive<usize>) -> bool {
  len.contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// `1776`, or dual-dated `1750/51` (the first year is kept).
fn year(tok: &str) -> Option<i32> {
  let (main, alt) = tok.split_once('/').unwrap_or((tok, ""));
  if !digits(main, 3..=4) || !(alt.is_empty() || digits(alt, 1..=4)) {
    return None;
  }
  main.parse().ok()
}

fn month(tok: &str) -> Option<u32> {
  let tok = tok.trim_end_matches('.');
  MONTHS.iter().find(|(name, _)| *name == tok).map(|(_, m)| *m)
}

fn day(tok: &str) -> Option<u32> {
  if digits(tok, 1..=2) { tok.parse().ok() } else { None }
}

/// `YYYY-MM-DD` or `YYYY-MM`.
fn iso(s: &str) -> Option<(CalendarDate, DatePrecision)> {
  let parts: Vec<&str> = s.split('-').collect();
  match parts[..] {
    [y, m, d] if digits(y, 4..=4) && digits(m, 2..=2) && digits(d, 2..=2) => Some((
      CalendarDate::new(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?),
      DatePrecision::Exact,
    )),
    [y, m] if digits(y, 4..=4) && digits(m, 2..=2) => {
      Some((CalendarDate::new(y.parse().ok()?, m.parse().ok()?, 1), DatePrecision::Month))
    }
    _ => None,
  }
}

/// `[day] [month] year`, with the earliest date it could mean.
fn core(s: &str) -> Option<(CalendarDate, DatePrecision)> {
  let s = s.trim();
  if let Some(found) = iso(s) {
    return Some(found);
  }
  let tokens: Vec<&str> = s.split_whitespace().collect();
  match tokens[..] {
    [y] => Some((CalendarDate::new(year(y)?, 1, 1), DatePrecision::Year)),
    [m, y] => Some((CalendarDate::new(year(y)?, month(m)?, 1), DatePrecision::Month)),
    [d, m, y] => Some((CalendarDate::new(year(y)?, month(m)?, day(d)?), DatePrecision::Exact)),
    _ => None,
  }
}

type Parsed = (CalendarDate, Option<CalendarDate>, DatePrecision);

fn range(rest: &str, separator: &str) -> Option<Parsed> {
  let (start, end) = rest.split_once(separator)?;
  let (a, b) = (core(start)?.0, core(end)?.0);
  Some((a.min(b), Some(a.max(b)), DatePrecision::Range))
}

fn qualified(rest: &str, precision: DatePrecision) -> Option<Parsed> {
  Some((core(rest)?.0, None, precision))
}

/// Drop a trailing `(date phrase)`, as in `INT 1900 (about then)`.
fn strip_phrase(s: &str) -> &str {
  match s.find('(') {
    Some(i) if s.trim_end().ends_with(')') => s[..i].trim_end(),
    _ => s,
  }
}

/// Normalise a raw date expression.
pub fn normalize_date(raw: &str) -> NormalizedDate {
  let text = raw.trim();
  if text.is_empty() {
    return NormalizedDate::unknown(None);
  }

  let upper = strip_phrase(text).to_ascii_uppercase();
  let (head, rest) = upper.split_once(char::is_whitespace).unwrap_or((upper.as_str(), ""));
  let rest = rest.trim();

  let parsed = match head {
    "BET" | "BETWEEN" => range(rest, " AND "),
    "FROM" if rest.contains(" TO ") => range(rest, " TO "),
    "FROM" | "AFT" | "AFTER" => qualified(rest, DatePrecision::After),
    "TO" | "BEF" | "BEFORE" => qualified(rest, DatePrecision::Before),
    "ABT" | "ABOUT" | "EST" | "CAL" | "CIRCA" | "CA" | "CA." | "C." | "INT" => {
      qualified(rest, DatePrecision::Estimated)
    }
    _ => core(&upper).map(|(date, precision)| (date, None, precision)),
  };

  match parsed {
    Some((sort, end, precision)) => {
      NormalizedDate { raw: Some(text.to_string()), sort: Some(sort), end, precision }
    }
    None => NormalizedDate::unknown(Some(text.to_string())),
  }
}
