//! Life events and the fixed event-type vocabulary.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  date::NormalizedDate,
  location::LocationId,
  person::{FamilyId, PersonId},
};

pub type EventId = i64;

// ─── Vocabulary ──────────────────────────────────────────────────────────────

/// The reference vocabulary of event types.
///
/// Codes are the GEDCOM tags and are stable; they are what the `event_type`
/// table is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  Birth,
  Death,
  Marriage,
  Divorce,
  Immigration,
  Emigration,
  Burial,
  Census,
  Residence,
  Naturalization,
  Occupation,
  Baptism,
  Christening,
  Probate,
  Will,
  Graduation,
  Retirement,
  Other,
}

impl EventKind {
  pub const ALL: [EventKind; 18] = [
    Self::Birth,
    Self::Death,
    Self::Marriage,
    Self::Divorce,
    Self::Immigration,
    Self::Emigration,
    Self::Burial,
    Self::Census,
    Self::Residence,
    Self::Naturalization,
    Self::Occupation,
    Self::Baptism,
    Self::Christening,
    Self::Probate,
    Self::Will,
    Self::Graduation,
    Self::Retirement,
    Self::Other,
  ];

  pub fn code(self) -> &'static str {
    match self {
      Self::Birth => "BIRT",
      Self::Death => "DEAT",
      Self::Marriage => "MARR",
      Self::Divorce => "DIV",
      Self::Immigration => "IMMI",
      Self::Emigration => "EMIG",
      Self::Burial => "BURI",
      Self::Census => "CENS",
      Self::Residence => "RESI",
      Self::Naturalization => "NATU",
      Self::Occupation => "OCCU",
      Self::Baptism => "BAPM",
      Self::Christening => "CHR",
      Self::Probate => "PROB",
      Self::Will => "WILL",
      Self::Graduation => "GRAD",
      Self::Retirement => "RETI",
      Self::Other => "EVEN",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Birth => "Birth",
      Self::Death => "Death",
      Self::Marriage => "Marriage",
      Self::Divorce => "Divorce",
      Self::Immigration => "Immigration",
      Self::Emigration => "Emigration",
      Self::Burial => "Burial",
      Self::Census => "Census",
      Self::Residence => "Residence",
      Self::Naturalization => "Naturalization",
      Self::Occupation => "Occupation",
      Self::Baptism => "Baptism",
      Self::Christening => "Christening",
      Self::Probate => "Probate",
      Self::Will => "Will",
      Self::Graduation => "Graduation",
      Self::Retirement => "Retirement",
      Self::Other => "Other Event",
    }
  }

  /// Display order; `Other` always sorts last.
  pub fn sort_order(self) -> i64 {
    match self {
      Self::Other => 99,
      kind => Self::ALL.iter().position(|k| *k == kind).map_or(99, |i| i as i64 + 1),
    }
  }

  pub fn from_code(code: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|k| k.code() == code)
      .ok_or_else(|| Error::UnknownEventType(code.to_string()))
  }

  /// Whether the event belongs to a couple rather than an individual.
  pub fn is_family_event(self) -> bool { matches!(self, Self::Marriage | Self::Divorce) }
}

/// A row of the seeded `event_type` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
  pub id:         i64,
  pub kind:       EventKind,
  pub code:       String,
  pub label:      String,
  pub sort_order: i64,
}

// ─── Validation status ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
  Valid,
  Conflict,
  NeedsReview,
  #[default]
  Unvalidated,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A persisted event. Belongs to exactly one person; marriage-class events
/// also point at the family they describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub id:                EventId,
  pub person_id:         PersonId,
  pub family_id:         Option<FamilyId>,
  pub kind:              EventKind,
  pub location_id:       Option<LocationId>,
  pub date:              NormalizedDate,
  pub validation_status: ValidationStatus,
  pub description:       Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_round_trip() {
    for kind in EventKind::ALL {
      assert_eq!(EventKind::from_code(kind.code()).unwrap(), kind);
    }
  }

  #[test]
  fn sort_order_matches_vocabulary() {
    assert_eq!(EventKind::Birth.sort_order(), 1);
    assert_eq!(EventKind::Death.sort_order(), 2);
    assert_eq!(EventKind::Retirement.sort_order(), 17);
    assert_eq!(EventKind::Other.sort_order(), 99);
  }

  #[test]
  fn unknown_code_is_an_error() {
    assert!(matches!(
      EventKind::from_code("XYZZY"),
      Err(Error::UnknownEventType(code)) if code == "XYZZY"
    ));
  }
}
