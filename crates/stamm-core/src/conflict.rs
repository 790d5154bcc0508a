//! Data-quality conflicts and their resolutions.
//!
//! A conflict is created by the validator and never rewritten afterwards
//! except for its resolution fields.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, event::EventId, person::PersonId};

pub type ConflictId = i64;

// ─── Vocabularies ────────────────────────────────────────────────────────────

/// The rule that produced a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
  DeathBeforeBirth,
  MultipleDeaths,
  EventAfterDeath,
  MarriageWithoutDivorce,
  ImpossibleDate,
  FutureDate,
  NegativeAge,
  DuplicateEvent,
}

impl ConflictType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::DeathBeforeBirth => "death_before_birth",
      Self::MultipleDeaths => "multiple_deaths",
      Self::EventAfterDeath => "event_after_death",
      Self::MarriageWithoutDivorce => "marriage_without_divorce",
      Self::ImpossibleDate => "impossible_date",
      Self::FutureDate => "future_date",
      Self::NegativeAge => "negative_age",
      Self::DuplicateEvent => "duplicate_event",
    }
  }

  /// The fixed severity each rule reports at.
  pub fn severity(self) -> Severity {
    match self {
      Self::DeathBeforeBirth
      | Self::MultipleDeaths
      | Self::ImpossibleDate
      | Self::NegativeAge => Severity::Error,
      Self::EventAfterDeath | Self::MarriageWithoutDivorce | Self::FutureDate => {
        Severity::Warning
      }
      Self::DuplicateEvent => Severity::Info,
    }
  }
}

/// Ordered most severe first, so sorting a list of conflicts by severity
/// puts errors at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Error,
  Warning,
  Info,
}

impl Severity {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Error => "error",
      Self::Warning => "warning",
      Self::Info => "info",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
  Confirmed,
  Rejected,
  NeedsReview,
  AutoFixed,
}

impl Resolution {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Confirmed => "confirmed",
      Self::Rejected => "rejected",
      Self::NeedsReview => "needs_review",
      Self::AutoFixed => "auto_fixed",
    }
  }
}

macro_rules! str_enum {
  ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
    }

    impl FromStr for $ty {
      type Err = Error;

      fn from_str(s: &str) -> Result<Self> {
        [$($variant),+]
          .into_iter()
          .find(|v: &$ty| v.as_str() == s)
          .ok_or_else(|| Error::UnknownVariant { kind: $kind, value: s.to_string() })
      }
    }
  };
}

str_enum!(ConflictType, "conflict type", [
  ConflictType::DeathBeforeBirth,
  ConflictType::MultipleDeaths,
  ConflictType::EventAfterDeath,
  ConflictType::MarriageWithoutDivorce,
  ConflictType::ImpossibleDate,
  ConflictType::FutureDate,
  ConflictType::NegativeAge,
  ConflictType::DuplicateEvent,
]);
str_enum!(Severity, "severity", [Severity::Error, Severity::Warning, Severity::Info]);
str_enum!(Resolution, "resolution", [
  Resolution::Confirmed,
  Resolution::Rejected,
  Resolution::NeedsReview,
  Resolution::AutoFixed,
]);

// ─── Records ─────────────────────────────────────────────────────────────────

/// A conflict as emitted by the validator, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConflict {
  pub person_id:        PersonId,
  /// The event that triggered the rule.
  pub event_id:         Option<EventId>,
  /// A second event involved, e.g. the birth a death precedes.
  pub related_event_id: Option<EventId>,
  pub conflict_type:    ConflictType,
  pub severity:         Severity,
  pub description:      String,
}

impl NewConflict {
  pub fn new(
    person_id: PersonId,
    conflict_type: ConflictType,
    event_id: Option<EventId>,
    related_event_id: Option<EventId>,
    description: impl Into<String>,
  ) -> Self {
    Self {
      person_id,
      event_id,
      related_event_id,
      conflict_type,
      severity: conflict_type.severity(),
      description: description.into(),
    }
  }
}

/// A persisted conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
  pub id:               ConflictId,
  pub person_id:        PersonId,
  pub event_id:         Option<EventId>,
  pub related_event_id: Option<EventId>,
  pub conflict_type:    ConflictType,
  pub severity:         Severity,
  pub description:      String,
  pub resolution:       Option<Resolution>,
  pub resolved_at:      Option<DateTime<Utc>>,
  /// Name of the decision source that produced the resolution.
  pub resolved_by:      Option<String>,
  pub notes:            Option<String>,
  pub created_at:       DateTime<Utc>,
}

impl Conflict {
  pub fn is_resolved(&self) -> bool { self.resolution.is_some() }
}

/// Filter for listing conflicts. Results are ordered by severity (errors
/// first), then id.
#[derive(Debug, Clone, Default)]
pub struct ConflictQuery {
  pub person_id:       Option<PersonId>,
  pub severity:        Option<Severity>,
  pub unresolved_only: bool,
  pub limit:           Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn severities_follow_the_rule_table() {
    assert_eq!(ConflictType::DeathBeforeBirth.severity(), Severity::Error);
    assert_eq!(ConflictType::EventAfterDeath.severity(), Severity::Warning);
    assert_eq!(ConflictType::FutureDate.severity(), Severity::Warning);
    assert_eq!(ConflictType::NegativeAge.severity(), Severity::Error);
    assert_eq!(ConflictType::DuplicateEvent.severity(), Severity::Info);
  }

  #[test]
  fn severity_orders_errors_first() {
    let mut s = vec![Severity::Info, Severity::Error, Severity::Warning];
    s.sort();
    assert_eq!(s, [Severity::Error, Severity::Warning, Severity::Info]);
  }

  #[test]
  fn string_forms_parse_back() {
    assert_eq!(
      "marriage_without_divorce".parse::<ConflictType>().unwrap(),
      ConflictType::MarriageWithoutDivorce
    );
    assert_eq!("auto_fixed".parse::<Resolution>().unwrap(), Resolution::AutoFixed);
    assert!("catastrophic".parse::<Severity>().is_err());
  }
}
