//! Input and output types for a bulk load.
//!
//! A [`LoadBatch`] is fully normalised: dates and places have already been
//! split, and every cross-reference is still the external xref string. The
//! store resolves xrefs to row ids while writing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  date::NormalizedDate,
  event::EventKind,
  location::PlaceParts,
  person::{ChildRelationship, Sex},
};

/// Everything parsed from one source, ready to be written in a single
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct LoadBatch {
  /// File name or other label for the source.
  pub source_name:   String,
  /// Hex SHA-256 of the source bytes.
  pub source_digest: String,
  pub persons:       Vec<NewPerson>,
  pub families:      Vec<NewFamily>,
  /// Clear existing genealogical data before writing.
  pub replace:       bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewPerson {
  pub xref:        String,
  pub given_name:  Option<String>,
  pub family_name: Option<String>,
  pub maiden_name: Option<String>,
  pub sex:         Sex,
  pub events:      Vec<NewEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct NewFamily {
  pub xref:         String,
  pub spouse1_xref: Option<String>,
  pub spouse2_xref: Option<String>,
  pub children:     Vec<NewFamilyChild>,
  /// Written once per resolvable spouse.
  pub events:       Vec<NewEvent>,
}

#[derive(Debug, Clone)]
pub struct NewFamilyChild {
  pub child_xref:   String,
  pub relationship: ChildRelationship,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
  pub kind:        EventKind,
  pub date:        NormalizedDate,
  pub place:       Option<PlaceParts>,
  pub description: Option<String>,
}

/// A cross-reference that named no individual in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRef {
  pub family_xref: String,
  pub target_xref: String,
  pub role:        RefRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefRole {
  Spouse,
  Child,
}

/// What a committed load wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
  pub run_id:                Uuid,
  pub persons:               usize,
  pub families:              usize,
  pub family_children:       usize,
  pub events:                usize,
  /// Distinct location rows created by this load.
  pub locations_created:     usize,
  /// Family events skipped because the family had no resolvable spouse.
  pub dropped_family_events: usize,
  pub unresolved_refs:       Vec<UnresolvedRef>,
}
