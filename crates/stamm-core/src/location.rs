//! Places referenced by events.
//!
//! A location row exists once per distinct raw place string. Components and
//! coordinates are best-effort annotations on top of that key.

use serde::{Deserialize, Serialize};

pub type LocationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeStatus {
  #[default]
  Pending,
  Success,
  Failed,
  Skipped,
}

/// A place string split into positional components.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaceParts {
  /// The deduplication key: the raw place text as it appeared in the
  /// source. Two strings that differ only in case or spacing are distinct.
  pub raw_text:   String,
  /// Components re-joined with `", "`, or the raw text if none were found.
  pub normalized: String,
  pub city:       Option<String>,
  pub county:     Option<String>,
  pub state:      Option<String>,
  pub country:    Option<String>,
}

/// A persisted location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub id:             LocationId,
  pub parts:          PlaceParts,
  pub latitude:       Option<f64>,
  pub longitude:      Option<f64>,
  pub geocode_status: GeocodeStatus,
}

impl Location {
  /// Text to send to a geocoder: the normalised form when available.
  pub fn search_text(&self) -> &str {
    if self.parts.normalized.trim().is_empty() {
      &self.parts.raw_text
    } else {
      &self.parts.normalized
    }
  }
}

/// Latitude/longitude pair returned by a geocoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

/// The outcome of geocoding a single location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GeocodeOutcome {
  Success(Coordinates),
  Failed,
  Skipped,
}

impl GeocodeOutcome {
  pub fn status(&self) -> GeocodeStatus {
    match self {
      Self::Success(_) => GeocodeStatus::Success,
      Self::Failed => GeocodeStatus::Failed,
      Self::Skipped => GeocodeStatus::Skipped,
    }
  }
}

/// Result of merging duplicate locations into a target row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMerge {
  pub target:         Location,
  /// Number of source rows deleted.
  pub merged_count:   usize,
  /// Number of events re-pointed at the target.
  pub events_updated: usize,
}
