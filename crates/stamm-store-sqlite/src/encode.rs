//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD`, UUIDs
//! are hyphenated lowercase. Enumerations are stored as their lowercase
//! snake_case names. Rows are first read into `Raw*` structs inside the
//! connection closure and decoded afterwards, so decoding errors surface as
//! [`Error`] rather than as `rusqlite` errors.

use chrono::{DateTime, Utc};
use stamm_core::{
  conflict::Conflict,
  date::{CalendarDate, DatePrecision, NormalizedDate},
  event::{Event, EventKind, ValidationStatus},
  location::{GeocodeStatus, Location, PlaceParts},
  person::{ChildRelationship, Family, FamilyChild, Person, Sex},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── CalendarDate ────────────────────────────────────────────────────────────

pub fn encode_date(d: Option<CalendarDate>) -> Option<String> { d.map(|d| d.to_string()) }

pub fn decode_date(s: Option<String>) -> Result<Option<CalendarDate>> {
  Ok(s.map(|s| s.parse::<CalendarDate>()).transpose()?)
}

// ─── Sex ─────────────────────────────────────────────────────────────────────

pub fn encode_sex(s: Sex) -> &'static str {
  match s {
    Sex::Male => "male",
    Sex::Female => "female",
    Sex::Unknown => "unknown",
  }
}

pub fn decode_sex(s: &str) -> Result<Sex> {
  match s {
    "male" => Ok(Sex::Male),
    "female" => Ok(Sex::Female),
    "unknown" => Ok(Sex::Unknown),
    other => Err(Error::Decode(format!("unknown sex: {other:?}"))),
  }
}

// ─── ChildRelationship ───────────────────────────────────────────────────────

pub fn encode_relationship(r: ChildRelationship) -> &'static str {
  match r {
    ChildRelationship::Biological => "biological",
    ChildRelationship::Adopted => "adopted",
    ChildRelationship::Step => "step",
    ChildRelationship::Foster => "foster",
    ChildRelationship::Unknown => "unknown",
  }
}

pub fn decode_relationship(s: &str) -> Result<ChildRelationship> {
  match s {
    "biological" => Ok(ChildRelationship::Biological),
    "adopted" => Ok(ChildRelationship::Adopted),
    "step" => Ok(ChildRelationship::Step),
    "foster" => Ok(ChildRelationship::Foster),
    "unknown" => Ok(ChildRelationship::Unknown),
    other => Err(Error::Decode(format!("unknown child relationship: {other:?}"))),
  }
}

// ─── DatePrecision ───────────────────────────────────────────────────────────

pub fn encode_precision(p: DatePrecision) -> &'static str {
  match p {
    DatePrecision::Exact => "exact",
    DatePrecision::Month => "month",
    DatePrecision::Year => "year",
    DatePrecision::Estimated => "estimated",
    DatePrecision::Before => "before",
    DatePrecision::After => "after",
    DatePrecision::Range => "range",
    DatePrecision::Unknown => "unknown",
  }
}

pub fn decode_precision(s: &str) -> Result<DatePrecision> {
  match s {
    "exact" => Ok(DatePrecision::Exact),
    "month" => Ok(DatePrecision::Month),
    "year" => Ok(DatePrecision::Year),
    "estimated" => Ok(DatePrecision::Estimated),
    "before" => Ok(DatePrecision::Before),
    "after" => Ok(DatePrecision::After),
    "range" => Ok(DatePrecision::Range),
    "unknown" => Ok(DatePrecision::Unknown),
    other => Err(Error::Decode(format!("unknown date precision: {other:?}"))),
  }
}

// ─── ValidationStatus ────────────────────────────────────────────────────────

pub fn encode_validation(v: ValidationStatus) -> &'static str {
  match v {
    ValidationStatus::Valid => "valid",
    ValidationStatus::Conflict => "conflict",
    ValidationStatus::NeedsReview => "needs_review",
    ValidationStatus::Unvalidated => "unvalidated",
  }
}

pub fn decode_validation(s: &str) -> Result<ValidationStatus> {
  match s {
    "valid" => Ok(ValidationStatus::Valid),
    "conflict" => Ok(ValidationStatus::Conflict),
    "needs_review" => Ok(ValidationStatus::NeedsReview),
    "unvalidated" => Ok(ValidationStatus::Unvalidated),
    other => Err(Error::Decode(format!("unknown validation status: {other:?}"))),
  }
}

// ─── GeocodeStatus ───────────────────────────────────────────────────────────

pub fn encode_geocode_status(s: GeocodeStatus) -> &'static str {
  match s {
    GeocodeStatus::Pending => "pending",
    GeocodeStatus::Success => "success",
    GeocodeStatus::Failed => "failed",
    GeocodeStatus::Skipped => "skipped",
  }
}

pub fn decode_geocode_status(s: &str) -> Result<GeocodeStatus> {
  match s {
    "pending" => Ok(GeocodeStatus::Pending),
    "success" => Ok(GeocodeStatus::Success),
    "failed" => Ok(GeocodeStatus::Failed),
    "skipped" => Ok(GeocodeStatus::Skipped),
    other => Err(Error::Decode(format!("unknown geocode status: {other:?}"))),
  }
}

// ─── Raw row types ───────────────────────────────────────────────────────────

pub const PERSON_COLUMNS: &str =
  "id, xref, given_name, family_name, maiden_name, sex, needs_review, notes, biography";

/// A `person` row before enum decoding.
pub struct RawPerson {
  pub id:           i64,
  pub xref:         String,
  pub given_name:   Option<String>,
  pub family_name:  Option<String>,
  pub maiden_name:  Option<String>,
  pub sex:          String,
  pub needs_review: bool,
  pub notes:        Option<String>,
  pub biography:    Option<String>,
}

impl RawPerson {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      xref:         row.get(1)?,
      given_name:   row.get(2)?,
      family_name:  row.get(3)?,
      maiden_name:  row.get(4)?,
      sex:          row.get(5)?,
      needs_review: row.get(6)?,
      notes:        row.get(7)?,
      biography:    row.get(8)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      id:           self.id,
      xref:         self.xref,
      given_name:   self.given_name,
      family_name:  self.family_name,
      maiden_name:  self.maiden_name,
      sex:          decode_sex(&self.sex)?,
      needs_review: self.needs_review,
      notes:        self.notes,
      biography:    self.biography,
    })
  }
}

pub const FAMILY_COLUMNS: &str = "id, xref, spouse1_id, spouse2_id";

pub fn family_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Family> {
  Ok(Family {
    id:         row.get(0)?,
    xref:       row.get(1)?,
    spouse1_id: row.get(2)?,
    spouse2_id: row.get(3)?,
  })
}

/// A `family_child` row before enum decoding.
pub struct RawFamilyChild {
  pub family_id:    i64,
  pub child_id:     i64,
  pub relationship: String,
}

impl RawFamilyChild {
  pub fn into_family_child(self) -> Result<FamilyChild> {
    Ok(FamilyChild {
      family_id:    self.family_id,
      child_id:     self.child_id,
      relationship: decode_relationship(&self.relationship)?,
    })
  }
}

/// Event columns; the type code comes from the joined `event_type` row.
pub const EVENT_SELECT: &str = "
  SELECT e.id, e.person_id, e.family_id, t.code, e.location_id,
         e.date_raw, e.date_sort, e.date_end, e.date_precision,
         e.validation_status, e.description
  FROM event e
  JOIN event_type t ON t.id = e.event_type_id";

pub struct RawEvent {
  pub id:                i64,
  pub person_id:         i64,
  pub family_id:         Option<i64>,
  pub code:              String,
  pub location_id:       Option<i64>,
  pub date_raw:          Option<String>,
  pub date_sort:         Option<String>,
  pub date_end:          Option<String>,
  pub date_precision:    String,
  pub validation_status: String,
  pub description:       Option<String>,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      person_id:         row.get(1)?,
      family_id:         row.get(2)?,
      code:              row.get(3)?,
      location_id:       row.get(4)?,
      date_raw:          row.get(5)?,
      date_sort:         row.get(6)?,
      date_end:          row.get(7)?,
      date_precision:    row.get(8)?,
      validation_status: row.get(9)?,
      description:       row.get(10)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:                self.id,
      person_id:         self.person_id,
      family_id:         self.family_id,
      kind:              EventKind::from_code(&self.code)?,
      location_id:       self.location_id,
      date:              NormalizedDate {
        raw:       self.date_raw,
        sort:      decode_date(self.date_sort)?,
        end:       decode_date(self.date_end)?,
        precision: decode_precision(&self.date_precision)?,
      },
      validation_status: decode_validation(&self.validation_status)?,
      description:       self.description,
    })
  }
}

pub const CONFLICT_COLUMNS: &str = "id, person_id, event_id, related_event_id, conflict_type, \
  severity, description, resolution, resolved_at, resolved_by, notes, created_at";

pub struct RawConflict {
  pub id:               i64,
  pub person_id:        i64,
  pub event_id:         Option<i64>,
  pub related_event_id: Option<i64>,
  pub conflict_type:    String,
  pub severity:         String,
  pub description:      String,
  pub resolution:       Option<String>,
  pub resolved_at:      Option<String>,
  pub resolved_by:      Option<String>,
  pub notes:            Option<String>,
  pub created_at:       String,
}

impl RawConflict {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      person_id:        row.get(1)?,
      event_id:         row.get(2)?,
      related_event_id: row.get(3)?,
      conflict_type:    row.get(4)?,
      severity:         row.get(5)?,
      description:      row.get(6)?,
      resolution:       row.get(7)?,
      resolved_at:      row.get(8)?,
      resolved_by:      row.get(9)?,
      notes:            row.get(10)?,
      created_at:       row.get(11)?,
    })
  }

  pub fn into_conflict(self) -> Result<Conflict> {
    Ok(Conflict {
      id:               self.id,
      person_id:        self.person_id,
      event_id:         self.event_id,
      related_event_id: self.related_event_id,
      conflict_type:    self.conflict_type.parse()?,
      severity:         self.severity.parse()?,
      description:      self.description,
      resolution:       self.resolution.map(|r| r.parse()).transpose()?,
      resolved_at:      self.resolved_at.as_deref().map(decode_dt).transpose()?,
      resolved_by:      self.resolved_by,
      notes:            self.notes,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

pub const LOCATION_COLUMNS: &str = "id, raw_text, normalized, city, county, state, country, \
  latitude, longitude, geocode_status";

pub struct RawLocation {
  pub id:             i64,
  pub raw_text:       String,
  pub normalized:     String,
  pub city:           Option<String>,
  pub county:         Option<String>,
  pub state:          Option<String>,
  pub country:        Option<String>,
  pub latitude:       Option<f64>,
  pub longitude:      Option<f64>,
  pub geocode_status: String,
}

impl RawLocation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      raw_text:       row.get(1)?,
      normalized:     row.get(2)?,
      city:           row.get(3)?,
      county:         row.get(4)?,
      state:          row.get(5)?,
      country:        row.get(6)?,
      latitude:       row.get(7)?,
      longitude:      row.get(8)?,
      geocode_status: row.get(9)?,
    })
  }

  pub fn into_location(self) -> Result<Location> {
    Ok(Location {
      id:             self.id,
      parts:          PlaceParts {
        raw_text:   self.raw_text,
        normalized: self.normalized,
        city:       self.city,
        county:     self.county,
        state:      self.state,
        country:    self.country,
      },
      latitude:       self.latitude,
      longitude:      self.longitude,
      geocode_status: decode_geocode_status(&self.geocode_status)?,
    })
  }
}
