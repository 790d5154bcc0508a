//! People, families and the parent/child join between them.

use serde::{Deserialize, Serialize};

pub type PersonId = i64;
pub type FamilyId = i64;

/// Recorded sex of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
  Male,
  Female,
  #[default]
  Unknown,
}

impl Sex {
  /// Map a GEDCOM `SEX` value; anything other than `M`/`F` is unknown.
  pub fn from_code(code: &str) -> Self {
    match code.trim().to_ascii_uppercase().as_str() {
      "M" => Self::Male,
      "F" => Self::Female,
      _ => Self::Unknown,
    }
  }
}

/// A persisted individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub id:           PersonId,
  /// Cross-reference id from the source file, e.g. `@I12@`. Unique.
  pub xref:         String,
  pub given_name:   Option<String>,
  pub family_name:  Option<String>,
  pub maiden_name:  Option<String>,
  pub sex:          Sex,
  /// Set while the person has unresolved conflicts, or by an explicit review
  /// mark.
  pub needs_review: bool,
  pub notes:        Option<String>,
  pub biography:    Option<String>,
}

impl Person {
  /// Given and family name joined by a space, or `(Unknown)`.
  pub fn display_name(&self) -> String {
    display_name(self.given_name.as_deref(), self.family_name.as_deref())
  }
}

pub(crate) fn display_name(given: Option<&str>, family: Option<&str>) -> String {
  let parts: Vec<&str> = [given, family].into_iter().flatten().collect();
  if parts.is_empty() {
    "(Unknown)".to_string()
  } else {
    parts.join(" ")
  }
}

/// Editable free-text fields on a person. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
  pub notes:     Option<String>,
  pub biography: Option<String>,
}

/// A persisted family unit. Either spouse may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
  pub id:         FamilyId,
  pub xref:       String,
  pub spouse1_id: Option<PersonId>,
  pub spouse2_id: Option<PersonId>,
}

impl Family {
  pub fn spouses(&self) -> impl Iterator<Item = PersonId> + '_ {
    self.spouse1_id.into_iter().chain(self.spouse2_id)
  }
}

/// How a child belongs to a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildRelationship {
  #[default]
  Biological,
  Adopted,
  Step,
  Foster,
  Unknown,
}

impl ChildRelationship {
  /// Map a GEDCOM `PEDI` value.
  pub fn from_pedigree(value: &str) -> Self {
    match value.trim().to_ascii_lowercase().as_str() {
      "birth" | "biological" => Self::Biological,
      "adopted" => Self::Adopted,
      "step" => Self::Step,
      "foster" => Self::Foster,
      _ => Self::Unknown,
    }
  }
}

/// Membership of a child in a family. `(family_id, child_id)` is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyChild {
  pub family_id:    FamilyId,
  pub child_id:     PersonId,
  pub relationship: ChildRelationship,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_name_falls_back_to_unknown() {
    assert_eq!(display_name(None, None), "(Unknown)");
    assert_eq!(display_name(Some("Ada"), None), "Ada");
    assert_eq!(display_name(Some("Ada"), Some("Byron")), "Ada Byron");
  }

  #[test]
  fn pedigree_codes() {
    assert_eq!(ChildRelationship::from_pedigree("birth"), ChildRelationship::Biological);
    assert_eq!(ChildRelationship::from_pedigree("Adopted"), ChildRelationship::Adopted);
    assert_eq!(ChildRelationship::from_pedigree("sealing"), ChildRelationship::Unknown);
  }

  #[test]
  fn sex_codes() {
    assert_eq!(Sex::from_code("m"), Sex::Male);
    assert_eq!(Sex::from_code("F"), Sex::Female);
    assert_eq!(Sex::from_code("X"), Sex::Unknown);
  }
}
