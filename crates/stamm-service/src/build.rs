//! Parsed records → a [`LoadBatch`].
//!
//! Dates and places are normalised here, so the store only ever sees the
//! four-part date and split place components. Cross-references stay as
//! xref strings; the store resolves them.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use stamm_core::{
  date::NormalizedDate,
  load::{LoadBatch, NewEvent, NewFamily, NewFamilyChild, NewPerson},
  person::ChildRelationship,
};
use stamm_gedcom::{Document, EventRecord, normalize_date, normalize_place};

/// Hex SHA-256 of the source bytes, recorded with each ingest run.
pub fn source_digest(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

fn new_event(record: &EventRecord) -> NewEvent {
  NewEvent {
    kind:        record.kind,
    date:        record
      .date
      .as_deref()
      .map(normalize_date)
      .unwrap_or_else(|| NormalizedDate::unknown(None)),
    place:       record
      .place
      .as_deref()
      .map(normalize_place)
      .filter(|p| !p.raw_text.is_empty()),
    description: record.description.clone(),
  }
}

/// Build the batch for one parsed document.
///
/// A child's `FAMC ... PEDI` sets the relationship kind in that family. A
/// `FAMC` link to a family that does not list the child adds the child to
/// it.
pub fn build_batch(doc: &Document, source_name: &str, source_digest: String, replace: bool) -> LoadBatch {
  let mut links: Vec<(&str, &str, ChildRelationship)> = Vec::new();
  for indi in doc.individuals() {
    for (family, pedigree) in indi.child_families() {
      let relationship = pedigree.map(ChildRelationship::from_pedigree).unwrap_or_default();
      links.push((family, indi.xref.as_str(), relationship));
    }
  }
  let pedigree: HashMap<(&str, &str), ChildRelationship> =
    links.iter().map(|&(family, child, rel)| ((family, child), rel)).collect();

  let persons = doc
    .individuals()
    .map(|indi| NewPerson {
      xref:        indi.xref.clone(),
      given_name:  indi.given_name().map(str::to_string),
      family_name: indi.surname().map(str::to_string),
      maiden_name: indi.maiden_name().map(str::to_string),
      sex:         indi.sex(),
      events:      indi.events().map(new_event).collect(),
    })
    .collect();

  let mut families: Vec<NewFamily> = doc
    .families()
    .map(|fam| NewFamily {
      xref:         fam.xref.clone(),
      spouse1_xref: fam.husband().map(str::to_string),
      spouse2_xref: fam.wife().map(str::to_string),
      children:     fam
        .children()
        .map(|child| NewFamilyChild {
          child_xref:   child.to_string(),
          relationship: pedigree
            .get(&(fam.xref.as_str(), child))
            .copied()
            .unwrap_or_default(),
        })
        .collect(),
      events:       fam.events().map(new_event).collect(),
    })
    .collect();

  let index: HashMap<&str, usize> =
    doc.families().enumerate().map(|(i, fam)| (fam.xref.as_str(), i)).collect();
  for (family, child, relationship) in links {
    if let Some(&i) = index.get(family)
      && !families[i].children.iter().any(|c| c.child_xref == child)
    {
      families[i].children.push(NewFamilyChild { child_xref: child.to_string(), relationship });
    }
  }

  LoadBatch {
    source_name: source_name.to_string(),
    source_digest,
    persons,
    families,
    replace,
  }
}

#[cfg(test)]
mod tests {
  use stamm_core::{
    date::DatePrecision,
    event::EventKind,
    person::{ChildRelationship, Sex},
  };
  use stamm_gedcom::parse_str;

  use super::*;

  const SAMPLE: &str = "\
0 HEAD
0 @I1@ INDI
1 NAME John /Smith/
1 SEX M
1 BIRT
2 DATE 12 JUN 1776
2 PLAC Boston, Suffolk, MA, USA
0 @I2@ INDI
1 NAME Mary /Jones/
1 SEX F
0 @I3@ INDI
1 NAME Ann /Smith/
1 FAMC @F1@
2 PEDI adopted
0 @I4@ INDI
1 NAME Tom /Smith/
1 FAMC @F1@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
1 MARR
2 DATE ABT 1800
0 TRLR
";

  fn sample() -> LoadBatch {
    let doc = parse_str(SAMPLE).unwrap();
    build_batch(&doc, "sample.ged", source_digest(SAMPLE.as_bytes()), false)
  }

  #[test]
  fn persons_carry_names_and_normalised_events() {
    let batch = sample();
    assert_eq!(batch.persons.len(), 4);

    let john = &batch.persons[0];
    assert_eq!(john.given_name.as_deref(), Some("John"));
    assert_eq!(john.family_name.as_deref(), Some("Smith"));
    assert_eq!(john.maiden_name, None);
    assert_eq!(john.sex, Sex::Male);

    let birth = &john.events[0];
    assert_eq!(birth.kind, EventKind::Birth);
    assert_eq!(birth.date.precision, DatePrecision::Exact);
    let place = birth.place.as_ref().unwrap();
    assert_eq!(place.state.as_deref(), Some("Massachusetts"));
    assert_eq!(place.raw_text, "Boston, Suffolk, MA, USA");

    assert_eq!(batch.persons[1].maiden_name.as_deref(), Some("Jones"));
  }

  #[test]
  fn family_links_use_pedigree_and_famc() {
    let batch = sample();
    let family = &batch.families[0];
    assert_eq!(family.spouse1_xref.as_deref(), Some("@I1@"));
    assert_eq!(family.spouse2_xref.as_deref(), Some("@I2@"));

    let children: Vec<_> =
      family.children.iter().map(|c| (c.child_xref.as_str(), c.relationship)).collect();
    assert_eq!(children, [
      ("@I3@", ChildRelationship::Adopted),
      ("@I4@", ChildRelationship::Biological),
    ]);

    assert_eq!(family.events.len(), 1);
    assert_eq!(family.events[0].date.precision, DatePrecision::Estimated);
  }

  #[test]
  fn digest_is_hex_sha256() {
    let batch = sample();
    assert_eq!(batch.source_digest.len(), 64);
    assert_eq!(source_digest(b""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
  }
}
