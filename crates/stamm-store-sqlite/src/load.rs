//! The multi-pass bulk loader.
//!
//! Runs entirely inside a transaction owned by the caller. Domain failures
//! (a duplicate xref, a lock held by someone else) come back as the inner
//! `Err` so the caller can drop the transaction, which rolls it back.

use std::collections::{HashMap, HashSet};

use rusqlite::{OptionalExtension as _, Transaction, params};
use uuid::Uuid;

use stamm_core::{
  event::EventKind,
  load::{LoadBatch, LoadReport, NewEvent, RefRole, UnresolvedRef},
  location::{LocationId, PlaceParts},
  person::{FamilyId, PersonId},
};

use crate::{
  Error, Result,
  encode::{decode_uuid, encode_date, encode_precision, encode_relationship, encode_sex, encode_uuid},
};

/// SQL result wrapping a domain result.
pub type Outcome<T> = rusqlite::Result<Result<T>>;

/// Remove every genealogical row. Event types, ingest runs and the lock
/// survive.
const CLEAR: &str = "
  DELETE FROM conflict;
  DELETE FROM event;
  DELETE FROM family_child;
  DELETE FROM family;
  DELETE FROM person;
  DELETE FROM location;
";

/// Check that `run_id` holds the ingest lock.
pub fn check_lock(tx: &Transaction<'_>, run_id: Uuid) -> Outcome<()> {
  let holder: Option<String> = tx
    .query_row("SELECT run_id FROM ingest_lock WHERE id = 1", [], |r| r.get(0))
    .optional()?;
  match holder.as_deref().map(decode_uuid) {
    Some(Ok(holder)) if holder == run_id => Ok(Ok(())),
    Some(Err(e)) => Ok(Err(e)),
    _ => Ok(Err(Error::LockNotHeld(run_id))),
  }
}

/// Location ids by raw text, plus the number of rows this load created.
#[derive(Default)]
struct Locations {
  ids:     HashMap<String, LocationId>,
  created: usize,
}

impl Locations {
  fn resolve(&mut self, tx: &Transaction<'_>, place: &PlaceParts) -> rusqlite::Result<Option<LocationId>> {
    if place.raw_text.is_empty() {
      return Ok(None);
    }
    if let Some(id) = self.ids.get(&place.raw_text) {
      return Ok(Some(*id));
    }

    let existing: Option<LocationId> = tx
      .query_row(
        "SELECT id FROM location WHERE raw_text = ?1",
        params![place.raw_text],
        |r| r.get(0),
      )
      .optional()?;

    let id = match existing {
      Some(id) => id,
      None => {
        tx.execute(
          "INSERT INTO location (raw_text, normalized, city, county, state, country)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            place.raw_text,
            place.normalized,
            place.city,
            place.county,
            place.state,
            place.country,
          ],
        )?;
        self.created += 1;
        tx.last_insert_rowid()
      }
    };

    self.ids.insert(place.raw_text.clone(), id);
    Ok(Some(id))
  }
}

/// Writes events, resolving type codes and locations as it goes.
struct EventWriter<'t, 'c> {
  tx:        &'t Transaction<'c>,
  types:     HashMap<String, i64>,
  locations: Locations,
  written:   usize,
}

impl EventWriter<'_, '_> {
  fn write(&mut self, person_id: PersonId, family_id: Option<FamilyId>, event: &NewEvent) -> Outcome<()> {
    let Some(&type_id) = self.types.get(event.kind.code()) else {
      return Ok(Err(stamm_core::Error::UnknownEventType(event.kind.code().to_string()).into()));
    };
    let location_id = match &event.place {
      Some(place) => self.locations.resolve(self.tx, place)?,
      None => None,
    };

    self.tx.execute(
      "INSERT INTO event
         (person_id, family_id, event_type_id, location_id,
          date_raw, date_sort, date_end, date_precision, description)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
      params![
        person_id,
        family_id,
        type_id,
        location_id,
        event.date.raw,
        encode_date(event.date.sort),
        encode_date(event.date.end),
        encode_precision(event.date.precision),
        event.description,
      ],
    )?;
    self.written += 1;
    Ok(Ok(()))
  }
}

fn xref_exists(tx: &Transaction<'_>, table: &str, xref: &str) -> rusqlite::Result<bool> {
  let sql = format!("SELECT 1 FROM {table} WHERE xref = ?1");
  Ok(tx.query_row(&sql, params![xref], |_| Ok(())).optional()?.is_some())
}

/// Seed the event vocabulary. Safe to run on every startup.
pub fn seed_event_types(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO event_type (code, label, sort_order) VALUES (?1, ?2, ?3)
     ON CONFLICT(code) DO UPDATE SET label = excluded.label, sort_order = excluded.sort_order",
  )?;
  for kind in EventKind::ALL {
    stmt.execute(params![kind.code(), kind.label(), kind.sort_order()])?;
  }
  Ok(())
}

/// Write `batch` in four passes: persons, families, family/child links,
/// then events. Nothing is committed here.
pub fn load_batch(tx: &Transaction<'_>, run_id: Uuid, batch: LoadBatch, now: &str) -> Outcome<LoadReport> {
  if let Err(e) = check_lock(tx, run_id)? {
    return Ok(Err(e));
  }
  if batch.replace {
    tx.execute_batch(CLEAR)?;
  }

  let mut unresolved = Vec::new();

  // ── Pass 1: persons ───────────────────────────────────────────────────
  let mut persons: HashMap<&str, PersonId> = HashMap::with_capacity(batch.persons.len());
  for p in &batch.persons {
    if persons.contains_key(p.xref.as_str()) || xref_exists(tx, "person", &p.xref)? {
      return Ok(Err(Error::DuplicateXref { kind: "person", xref: p.xref.clone() }));
    }
    tx.execute(
      "INSERT INTO person (xref, given_name, family_name, maiden_name, sex, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
      params![p.xref, p.given_name, p.family_name, p.maiden_name, encode_sex(p.sex), now],
    )?;
    persons.insert(&p.xref, tx.last_insert_rowid());
  }

  // ── Pass 2: families ──────────────────────────────────────────────────
  let mut spouse_ref = |family_xref: &str, xref: Option<&String>| -> Option<PersonId> {
    let xref = xref?;
    let found = persons.get(xref.as_str()).copied();
    if found.is_none() {
      unresolved.push(UnresolvedRef {
        family_xref: family_xref.to_string(),
        target_xref: xref.clone(),
        role:        RefRole::Spouse,
      });
    }
    found
  };

  let mut families: Vec<(FamilyId, [Option<PersonId>; 2])> = Vec::with_capacity(batch.families.len());
  let mut family_xrefs: HashSet<&str> = HashSet::with_capacity(batch.families.len());
  for f in &batch.families {
    if !family_xrefs.insert(&f.xref) || xref_exists(tx, "family", &f.xref)? {
      return Ok(Err(Error::DuplicateXref { kind: "family", xref: f.xref.clone() }));
    }
    let spouse1 = spouse_ref(&f.xref, f.spouse1_xref.as_ref());
    let spouse2 = spouse_ref(&f.xref, f.spouse2_xref.as_ref());
    tx.execute(
      "INSERT INTO family (xref, spouse1_id, spouse2_id) VALUES (?1, ?2, ?3)",
      params![f.xref, spouse1, spouse2],
    )?;
    families.push((tx.last_insert_rowid(), [spouse1, spouse2]));
  }

  // ── Pass 3: family/child links ────────────────────────────────────────
  let mut family_children = 0;
  for (f, (family_id, _)) in batch.families.iter().zip(&families) {
    for child in &f.children {
      let Some(&child_id) = persons.get(child.child_xref.as_str()) else {
        unresolved.push(UnresolvedRef {
          family_xref: f.xref.clone(),
          target_xref: child.child_xref.clone(),
          role:        RefRole::Child,
        });
        continue;
      };
      family_children += tx.execute(
        "INSERT INTO family_child (family_id, child_id, relationship) VALUES (?1, ?2, ?3)
         ON CONFLICT(family_id, child_id) DO NOTHING",
        params![family_id, child_id, encode_relationship(child.relationship)],
      )?;
    }
  }

  // ── Pass 4: events ────────────────────────────────────────────────────
  let types: HashMap<String, i64> = tx
    .prepare("SELECT code, id FROM event_type")?
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect::<rusqlite::Result<_>>()?;
  let mut writer = EventWriter { tx, types, locations: Locations::default(), written: 0 };

  for p in &batch.persons {
    let Some(&person_id) = persons.get(p.xref.as_str()) else { continue };
    for event in &p.events {
      if let Err(e) = writer.write(person_id, None, event)? {
        return Ok(Err(e));
      }
    }
  }

  let mut dropped_family_events = 0;
  for (f, (family_id, spouses)) in batch.families.iter().zip(&families) {
    let spouses: Vec<PersonId> = spouses.iter().flatten().copied().collect();
    if spouses.is_empty() {
      dropped_family_events += f.events.len();
      continue;
    }
    for event in &f.events {
      for &spouse in &spouses {
        if let Err(e) = writer.write(spouse, Some(*family_id), event)? {
          return Ok(Err(e));
        }
      }
    }
  }

  let report = LoadReport {
    run_id,
    persons: persons.len(),
    families: families.len(),
    family_children,
    events: writer.written,
    locations_created: writer.locations.created,
    dropped_family_events,
    unresolved_refs: unresolved,
  };

  let report_json = match serde_json::to_string(&report) {
    Ok(json) => json,
    Err(e) => return Ok(Err(e.into())),
  };
  tx.execute(
    "INSERT INTO ingest_run (run_id, source_name, source_digest, report, loaded_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![encode_uuid(run_id), batch.source_name, batch.source_digest, report_json, now],
  )?;

  Ok(Ok(report))
}
