//! [`SqliteStore`]: the SQLite implementation of [`GenealogyStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, params};
use uuid::Uuid;

use stamm_core::{
  conflict::{Conflict, ConflictId, ConflictQuery, NewConflict},
  event::{Event, EventKind, EventType},
  kinship::KinshipSnapshot,
  load::{LoadBatch, LoadReport},
  location::{GeocodeOutcome, GeocodeStatus, Location, LocationId, LocationMerge},
  person::{Person, PersonId, ProfileUpdate},
  resolve::ResolvedConflict,
  store::{GenealogyStore, StoreStats, ValidationWrite},
  validate::SpouseDeath,
};

use crate::{
  Error, Result,
  encode::{
    CONFLICT_COLUMNS, EVENT_SELECT, FAMILY_COLUMNS, LOCATION_COLUMNS, PERSON_COLUMNS,
    RawConflict, RawEvent, RawFamilyChild, RawLocation, RawPerson, decode_date, decode_uuid,
    encode_dt, encode_geocode_status, encode_uuid, encode_validation, family_from_row,
  },
  load::{load_batch, seed_event_types},
  schema::SCHEMA,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Run `sql` and collect every row through `f`.
fn query_all<T, P, F>(conn: &rusqlite::Connection, sql: &str, params: P, f: F) -> rusqlite::Result<Vec<T>>
where
  P: rusqlite::Params,
  F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt.query_map(params, f)?.collect();
  rows
}

/// Set the person's review flag from their open conflicts: unresolved ones
/// and ones resolved as `needs_review`.
fn refresh_review_flag(conn: &rusqlite::Connection, person_id: PersonId) -> rusqlite::Result<bool> {
  let open: bool = conn.query_row(
    "SELECT EXISTS (
       SELECT 1 FROM conflict
       WHERE person_id = ?1 AND (resolution IS NULL OR resolution = 'needs_review')
     )",
    params![person_id],
    |r| r.get(0),
  )?;
  conn.execute(
    "UPDATE person SET needs_review = ?2 WHERE id = ?1",
    params![person_id, open],
  )?;
  Ok(open)
}

/// Events named by the person's unresolved conflicts.
const MARK_CONFLICT_EVENTS: &str = "
  UPDATE event SET validation_status = 'conflict'
  WHERE person_id = ?1 AND id IN (
    SELECT event_id FROM conflict WHERE person_id = ?1 AND resolution IS NULL
    UNION
    SELECT related_event_id FROM conflict WHERE person_id = ?1 AND resolution IS NULL
  )";

/// Limit as SQLite understands it; `-1` is unbounded.
fn sql_limit(limit: Option<usize>) -> i64 { limit.map_or(-1, |l| l as i64) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A genealogy store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        seed_event_types(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn conflicts_where(&self, query: ConflictQuery) -> Result<Vec<Conflict>> {
    let severity = query.severity.map(|s| s.as_str().to_owned());
    let limit    = sql_limit(query.limit);

    let raws: Vec<RawConflict> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {CONFLICT_COLUMNS} FROM conflict
           WHERE (?1 IS NULL OR person_id = ?1)
             AND (?2 IS NULL OR severity = ?2)
             AND (?3 = 0 OR resolution IS NULL)
           ORDER BY CASE severity WHEN 'error' THEN 0 WHEN 'warning' THEN 1 ELSE 2 END, id
           LIMIT ?4"
        );
        Ok(query_all(
          conn,
          &sql,
          params![query.person_id, severity, query.unresolved_only, limit],
          RawConflict::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawConflict::into_conflict).collect()
  }

  async fn get_location(&self, id: LocationId) -> Result<Option<Location>> {
    let raw: Option<RawLocation> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {LOCATION_COLUMNS} FROM location WHERE id = ?1"),
              params![id],
              RawLocation::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawLocation::into_location).transpose()
  }
}

// ─── GenealogyStore impl ─────────────────────────────────────────────────────

impl GenealogyStore for SqliteStore {
  type Error = Error;

  // ── Ingest lock ───────────────────────────────────────────────────────────

  async fn acquire_ingest_lock(&self, run_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(run_id);
    let at_str = encode_dt(Utc::now());

    let holder: Option<String> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO ingest_lock (id, run_id, acquired_at) VALUES (1, ?1, ?2)
           ON CONFLICT(id) DO NOTHING",
          params![id_str, at_str],
        )?;
        if inserted == 1 {
          return Ok(None);
        }
        let holder: String =
          conn.query_row("SELECT run_id FROM ingest_lock WHERE id = 1", [], |r| r.get(0))?;
        Ok(Some(holder))
      })
      .await?;

    match holder {
      None => Ok(()),
      Some(holder) => Err(Error::IngestInProgress(decode_uuid(&holder)?)),
    }
  }

  async fn release_ingest_lock(&self, run_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(run_id);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM ingest_lock WHERE id = 1 AND run_id = ?1",
          params![id_str],
        )?)
      })
      .await?;

    if removed == 0 {
      return Err(Error::LockNotHeld(run_id));
    }
    Ok(())
  }

  async fn clear_ingest_lock(&self) -> Result<Option<Uuid>> {
    let holder: Option<String> = self
      .conn
      .call(|conn| {
        let holder = conn
          .query_row("SELECT run_id FROM ingest_lock WHERE id = 1", [], |r| r.get(0))
          .optional()?;
        conn.execute("DELETE FROM ingest_lock", [])?;
        Ok(holder)
      })
      .await?;

    holder.as_deref().map(decode_uuid).transpose()
  }

  // ── Load ──────────────────────────────────────────────────────────────────

  async fn load(&self, run_id: Uuid, batch: LoadBatch) -> Result<LoadReport> {
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = match load_batch(&tx, run_id, batch, &now)? {
          Ok(report) => report,
          Err(e) => return Ok(Err(e)),
        };
        tx.commit()?;
        Ok(Ok(report))
      })
      .await?
  }

  // ── Persons ───────────────────────────────────────────────────────────────

  async fn list_persons(&self) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .conn
      .call(|conn| {
        Ok(query_all(
          conn,
          &format!("SELECT {PERSON_COLUMNS} FROM person ORDER BY id"),
          [],
          RawPerson::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn get_person(&self, id: PersonId) -> Result<Option<Person>> {
    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PERSON_COLUMNS} FROM person WHERE id = ?1"),
              params![id],
              RawPerson::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn person_events(&self, id: PersonId) -> Result<Vec<Event>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "{EVENT_SELECT}
             WHERE e.person_id = ?1
             ORDER BY e.date_sort IS NULL, e.date_sort, e.id"
          ),
          params![id],
          RawEvent::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn spouse_deaths(&self, id: PersonId) -> Result<Vec<SpouseDeath>> {
    let death_code = EventKind::Death.code();
    let rows: Vec<(i64, i64, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          "SELECT s.family_id, s.spouse_id,
                  (SELECT MIN(e.date_sort)
                   FROM event e JOIN event_type t ON t.id = e.event_type_id
                   WHERE e.person_id = s.spouse_id AND t.code = ?2)
           FROM (SELECT id AS family_id,
                        CASE WHEN spouse1_id = ?1 THEN spouse2_id ELSE spouse1_id END AS spouse_id
                 FROM family
                 WHERE spouse1_id = ?1 OR spouse2_id = ?1) s
           WHERE s.spouse_id IS NOT NULL
           ORDER BY s.family_id",
          params![id, death_code],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?)
      })
      .await?;

    rows
      .into_iter()
      .map(|(family_id, spouse_id, death)| {
        Ok(SpouseDeath { family_id, spouse_id, death: decode_date(death)? })
      })
      .collect()
  }

  async fn set_needs_review(&self, id: PersonId, needs_review: bool) -> Result<()> {
    let at_str = encode_dt(Utc::now());
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE person SET needs_review = ?2, updated_at = ?3 WHERE id = ?1",
          params![id, needs_review, at_str],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::PersonNotFound(id));
    }
    Ok(())
  }

  async fn update_profile(&self, id: PersonId, update: ProfileUpdate) -> Result<Person> {
    let at_str = encode_dt(Utc::now());
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE person
           SET notes = COALESCE(?2, notes), biography = COALESCE(?3, biography), updated_at = ?4
           WHERE id = ?1",
          params![id, update.notes, update.biography, at_str],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::PersonNotFound(id));
    }
    self.get_person(id).await?.ok_or(Error::PersonNotFound(id))
  }

  // ── Conflicts ─────────────────────────────────────────────────────────────

  async fn record_validation(
    &self,
    person_id: PersonId,
    conflicts: Vec<NewConflict>,
  ) -> Result<ValidationWrite> {
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut exists = tx.prepare(
            "SELECT 1 FROM conflict
             WHERE person_id = ?1 AND conflict_type = ?2
               AND event_id IS ?3 AND related_event_id IS ?4",
          )?;
          let mut insert = tx.prepare(
            "INSERT INTO conflict
               (person_id, event_id, related_event_id, conflict_type, severity, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for c in &conflicts {
            let ty = c.conflict_type.as_str();
            if exists.exists(params![person_id, ty, c.event_id, c.related_event_id])? {
              continue;
            }
            insert.execute(params![
              person_id,
              c.event_id,
              c.related_event_id,
              ty,
              c.severity.as_str(),
              c.description,
              now,
            ])?;
            inserted += 1;
          }
        }

        tx.execute(MARK_CONFLICT_EVENTS, params![person_id])?;
        tx.execute(
          "UPDATE event SET validation_status = 'valid'
           WHERE person_id = ?1 AND validation_status = 'unvalidated'",
          params![person_id],
        )?;
        let needs_review = refresh_review_flag(&tx, person_id)?;
        tx.commit()?;

        Ok(ValidationWrite { inserted, needs_review })
      })
      .await
      .map_err(Error::from)
  }

  async fn unresolved_conflicts(&self) -> Result<Vec<Conflict>> {
    self
      .conflicts_where(ConflictQuery { unresolved_only: true, ..ConflictQuery::default() })
      .await
  }

  async fn list_conflicts<'a>(&'a self, query: &'a ConflictQuery) -> Result<Vec<Conflict>> {
    self.conflicts_where(query.clone()).await
  }

  async fn get_conflict(&self, id: ConflictId) -> Result<Option<Conflict>> {
    let raw: Option<RawConflict> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONFLICT_COLUMNS} FROM conflict WHERE id = ?1"),
              params![id],
              RawConflict::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConflict::into_conflict).transpose()
  }

  async fn apply_resolution(&self, resolved: ResolvedConflict) -> Result<Conflict> {
    let conflict_id = resolved.conflict_id;
    let at_str      = encode_dt(Utc::now());
    let status      = resolved.event_status.map(encode_validation);

    let raw: Option<RawConflict> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE conflict SET resolution = ?2, resolved_at = ?3, resolved_by = ?4, notes = ?5
           WHERE id = ?1",
          params![
            conflict_id,
            resolved.resolution.as_str(),
            at_str,
            resolved.resolved_by,
            resolved.notes,
          ],
        )?;
        if updated == 0 {
          return Ok(None);
        }

        let raw = tx.query_row(
          &format!("SELECT {CONFLICT_COLUMNS} FROM conflict WHERE id = ?1"),
          params![conflict_id],
          RawConflict::from_row,
        )?;
        if let (Some(status), Some(event_id)) = (status, raw.event_id) {
          tx.execute(
            "UPDATE event SET validation_status = ?2 WHERE id = ?1",
            params![event_id, status],
          )?;
        }
        refresh_review_flag(&tx, raw.person_id)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.ok_or(Error::ConflictNotFound(conflict_id))?.into_conflict()
  }

  // ── Locations ─────────────────────────────────────────────────────────────

  async fn pending_locations(&self, limit: Option<usize>) -> Result<Vec<Location>> {
    let limit = sql_limit(limit);
    let raws: Vec<RawLocation> = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {LOCATION_COLUMNS} FROM location
             WHERE geocode_status = 'pending'
             ORDER BY id
             LIMIT ?1"
          ),
          params![limit],
          RawLocation::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawLocation::into_location).collect()
  }

  async fn record_geocode(&self, id: LocationId, outcome: GeocodeOutcome) -> Result<()> {
    let status = encode_geocode_status(outcome.status());
    let (latitude, longitude) = match outcome {
      GeocodeOutcome::Success(c) => (Some(c.latitude), Some(c.longitude)),
      GeocodeOutcome::Failed | GeocodeOutcome::Skipped => (None, None),
    };

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE location SET geocode_status = ?2, latitude = ?3, longitude = ?4 WHERE id = ?1",
          params![id, status, latitude, longitude],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::LocationNotFound(id));
    }
    Ok(())
  }

  async fn list_locations(&self, status: Option<GeocodeStatus>) -> Result<Vec<Location>> {
    let status = status.map(encode_geocode_status);
    let raws: Vec<RawLocation> = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {LOCATION_COLUMNS} FROM location
             WHERE (?1 IS NULL OR geocode_status = ?1)
             ORDER BY id"
          ),
          params![status],
          RawLocation::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawLocation::into_location).collect()
  }

  async fn merge_locations(
    &self,
    target:  LocationId,
    sources: Vec<LocationId>,
  ) -> Result<LocationMerge> {
    let mut sources: Vec<LocationId> = sources.into_iter().filter(|&s| s != target).collect();
    sources.sort_unstable();
    sources.dedup();
    if sources.is_empty() {
      return Err(Error::NothingToMerge);
    }

    let (merged_count, events_updated) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in std::iter::once(&target).chain(&sources) {
          let found = tx
            .query_row("SELECT 1 FROM location WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
          if found.is_none() {
            return Ok(Err(Error::LocationNotFound(*id)));
          }
        }

        let mut merged = 0;
        let mut events = 0;
        for id in &sources {
          events += tx.execute(
            "UPDATE event SET location_id = ?1 WHERE location_id = ?2",
            params![target, id],
          )?;
          merged += tx.execute("DELETE FROM location WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(Ok((merged, events)))
      })
      .await??;

    let target = self.get_location(target).await?.ok_or(Error::LocationNotFound(target))?;
    Ok(LocationMerge { target, merged_count, events_updated })
  }

  async fn retry_failed_locations(&self) -> Result<usize> {
    self
      .conn
      .call(|conn| {
        Ok(conn.execute(
          "UPDATE location SET geocode_status = 'pending' WHERE geocode_status = 'failed'",
          [],
        )?)
      })
      .await
      .map_err(Error::from)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn kinship_snapshot(&self) -> Result<KinshipSnapshot> {
    let (persons, families, children) = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let persons = query_all(
          &tx,
          &format!("SELECT {PERSON_COLUMNS} FROM person ORDER BY id"),
          [],
          RawPerson::from_row,
        )?;
        let families = query_all(
          &tx,
          &format!("SELECT {FAMILY_COLUMNS} FROM family ORDER BY id"),
          [],
          family_from_row,
        )?;
        let children = query_all(
          &tx,
          "SELECT family_id, child_id, relationship FROM family_child
           ORDER BY family_id, child_id",
          [],
          |r| {
            Ok(RawFamilyChild {
              family_id:    r.get(0)?,
              child_id:     r.get(1)?,
              relationship: r.get(2)?,
            })
          },
        )?;
        tx.commit()?;
        Ok((persons, families, children))
      })
      .await?;

    Ok(KinshipSnapshot {
      persons: persons.into_iter().map(RawPerson::into_person).collect::<Result<_>>()?,
      families,
      children: children
        .into_iter()
        .map(RawFamilyChild::into_family_child)
        .collect::<Result<_>>()?,
    })
  }

  async fn stats(&self) -> Result<StoreStats> {
    let counts: [i64; 9] = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM person),
             (SELECT COUNT(*) FROM person WHERE needs_review = 1),
             (SELECT COUNT(*) FROM family),
             (SELECT COUNT(*) FROM event),
             (SELECT COUNT(*) FROM location),
             (SELECT COUNT(*) FROM location WHERE geocode_status = 'success'),
             (SELECT COUNT(*) FROM location WHERE geocode_status = 'pending'),
             (SELECT COUNT(*) FROM conflict),
             (SELECT COUNT(*) FROM conflict WHERE resolution IS NULL)",
          [],
          |r| -> rusqlite::Result<[i64; 9]> {
            Ok([
              r.get(0)?,
              r.get(1)?,
              r.get(2)?,
              r.get(3)?,
              r.get(4)?,
              r.get(5)?,
              r.get(6)?,
              r.get(7)?,
              r.get(8)?,
            ])
          },
        )?)
      })
      .await?;

    let [
      persons,
      persons_needing_review,
      families,
      events,
      locations,
      locations_geocoded,
      locations_pending,
      conflicts,
      conflicts_unresolved,
    ] = counts.map(|n| n.max(0) as u64);

    Ok(StoreStats {
      persons,
      persons_needing_review,
      families,
      events,
      locations,
      locations_geocoded,
      locations_pending,
      conflicts,
      conflicts_unresolved,
    })
  }

  async fn event_types(&self) -> Result<Vec<EventType>> {
    let rows: Vec<(i64, String, String, i64)> = self
      .conn
      .call(|conn| {
        Ok(query_all(
          conn,
          "SELECT id, code, label, sort_order FROM event_type ORDER BY sort_order, id",
          [],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, code, label, sort_order)| {
        Ok(EventType { id, kind: EventKind::from_code(&code)?, code, label, sort_order })
      })
      .collect()
  }
}
