//! The `GenealogyStore` trait and supporting read models.
//!
//! The trait is implemented by storage backends (e.g. `stamm-store-sqlite`).
//! The pipeline and the kinship service depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  conflict::{Conflict, ConflictId, ConflictQuery, NewConflict},
  event::{Event, EventType},
  kinship::KinshipSnapshot,
  load::{LoadBatch, LoadReport},
  location::{GeocodeOutcome, GeocodeStatus, Location, LocationId, LocationMerge},
  person::{Person, PersonId, ProfileUpdate},
  resolve::ResolvedConflict,
  validate::SpouseDeath,
};

// ─── Read models ─────────────────────────────────────────────────────────────

/// Row counts across the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
  pub persons:                u64,
  pub persons_needing_review: u64,
  pub families:               u64,
  pub events:                 u64,
  pub locations:              u64,
  pub locations_geocoded:     u64,
  pub locations_pending:      u64,
  pub conflicts:              u64,
  pub conflicts_unresolved:   u64,
}

/// Effect of recording one person's validation results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWrite {
  /// Conflicts inserted; ones already on record are not repeated.
  pub inserted:     usize,
  pub needs_review: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a genealogy store backend.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks (the geocoding stage runs on one).
pub trait GenealogyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingest lock ───────────────────────────────────────────────────────

  /// Take the store-wide ingest lock for `run_id`. Fails if another run
  /// holds it.
  fn acquire_ingest_lock(
    &self,
    run_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Release the lock held by `run_id`.
  fn release_ingest_lock(
    &self,
    run_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove the lock whoever holds it. Returns the run id that held it.
  fn clear_ingest_lock(
    &self,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  // ── Load ──────────────────────────────────────────────────────────────

  /// Write a batch as one transaction: persons, families, family/child
  /// links, then events with their locations. A duplicate person or family
  /// xref aborts the whole load.
  fn load(
    &self,
    run_id: Uuid,
    batch: LoadBatch,
  ) -> impl Future<Output = Result<LoadReport, Self::Error>> + Send + '_;

  // ── Persons ───────────────────────────────────────────────────────────

  fn list_persons(&self) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Returns `None` if not found.
  fn get_person(
    &self,
    id: PersonId,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// All events of a person, ordered by sort date (undated last), then id.
  fn person_events(
    &self,
    id: PersonId,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// For each family the person is a spouse in, the other spouse's
  /// earliest recorded death.
  fn spouse_deaths(
    &self,
    id: PersonId,
  ) -> impl Future<Output = Result<Vec<SpouseDeath>, Self::Error>> + Send + '_;

  fn set_needs_review(
    &self,
    id: PersonId,
    needs_review: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_profile(
    &self,
    id: PersonId,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  // ── Conflicts ─────────────────────────────────────────────────────────

  /// Record the validator's findings for one person in a single
  /// transaction: insert new conflicts, mark the events they name as
  /// `conflict`, mark the person's other unvalidated events `valid`, and
  /// set `needs_review` iff a conflict is still open (unresolved, or
  /// resolved as needs-review).
  fn record_validation(
    &self,
    person_id: PersonId,
    conflicts: Vec<NewConflict>,
  ) -> impl Future<Output = Result<ValidationWrite, Self::Error>> + Send + '_;

  /// Unresolved conflicts, most severe first.
  fn unresolved_conflicts(
    &self,
  ) -> impl Future<Output = Result<Vec<Conflict>, Self::Error>> + Send + '_;

  fn list_conflicts<'a>(
    &'a self,
    query: &'a ConflictQuery,
  ) -> impl Future<Output = Result<Vec<Conflict>, Self::Error>> + Send + 'a;

  fn get_conflict(
    &self,
    id: ConflictId,
  ) -> impl Future<Output = Result<Option<Conflict>, Self::Error>> + Send + '_;

  /// Persist a resolution and its side effects on the primary event and the
  /// person's review flag. Touches only that conflict's rows.
  fn apply_resolution(
    &self,
    resolved: ResolvedConflict,
  ) -> impl Future<Output = Result<Conflict, Self::Error>> + Send + '_;

  // ── Locations ─────────────────────────────────────────────────────────

  /// Locations still awaiting geocoding, by id.
  fn pending_locations(
    &self,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  fn record_geocode(
    &self,
    id: LocationId,
    outcome: GeocodeOutcome,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_locations(
    &self,
    status: Option<GeocodeStatus>,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  /// Move every event referencing `sources` onto `target` and delete the
  /// source rows.
  fn merge_locations(
    &self,
    target: LocationId,
    sources: Vec<LocationId>,
  ) -> impl Future<Output = Result<LocationMerge, Self::Error>> + Send + '_;

  /// Reset `failed` locations to `pending`. Returns how many were reset.
  fn retry_failed_locations(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Persons, families and child links read in one consistent snapshot.
  fn kinship_snapshot(
    &self,
  ) -> impl Future<Output = Result<KinshipSnapshot, Self::Error>> + Send + '_;

  fn stats(&self) -> impl Future<Output = Result<StoreStats, Self::Error>> + Send + '_;

  fn event_types(&self) -> impl Future<Output = Result<Vec<EventType>, Self::Error>> + Send + '_;
}
