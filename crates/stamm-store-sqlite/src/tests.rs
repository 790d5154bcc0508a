//! Integration tests for `SqliteStore` against an in-memory database.

use stamm_core::{
  conflict::{ConflictQuery, ConflictType, NewConflict, Resolution, Severity},
  date::{DatePrecision, NormalizedDate},
  event::{EventKind, ValidationStatus},
  load::{LoadBatch, LoadReport, NewEvent, NewFamily, NewFamilyChild, NewPerson, RefRole},
  location::{Coordinates, GeocodeOutcome, GeocodeStatus, PlaceParts},
  person::{ChildRelationship, ProfileUpdate, Sex},
  resolve::resolve,
  store::GenealogyStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn event(kind: EventKind, date: Option<&str>, place: Option<&str>) -> NewEvent {
  NewEvent {
    kind,
    date: NormalizedDate {
      raw:       date.map(str::to_string),
      sort:      date.map(|d| d.parse().expect("fixture date")),
      end:       None,
      precision: if date.is_some() { DatePrecision::Exact } else { DatePrecision::Unknown },
    },
    place: place.map(|p| PlaceParts {
      raw_text:   p.to_string(),
      normalized: p.to_string(),
      ..PlaceParts::default()
    }),
    description: None,
  }
}

fn person(xref: &str, given: &str, sex: Sex, events: Vec<NewEvent>) -> NewPerson {
  NewPerson {
    xref: xref.to_string(),
    given_name: Some(given.to_string()),
    family_name: Some("Doe".to_string()),
    sex,
    events,
    ..NewPerson::default()
  }
}

fn family(
  xref: &str,
  spouse1: Option<&str>,
  spouse2: Option<&str>,
  children: &[&str],
  events: Vec<NewEvent>,
) -> NewFamily {
  NewFamily {
    xref: xref.to_string(),
    spouse1_xref: spouse1.map(str::to_string),
    spouse2_xref: spouse2.map(str::to_string),
    children: children
      .iter()
      .map(|c| NewFamilyChild {
        child_xref:   c.to_string(),
        relationship: ChildRelationship::Biological,
      })
      .collect(),
    events,
  }
}

fn batch(persons: Vec<NewPerson>, families: Vec<NewFamily>) -> LoadBatch {
  LoadBatch {
    source_name: "test.ged".into(),
    source_digest: "00".into(),
    persons,
    families,
    replace: false,
  }
}

/// John and Mary, married in Boston, with one child born in Salem.
fn household() -> LoadBatch {
  batch(
    vec![
      person("@I1@", "John", Sex::Male, vec![event(EventKind::Birth, Some("1900-01-01"), Some("Boston"))]),
      person("@I2@", "Mary", Sex::Female, vec![event(EventKind::Birth, Some("1902-05-05"), Some("Boston"))]),
      person("@I3@", "Ann", Sex::Female, vec![event(EventKind::Birth, Some("1930-03-03"), Some("Salem"))]),
    ],
    vec![family(
      "@F1@",
      Some("@I1@"),
      Some("@I2@"),
      &["@I3@"],
      vec![event(EventKind::Marriage, Some("1925-06-01"), Some("Boston"))],
    )],
  )
}

/// Load under a fresh ingest lock, releasing it afterwards.
async fn load(s: &SqliteStore, batch: LoadBatch) -> Result<LoadReport, Error> {
  let run = Uuid::new_v4();
  s.acquire_ingest_lock(run).await?;
  let report = s.load(run, batch).await;
  s.release_ingest_lock(run).await?;
  report
}

async fn person_id(s: &SqliteStore, xref: &str) -> i64 {
  s.list_persons()
    .await
    .unwrap()
    .into_iter()
    .find(|p| p.xref == xref)
    .expect("person by xref")
    .id
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn event_types_are_seeded() {
  let s = store().await;
  let types = s.event_types().await.unwrap();
  assert_eq!(types.len(), EventKind::ALL.len());
  assert_eq!(types[0].kind, EventKind::Birth);
  assert_eq!(types.last().unwrap().kind, EventKind::Other);
}

// ─── Ingest lock ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_ingest_is_rejected_while_locked() {
  let s = store().await;
  let first = Uuid::new_v4();
  s.acquire_ingest_lock(first).await.unwrap();

  let err = s.acquire_ingest_lock(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::IngestInProgress(holder) if holder == first));

  let err = s.release_ingest_lock(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::LockNotHeld(_)));

  s.release_ingest_lock(first).await.unwrap();
  s.acquire_ingest_lock(Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn clearing_a_stale_lock_reports_the_holder() {
  let s = store().await;
  assert_eq!(s.clear_ingest_lock().await.unwrap(), None);

  let run = Uuid::new_v4();
  s.acquire_ingest_lock(run).await.unwrap();
  assert_eq!(s.clear_ingest_lock().await.unwrap(), Some(run));
  s.acquire_ingest_lock(Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn load_requires_the_lock() {
  let s = store().await;
  let err = s.load(Uuid::new_v4(), household()).await.unwrap_err();
  assert!(matches!(err, Error::LockNotHeld(_)));
  assert_eq!(s.stats().await.unwrap().persons, 0);
}

// ─── Load ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_writes_every_pass() {
  let s = store().await;
  let report = load(&s, household()).await.unwrap();

  assert_eq!(report.persons, 3);
  assert_eq!(report.families, 1);
  assert_eq!(report.family_children, 1);
  // Three births plus the marriage once per spouse.
  assert_eq!(report.events, 5);
  assert_eq!(report.locations_created, 2);
  assert!(report.unresolved_refs.is_empty());

  let locations = s.list_locations(None).await.unwrap();
  let mut raw: Vec<_> = locations.iter().map(|l| l.parts.raw_text.as_str()).collect();
  raw.sort();
  assert_eq!(raw, ["Boston", "Salem"]);
  assert!(locations.iter().all(|l| l.geocode_status == GeocodeStatus::Pending));
}

#[tokio::test]
async fn loaded_events_start_unvalidated_and_are_ordered() {
  let s = store().await;
  load(
    &s,
    batch(
      vec![person(
        "@I1@",
        "John",
        Sex::Male,
        vec![
          event(EventKind::Residence, None, None),
          event(EventKind::Death, Some("1970-01-01"), None),
          event(EventKind::Birth, Some("1900-01-01"), None),
        ],
      )],
      vec![],
    ),
  )
  .await
  .unwrap();

  let id = person_id(&s, "@I1@").await;
  let events = s.person_events(id).await.unwrap();
  let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
  assert_eq!(kinds, [EventKind::Birth, EventKind::Death, EventKind::Residence]);
  assert!(events.iter().all(|e| e.validation_status == ValidationStatus::Unvalidated));
  assert_eq!(events[0].date.precision, DatePrecision::Exact);
  assert_eq!(events[2].date.sort, None);
}

#[tokio::test]
async fn duplicate_xref_rolls_back_the_whole_load() {
  let s = store().await;
  let mut b = household();
  b.persons.push(person("@I2@", "Other", Sex::Unknown, vec![]));

  let err = load(&s, b).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateXref { kind: "person", ref xref } if xref == "@I2@"));

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.persons, 0);
  assert_eq!(stats.events, 0);
  assert_eq!(stats.locations, 0);
}

#[tokio::test]
async fn duplicate_family_xref_is_rejected() {
  let s = store().await;
  let mut b = household();
  b.families.push(family("@F1@", None, None, &[], vec![]));

  let err = load(&s, b).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateXref { kind: "family", .. }));
  assert_eq!(s.stats().await.unwrap().families, 0);
}

#[tokio::test]
async fn reloading_needs_replace() {
  let s = store().await;
  load(&s, household()).await.unwrap();

  let err = load(&s, household()).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateXref { .. }));

  let mut again = household();
  again.replace = true;
  let report = load(&s, again).await.unwrap();
  assert_eq!(report.persons, 3);

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.persons, 3);
  assert_eq!(stats.events, 5);
  // Deduplicated by raw text within the run.
  assert_eq!(stats.locations, 2);
}

#[tokio::test]
async fn dangling_references_are_reported_not_fatal() {
  let s = store().await;
  let b = batch(
    vec![person("@I1@", "John", Sex::Male, vec![])],
    vec![
      family("@F1@", Some("@I1@"), Some("@I9@"), &["@I8@"], vec![]),
      family(
        "@F2@",
        None,
        Some("@I7@"),
        &[],
        vec![event(EventKind::Marriage, Some("1920-01-01"), None)],
      ),
    ],
  );

  let report = load(&s, b).await.unwrap();
  assert_eq!(report.families, 2);
  assert_eq!(report.family_children, 0);
  assert_eq!(report.dropped_family_events, 1);
  assert_eq!(report.events, 0);

  let refs: Vec<_> =
    report.unresolved_refs.iter().map(|r| (r.target_xref.as_str(), r.role)).collect();
  assert_eq!(refs, [("@I9@", RefRole::Spouse), ("@I7@", RefRole::Spouse), ("@I8@", RefRole::Child)]);
}

#[tokio::test]
async fn family_events_carry_the_family_id() {
  let s = store().await;
  load(&s, household()).await.unwrap();

  for xref in ["@I1@", "@I2@"] {
    let id = person_id(&s, xref).await;
    let marriage = s
      .person_events(id)
      .await
      .unwrap()
      .into_iter()
      .find(|e| e.kind == EventKind::Marriage)
      .expect("marriage per spouse");
    assert!(marriage.family_id.is_some());
  }
}

#[tokio::test]
async fn repeated_child_link_is_stored_once() {
  let s = store().await;
  let mut b = household();
  b.families[0].children.push(NewFamilyChild {
    child_xref:   "@I3@".into(),
    relationship: ChildRelationship::Adopted,
  });

  let report = load(&s, b).await.unwrap();
  assert_eq!(report.family_children, 1);
  let snapshot = s.kinship_snapshot().await.unwrap();
  assert_eq!(snapshot.children.len(), 1);
  assert_eq!(snapshot.children[0].relationship, ChildRelationship::Biological);
}

// ─── Persons ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_and_review_updates() {
  let s = store().await;
  load(&s, household()).await.unwrap();
  let id = person_id(&s, "@I1@").await;

  let p = s
    .update_profile(id, ProfileUpdate { notes: Some("farmer".into()), biography: None })
    .await
    .unwrap();
  assert_eq!(p.notes.as_deref(), Some("farmer"));
  assert_eq!(p.given_name.as_deref(), Some("John"));

  let p = s
    .update_profile(id, ProfileUpdate { notes: None, biography: Some("Born in Boston.".into()) })
    .await
    .unwrap();
  assert_eq!(p.notes.as_deref(), Some("farmer"));
  assert_eq!(p.biography.as_deref(), Some("Born in Boston."));

  s.set_needs_review(id, true).await.unwrap();
  assert!(s.get_person(id).await.unwrap().unwrap().needs_review);

  assert!(matches!(s.set_needs_review(999, true).await, Err(Error::PersonNotFound(999))));
  assert!(s.get_person(999).await.unwrap().is_none());
}

#[tokio::test]
async fn spouse_deaths_use_the_earliest_death() {
  let s = store().await;
  let mut b = household();
  b.persons[1].events.push(event(EventKind::Death, Some("1960-02-02"), None));
  b.persons[1].events.push(event(EventKind::Death, Some("1950-02-02"), None));
  load(&s, b).await.unwrap();

  let john = person_id(&s, "@I1@").await;
  let mary = person_id(&s, "@I2@").await;
  let deaths = s.spouse_deaths(john).await.unwrap();
  assert_eq!(deaths.len(), 1);
  assert_eq!(deaths[0].spouse_id, mary);
  assert_eq!(deaths[0].death.map(|d| d.to_string()).as_deref(), Some("1950-02-02"));

  let deaths = s.spouse_deaths(mary).await.unwrap();
  assert_eq!(deaths[0].spouse_id, john);
  assert_eq!(deaths[0].death, None);
}

// ─── Conflicts ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_validation_marks_events_and_is_idempotent() {
  let s = store().await;
  load(&s, household()).await.unwrap();
  let john = person_id(&s, "@I1@").await;
  let events = s.person_events(john).await.unwrap();
  let (birth, marriage) = (events[0].id, events[1].id);

  let found = vec![NewConflict::new(
    john,
    ConflictType::DuplicateEvent,
    Some(marriage),
    Some(birth),
    "duplicate",
  )];
  let write = s.record_validation(john, found.clone()).await.unwrap();
  assert_eq!(write.inserted, 1);
  assert!(write.needs_review);

  let again = s.record_validation(john, found).await.unwrap();
  assert_eq!(again.inserted, 0);
  assert_eq!(s.stats().await.unwrap().conflicts, 1);

  let statuses: Vec<_> =
    s.person_events(john).await.unwrap().iter().map(|e| e.validation_status).collect();
  assert_eq!(statuses, [ValidationStatus::Conflict, ValidationStatus::Conflict]);
  assert!(s.get_person(john).await.unwrap().unwrap().needs_review);

  let ann = person_id(&s, "@I3@").await;
  let clean = s.record_validation(ann, vec![]).await.unwrap();
  assert!(!clean.needs_review);
  let ann_events = s.person_events(ann).await.unwrap();
  assert!(ann_events.iter().all(|e| e.validation_status == ValidationStatus::Valid));
}

#[tokio::test]
async fn conflicts_list_most_severe_first() {
  let s = store().await;
  load(&s, household()).await.unwrap();
  let john = person_id(&s, "@I1@").await;
  let mary = person_id(&s, "@I2@").await;

  s.record_validation(john, vec![
    NewConflict::new(john, ConflictType::DuplicateEvent, None, None, "info"),
    NewConflict::new(john, ConflictType::FutureDate, None, None, "warning"),
  ])
  .await
  .unwrap();
  s.record_validation(mary, vec![NewConflict::new(
    mary,
    ConflictType::DeathBeforeBirth,
    None,
    None,
    "error",
  )])
  .await
  .unwrap();

  let all = s.unresolved_conflicts().await.unwrap();
  let severities: Vec<_> = all.iter().map(|c| c.severity).collect();
  assert_eq!(severities, [Severity::Error, Severity::Warning, Severity::Info]);

  let johns = s
    .list_conflicts(&ConflictQuery { person_id: Some(john), ..ConflictQuery::default() })
    .await
    .unwrap();
  assert_eq!(johns.len(), 2);

  let warnings = s
    .list_conflicts(&ConflictQuery { severity: Some(Severity::Warning), ..ConflictQuery::default() })
    .await
    .unwrap();
  assert_eq!(warnings.len(), 1);
  assert_eq!(warnings[0].conflict_type, ConflictType::FutureDate);

  let first = s
    .list_conflicts(&ConflictQuery { limit: Some(1), ..ConflictQuery::default() })
    .await
    .unwrap();
  assert_eq!(first[0].severity, Severity::Error);
}

#[tokio::test]
async fn confirming_a_conflict_validates_its_event() {
  let s = store().await;
  load(&s, household()).await.unwrap();
  let john = person_id(&s, "@I1@").await;
  let birth = s.person_events(john).await.unwrap()[0].id;

  s.record_validation(john, vec![NewConflict::new(
    john,
    ConflictType::FutureDate,
    Some(birth),
    None,
    "future",
  )])
  .await
  .unwrap();
  let conflict = s.unresolved_conflicts().await.unwrap().remove(0);

  let resolved = resolve(&conflict, "tester", |_| Ok(Resolution::Confirmed));
  let stored = s.apply_resolution(resolved).await.unwrap();

  assert_eq!(stored.resolution, Some(Resolution::Confirmed));
  assert_eq!(stored.resolved_by.as_deref(), Some("tester"));
  assert!(stored.resolved_at.is_some());
  assert_eq!(stored.description, "future");

  let birth_event = s.person_events(john).await.unwrap().remove(0);
  assert_eq!(birth_event.validation_status, ValidationStatus::Valid);
  assert!(!s.get_person(john).await.unwrap().unwrap().needs_review);
  assert!(s.unresolved_conflicts().await.unwrap().is_empty());

  let fetched = s.get_conflict(stored.id).await.unwrap().unwrap();
  assert_eq!(fetched, stored);
}

#[tokio::test]
async fn needs_review_resolution_keeps_the_person_flagged() {
  let s = store().await;
  load(&s, household()).await.unwrap();
  let john = person_id(&s, "@I1@").await;

  s.record_validation(john, vec![NewConflict::new(
    john,
    ConflictType::NegativeAge,
    None,
    None,
    "before birth",
  )])
  .await
  .unwrap();
  let conflict = s.unresolved_conflicts().await.unwrap().remove(0);

  s.apply_resolution(resolve(&conflict, "non-interactive", |_| Ok(Resolution::NeedsReview)))
    .await
    .unwrap();

  assert!(s.unresolved_conflicts().await.unwrap().is_empty());
  assert!(s.get_person(john).await.unwrap().unwrap().needs_review);
}

#[tokio::test]
async fn resolving_a_missing_conflict_is_not_found() {
  let s = store().await;
  load(&s, household()).await.unwrap();
  let john = person_id(&s, "@I1@").await;

  s.record_validation(john, vec![NewConflict::new(john, ConflictType::FutureDate, None, None, "x")])
    .await
    .unwrap();
  let mut conflict = s.unresolved_conflicts().await.unwrap().remove(0);
  conflict.id = 4242;

  let err = s
    .apply_resolution(resolve(&conflict, "tester", |_| Ok(Resolution::Rejected)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ConflictNotFound(4242)));
}

// ─── Locations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn geocode_outcomes_and_retry() {
  let s = store().await;
  load(&s, household()).await.unwrap();

  let pending = s.pending_locations(None).await.unwrap();
  assert_eq!(pending.len(), 2);
  assert_eq!(s.pending_locations(Some(1)).await.unwrap().len(), 1);

  let coords = Coordinates { latitude: 42.36, longitude: -71.06 };
  s.record_geocode(pending[0].id, GeocodeOutcome::Success(coords)).await.unwrap();
  s.record_geocode(pending[1].id, GeocodeOutcome::Failed).await.unwrap();

  let geocoded = s.list_locations(Some(GeocodeStatus::Success)).await.unwrap();
  assert_eq!(geocoded.len(), 1);
  assert_eq!(geocoded[0].latitude, Some(42.36));
  assert!(s.pending_locations(None).await.unwrap().is_empty());

  assert_eq!(s.retry_failed_locations().await.unwrap(), 1);
  assert_eq!(s.pending_locations(None).await.unwrap().len(), 1);

  let err = s.record_geocode(999, GeocodeOutcome::Skipped).await.unwrap_err();
  assert!(matches!(err, Error::LocationNotFound(999)));
}

#[tokio::test]
async fn merge_moves_every_event_to_the_target() {
  let s = store().await;
  let b = batch(
    vec![
      person("@I1@", "John", Sex::Male, vec![event(EventKind::Birth, Some("1900-01-01"), Some("Boston, MA"))]),
      person("@I2@", "Mary", Sex::Female, vec![event(EventKind::Birth, Some("1902-01-01"), Some("boston, ma"))]),
      person("@I3@", "Ann", Sex::Female, vec![event(EventKind::Birth, Some("1930-01-01"), Some("Boston,MA"))]),
    ],
    vec![],
  );
  load(&s, b).await.unwrap();

  let locations = s.list_locations(None).await.unwrap();
  assert_eq!(locations.len(), 3);
  let target = locations[0].id;
  let sources: Vec<_> = locations[1..].iter().map(|l| l.id).collect();

  let merge = s.merge_locations(target, sources.clone()).await.unwrap();
  assert_eq!(merge.target.id, target);
  assert_eq!(merge.merged_count, 2);
  assert_eq!(merge.events_updated, 2);

  assert_eq!(s.list_locations(None).await.unwrap().len(), 1);
  for p in s.list_persons().await.unwrap() {
    for e in s.person_events(p.id).await.unwrap() {
      assert_eq!(e.location_id, Some(target));
    }
  }

  let err = s.merge_locations(target, sources).await.unwrap_err();
  assert!(matches!(err, Error::LocationNotFound(_)));
  let err = s.merge_locations(target, vec![target]).await.unwrap_err();
  assert!(matches!(err, Error::NothingToMerge));
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_and_stats_reflect_the_load() {
  let s = store().await;
  load(&s, household()).await.unwrap();

  let snapshot = s.kinship_snapshot().await.unwrap();
  assert_eq!(snapshot.persons.len(), 3);
  assert_eq!(snapshot.families.len(), 1);
  assert_eq!(snapshot.children.len(), 1);

  let f = &snapshot.families[0];
  assert_eq!(f.xref, "@F1@");
  assert_eq!(f.spouse1_id, Some(snapshot.persons[0].id));
  assert_eq!(f.spouse2_id, Some(snapshot.persons[1].id));
  assert_eq!(snapshot.children[0].child_id, snapshot.persons[2].id);

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.persons, 3);
  assert_eq!(stats.families, 1);
  assert_eq!(stats.events, 5);
  assert_eq!(stats.locations, 2);
  assert_eq!(stats.locations_pending, 2);
  assert_eq!(stats.locations_geocoded, 0);
  assert_eq!(stats.conflicts, 0);
  assert_eq!(stats.persons_needing_review, 0);
}
