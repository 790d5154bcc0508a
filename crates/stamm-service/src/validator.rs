//! The validation stage: run the conflict rules over every person and record
//! what they find.

use chrono::Utc;
use serde::Serialize;
use stamm_core::{date::CalendarDate, store::GenealogyStore, validate::check_person};
use tracing::{debug, info};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
  pub persons_checked: usize,
  /// Persons left with an open conflict.
  pub persons_flagged: usize,
  /// Conflicts the rules reported, including ones already on record.
  pub conflicts_found: usize,
  /// Conflicts newly written by this run.
  pub conflicts_new:   usize,
}

/// Today's date in UTC, the reference point for future-date checks.
pub fn today() -> CalendarDate { Utc::now().date_naive().into() }

/// Validate every person in the store. Rule hits never fail the stage.
pub async fn validate_all<S>(store: &S, today: CalendarDate) -> Result<ValidationSummary>
where
  S: GenealogyStore,
{
  let persons = store.list_persons().await.map_err(Error::store)?;
  let mut summary = ValidationSummary::default();

  for person in &persons {
    let events = store.person_events(person.id).await.map_err(Error::store)?;
    let spouse_deaths = store.spouse_deaths(person.id).await.map_err(Error::store)?;

    let found = check_person(person, &events, &spouse_deaths, today);
    for c in &found {
      debug!(person_id = person.id, conflict = %c.conflict_type, "{}", c.description);
    }
    summary.conflicts_found += found.len();

    let write = store.record_validation(person.id, found).await.map_err(Error::store)?;
    summary.conflicts_new += write.inserted;
    summary.persons_checked += 1;
    if write.needs_review {
      summary.persons_flagged += 1;
    }
  }

  info!(
    persons = summary.persons_checked,
    flagged = summary.persons_flagged,
    conflicts = summary.conflicts_found,
    new = summary.conflicts_new,
    "validation finished"
  );
  Ok(summary)
}
