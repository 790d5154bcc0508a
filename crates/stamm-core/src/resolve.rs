//! Turning unresolved conflicts into resolution decisions.
//!
//! [`resolve`] is independent of where a decision comes from. Callers pass a
//! closure; the [`DecisionSource`] trait is the stateful form of the same
//! thing, used by the pipeline so an interactive prompt and a fixed policy
//! are interchangeable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  conflict::{Conflict, ConflictId, Resolution},
  event::{EventId, ValidationStatus},
  person::PersonId,
};

/// A decision source failed to produce an answer.
#[derive(Debug, Error)]
#[error("decision source failed: {0}")]
pub struct DecisionError(pub String);

impl DecisionError {
  pub fn new(msg: impl Into<String>) -> Self { Self(msg.into()) }
}

/// A conflict together with the decision taken on it, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConflict {
  pub conflict_id:  ConflictId,
  pub person_id:    PersonId,
  pub event_id:     Option<EventId>,
  pub resolution:   Resolution,
  pub resolved_by:  String,
  pub notes:        Option<String>,
  /// New validation status for the conflict's primary event, if the
  /// resolution changes it.
  pub event_status: Option<ValidationStatus>,
}

/// Validation status a resolution implies for the triggering event.
pub fn event_status_for(resolution: Resolution) -> Option<ValidationStatus> {
  match resolution {
    Resolution::Confirmed => Some(ValidationStatus::Valid),
    Resolution::Rejected => Some(ValidationStatus::NeedsReview),
    Resolution::NeedsReview | Resolution::AutoFixed => None,
  }
}

/// Resolve one conflict with `decide`. A failing decision falls back to
/// [`Resolution::NeedsReview`] and the failure is kept in the notes.
pub fn resolve<F>(conflict: &Conflict, resolved_by: &str, decide: F) -> ResolvedConflict
where
  F: FnOnce(&Conflict) -> Result<Resolution, DecisionError>,
{
  let (resolution, notes) = match decide(conflict) {
    Ok(r) => (r, None),
    Err(e) => (Resolution::NeedsReview, Some(e.to_string())),
  };
  ResolvedConflict {
    conflict_id: conflict.id,
    person_id: conflict.person_id,
    event_id: conflict.event_id,
    resolution,
    resolved_by: resolved_by.to_string(),
    notes,
    event_status: event_status_for(resolution),
  }
}

// ─── Decision sources ────────────────────────────────────────────────────────

/// Something that can decide conflicts, e.g. an operator at a terminal.
pub trait DecisionSource: Send {
  /// Recorded as `resolved_by`.
  fn name(&self) -> &str;

  fn decide(&mut self, conflict: &Conflict) -> Result<Resolution, DecisionError>;
}

/// The default policy: every conflict is left for review.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl DecisionSource for NonInteractive {
  fn name(&self) -> &str { "non-interactive" }

  fn decide(&mut self, _conflict: &Conflict) -> Result<Resolution, DecisionError> {
    Ok(Resolution::NeedsReview)
  }
}

/// Resolve with an optional source; without one the default policy applies.
pub fn resolve_with(
  conflict: &Conflict,
  source: Option<&mut (dyn DecisionSource + '_)>,
) -> ResolvedConflict {
  match source {
    Some(source) => {
      let name = source.name().to_string();
      resolve(conflict, &name, |c| source.decide(c))
    }
    None => resolve(conflict, NonInteractive.name(), |c| NonInteractive.decide(c)),
  }
}
