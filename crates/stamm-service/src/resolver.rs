//! The resolution stage: decide every unresolved conflict.

use serde::Serialize;
use stamm_core::{
  conflict::Resolution,
  resolve::{DecisionSource, resolve_with},
  store::GenealogyStore,
};
use tracing::{debug, info};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
  pub confirmed:    usize,
  pub rejected:     usize,
  pub needs_review: usize,
  pub auto_fixed:   usize,
}

impl ResolutionSummary {
  pub fn total(&self) -> usize {
    self.confirmed + self.rejected + self.needs_review + self.auto_fixed
  }

  fn record(&mut self, resolution: Resolution) {
    match resolution {
      Resolution::Confirmed => self.confirmed += 1,
      Resolution::Rejected => self.rejected += 1,
      Resolution::NeedsReview => self.needs_review += 1,
      Resolution::AutoFixed => self.auto_fixed += 1,
    }
  }
}

/// Resolve every unresolved conflict, most severe first. Without a decision
/// source each one is left for review.
pub async fn resolve_all<S>(
  store: &S,
  mut source: Option<&mut dyn DecisionSource>,
) -> Result<ResolutionSummary>
where
  S: GenealogyStore,
{
  let conflicts = store.unresolved_conflicts().await.map_err(Error::store)?;
  let mut summary = ResolutionSummary::default();

  for conflict in &conflicts {
    let resolved = resolve_with(conflict, source.as_deref_mut());
    debug!(
      conflict_id = conflict.id,
      resolution = %resolved.resolution,
      by = %resolved.resolved_by,
      "resolved"
    );
    summary.record(resolved.resolution);
    store.apply_resolution(resolved).await.map_err(Error::store)?;
  }

  info!(
    resolved = summary.total(),
    confirmed = summary.confirmed,
    rejected = summary.rejected,
    needs_review = summary.needs_review,
    "resolution finished"
  );
  Ok(summary)
}
