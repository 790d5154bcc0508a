//! The ingest pipeline: parse → normalise → load → validate → resolve, then
//! optionally geocode.
//!
//! Every stage gets what it needs from an explicit [`IngestContext`]; there
//! is no shared global state. The store's ingest lock is held from the load
//! through resolution and is released whether or not those stages succeed.
//! Geocoding runs after the lock is released and can only degrade location
//! data.

use std::sync::Arc;

use serde::Serialize;
use stamm_core::{load::LoadReport, resolve::DecisionSource, store::GenealogyStore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  build::{build_batch, source_digest},
  geocode::{self, GeocodeSettings, GeocodeSummary, Geocoder},
  resolver::{ResolutionSummary, resolve_all},
  validator::{ValidationSummary, today, validate_all},
};

/// Capabilities the pipeline runs with.
pub struct IngestContext<'a, S> {
  pub store:     Arc<S>,
  /// Who decides conflicts. `None` leaves every conflict for review.
  pub decisions: Option<&'a mut dyn DecisionSource>,
  /// Needed only when geocoding is requested.
  pub geocoder:  Option<Arc<dyn Geocoder>>,
  pub geocode:   GeocodeSettings,
}

impl<S> IngestContext<'_, S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, decisions: None, geocoder: None, geocode: GeocodeSettings::default() }
  }
}

/// The bytes to ingest and a label for the audit trail.
#[derive(Debug, Clone)]
pub struct IngestSource {
  pub name:  String,
  pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
  /// Clear previously loaded data inside the load transaction.
  pub replace:       bool,
  pub geocode:       bool,
  /// Geocode at most this many locations.
  pub geocode_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
  pub run_id:          Uuid,
  pub persons_loaded:  usize,
  pub families_loaded: usize,
  pub conflicts_found: usize,
  pub load:            LoadReport,
  pub validation:      ValidationSummary,
  pub resolution:      ResolutionSummary,
  /// Present when geocoding ran.
  pub geocode:         Option<GeocodeSummary>,
}

/// Run the whole pipeline over one source.
pub async fn ingest<S>(
  ctx: IngestContext<'_, S>,
  source: IngestSource,
  options: IngestOptions,
) -> Result<IngestSummary>
where
  S: GenealogyStore + 'static,
{
  let IngestContext { store, decisions, geocoder, geocode: settings } = ctx;

  let doc = stamm_gedcom::parse(&source.bytes)?;
  let batch = build_batch(&doc, &source.name, source_digest(&source.bytes), options.replace);
  info!(
    source = %source.name,
    individuals = batch.persons.len(),
    families = batch.families.len(),
    "parsed source"
  );

  let run_id = Uuid::new_v4();
  store.acquire_ingest_lock(run_id).await.map_err(Error::store)?;
  info!(%run_id, "ingest lock acquired");

  let locked = async {
    let load = store.load(run_id, batch).await.map_err(Error::store)?;
    log_load(&load);
    let validation = validate_all(store.as_ref(), today()).await?;
    let resolution = resolve_all(store.as_ref(), decisions).await?;
    Ok::<_, Error>((load, validation, resolution))
  }
  .await;

  if let Err(e) = store.release_ingest_lock(run_id).await {
    warn!(%run_id, error = %e, "failed to release ingest lock");
  }
  let (load, validation, resolution) = locked?;

  let geocoded = match (options.geocode, geocoder) {
    (true, Some(geocoder)) => {
      let settings = GeocodeSettings { limit: options.geocode_limit, ..settings };
      match geocode::spawn(Arc::clone(&store), geocoder, settings).finish().await {
        Ok(summary) => Some(summary),
        Err(e) => {
          warn!(%run_id, error = %e, "geocoding stage failed; loaded data is unaffected");
          None
        }
      }
    }
    (true, None) => {
      warn!("geocoding requested but no geocoder is configured");
      None
    }
    (false, _) => None,
  };

  let summary = IngestSummary {
    run_id,
    persons_loaded: load.persons,
    families_loaded: load.families,
    conflicts_found: validation.conflicts_found,
    load,
    validation,
    resolution,
    geocode: geocoded,
  };
  info!(
    %run_id,
    persons = summary.persons_loaded,
    families = summary.families_loaded,
    conflicts = summary.conflicts_found,
    "ingest finished"
  );
  Ok(summary)
}

fn log_load(report: &LoadReport) {
  info!(
    persons = report.persons,
    families = report.families,
    children = report.family_children,
    events = report.events,
    locations = report.locations_created,
    "load committed"
  );
  for r in &report.unresolved_refs {
    warn!(family = %r.family_xref, target = %r.target_xref, role = ?r.role, "dangling reference");
  }
  if report.dropped_family_events > 0 {
    warn!(count = report.dropped_family_events, "family events dropped: no resolvable spouse");
  }
}
