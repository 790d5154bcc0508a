//! Background geocoding stage.
//!
//! Runs on its own tokio task so that a slow or failing geocoder never
//! holds up (or rolls back) the load. Requests are paced by a
//! [`tokio::time::interval`]; each outcome is written to the store as soon
//! as it is known. Progress is reported on an `mpsc` channel and the run
//! stops early when [`GeocodeHandle::cancel`] is called or the handle is
//! dropped.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde::Serialize;
use stamm_core::{
  location::{Coordinates, GeocodeOutcome, Location, LocationId},
  store::GenealogyStore,
};
use thiserror::Error;
use tokio::{
  sync::{mpsc, watch},
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{Error, Result};

// ─── Capability ──────────────────────────────────────────────────────────────

/// A failed lookup. Only the one location is affected.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GeocodeError(String);

impl GeocodeError {
  pub fn new(message: impl Into<String>) -> Self { Self(message.into()) }
}

pub type GeocodeFuture<'a> =
  Pin<Box<dyn Future<Output = Result<Option<Coordinates>, GeocodeError>> + Send + 'a>>;

/// Resolves a place name to coordinates. `Ok(None)` means the service had
/// no match.
pub trait Geocoder: Send + Sync {
  fn geocode<'a>(&'a self, query: &'a str) -> GeocodeFuture<'a>;
}

// ─── Settings and reports ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GeocodeSettings {
  /// Minimum spacing between two requests.
  pub interval: Duration,
  /// Geocode at most this many pending locations.
  pub limit:    Option<usize>,
}

impl Default for GeocodeSettings {
  fn default() -> Self { Self { interval: Duration::from_millis(1100), limit: None } }
}

/// Sent after every location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeocodeProgress {
  pub location_id: LocationId,
  pub outcome:     GeocodeOutcome,
  pub done:        usize,
  pub total:       usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeocodeSummary {
  pub processed: usize,
  pub succeeded: usize,
  pub failed:    usize,
  pub skipped:   usize,
  /// Stopped before every pending location was processed.
  pub cancelled: bool,
}

impl GeocodeSummary {
  fn record(&mut self, outcome: GeocodeOutcome) {
    self.processed += 1;
    match outcome {
      GeocodeOutcome::Success(_) => self.succeeded += 1,
      GeocodeOutcome::Failed => self.failed += 1,
      GeocodeOutcome::Skipped => self.skipped += 1,
    }
  }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// A running geocoding stage.
pub struct GeocodeHandle {
  progress: mpsc::Receiver<GeocodeProgress>,
  cancel:   watch::Sender<bool>,
  task:     JoinHandle<Result<GeocodeSummary>>,
}

impl GeocodeHandle {
  /// Ask the stage to stop after the location in flight.
  pub fn cancel(&self) { self.cancel.send_replace(true); }

  /// The next progress report, or `None` once the stage has finished.
  pub async fn progress(&mut self) -> Option<GeocodeProgress> { self.progress.recv().await }

  /// Drain remaining progress and wait for the stage to end.
  pub async fn finish(self) -> Result<GeocodeSummary> {
    let Self { mut progress, cancel, task } = self;
    while let Some(p) = progress.recv().await {
      debug!(location_id = p.location_id, done = p.done, total = p.total, "geocoded");
    }
    let summary = task.await??;
    drop(cancel);
    Ok(summary)
  }
}

/// Start geocoding the store's pending locations on a new task.
pub fn spawn<S>(store: Arc<S>, geocoder: Arc<dyn Geocoder>, settings: GeocodeSettings) -> GeocodeHandle
where
  S: GenealogyStore + 'static,
{
  let (progress_tx, progress_rx) = mpsc::channel(64);
  let (cancel_tx, cancel_rx) = watch::channel(false);
  let task = tokio::spawn(run(store, geocoder, settings, progress_tx, cancel_rx));
  GeocodeHandle { progress: progress_rx, cancel: cancel_tx, task }
}

// ─── Stage ───────────────────────────────────────────────────────────────────

/// Place text no geocoder can do anything with.
fn is_ungeocodable(text: &str) -> bool {
  let text = text.trim();
  text.is_empty() || text.eq_ignore_ascii_case("unknown")
}

/// True once cancellation was requested or the handle is gone.
fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
  *cancel.borrow() || cancel.has_changed().is_err()
}

/// Resolves when cancellation is requested or the handle is dropped.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
  while !*cancel.borrow_and_update() {
    if cancel.changed().await.is_err() {
      return;
    }
  }
}

async fn lookup(geocoder: &dyn Geocoder, location: &Location) -> GeocodeOutcome {
  match geocoder.geocode(location.search_text().trim()).await {
    Ok(Some(coords)) => GeocodeOutcome::Success(coords),
    Ok(None) => {
      debug!(location_id = location.id, "no geocode match");
      GeocodeOutcome::Failed
    }
    Err(e) => {
      warn!(location_id = location.id, error = %e, "geocode request failed");
      GeocodeOutcome::Failed
    }
  }
}

async fn run<S>(
  store: Arc<S>,
  geocoder: Arc<dyn Geocoder>,
  settings: GeocodeSettings,
  progress: mpsc::Sender<GeocodeProgress>,
  mut cancel: watch::Receiver<bool>,
) -> Result<GeocodeSummary>
where
  S: GenealogyStore,
{
  let pending = store.pending_locations(settings.limit).await.map_err(Error::store)?;
  let total = pending.len();
  info!(total, interval_ms = settings.interval.as_millis() as u64, "geocoding pending locations");

  let mut summary = GeocodeSummary::default();
  let mut ticker = tokio::time::interval(settings.interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  for location in pending {
    if is_cancelled(&cancel) {
      summary.cancelled = true;
      break;
    }

    let outcome = if is_ungeocodable(location.search_text()) {
      GeocodeOutcome::Skipped
    } else {
      tokio::select! {
        biased;
        _ = cancelled(&mut cancel) => {
          summary.cancelled = true;
          break;
        }
        _ = ticker.tick() => {}
      }
      lookup(geocoder.as_ref(), &location).await
    };

    store.record_geocode(location.id, outcome).await.map_err(Error::store)?;
    summary.record(outcome);

    let report = GeocodeProgress { location_id: location.id, outcome, done: summary.processed, total };
    if progress.send(report).await.is_err() {
      debug!("progress receiver dropped");
    }
  }

  info!(
    processed = summary.processed,
    succeeded = summary.succeeded,
    failed = summary.failed,
    skipped = summary.skipped,
    cancelled = summary.cancelled,
    "geocoding finished"
  );
  Ok(summary)
}
