//! Orchestration for Stamm.
//!
//! Ties the GEDCOM codec, the pure rules in `stamm-core` and any
//! [`stamm_core::store::GenealogyStore`] backend together:
//!
//! - [`pipeline::ingest`] runs parse → normalise → load → validate →
//!   resolve under the store's ingest lock, then optionally geocodes;
//! - [`geocode::spawn`] runs the rate-limited geocoding stage on its own
//!   task;
//! - [`kinship::KinshipService`] answers tree, family and path queries from
//!   per-query snapshots.

pub mod build;
pub mod error;
pub mod geocode;
pub mod kinship;
pub mod pipeline;
pub mod resolver;
pub mod validator;

pub use error::{Error, Result};
pub use geocode::{Geocoder, GeocodeError, GeocodeFuture};
pub use kinship::KinshipService;
pub use pipeline::{IngestContext, IngestOptions, IngestSource, IngestSummary, ingest};
