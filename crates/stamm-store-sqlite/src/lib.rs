//! SQLite backend for the Stamm genealogy store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every multi-row write (a load, one
//! person's validation results, a resolution, a location merge) is a single
//! transaction.

mod encode;
mod load;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
