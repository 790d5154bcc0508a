//! Core types and trait definitions for the Stamm genealogy store.
//!
//! This crate is deliberately free of parsing, HTTP and database
//! dependencies. The validation rules, the conflict resolver and the kinship
//! graph algorithms live here as pure functions over domain types, so every
//! other crate can share them.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod conflict;
pub mod date;
pub mod error;
pub mod event;
pub mod kinship;
pub mod load;
pub mod location;
pub mod person;
pub mod resolve;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
