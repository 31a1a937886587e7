//! # DocBridge Store
//!
//! The underlying document store boundary for DocBridge.
//!
//! This crate defines the seam the bridge consumes: a store that can open a
//! collection per entity-type name and perform CRUD + scan on it, keyed by
//! comparable key bytes and holding encoded document bytes. Stores are
//! **opaque byte containers** — the bridge owns all document interpretation;
//! stores do not understand entity types, mappings, or queries.
//!
//! [`InMemoryStore`] is the bundled implementation, suitable for tests and
//! ephemeral databases. Persistent stores implement the same traits;
//! the on-disk format is entirely theirs.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use store::{DocumentStore, StoreCollection};
