//! # DocBridge Value
//!
//! Storable value model for DocBridge.
//!
//! This crate provides:
//! - [`Datum`] — the dynamic value a document field can hold
//! - [`Document`] — an ordered field-name → datum map, one per stored entity
//! - Canonical bytewise ordering of datums for key comparison
//! - CBOR encoding/decoding of documents at the store boundary
//! - [`GeometryValue`] — the capability trait external geometry types
//!   implement so the bridge can compare them structurally
//!
//! The underlying document store compares *encoded* representations, never
//! domain-object identity. Everything in this crate is therefore defined
//! structurally: two datums with equal contents are equal, regardless of how
//! they were produced.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod datum;
mod document;
mod error;
mod geometry;

pub use datum::Datum;
pub use document::Document;
pub use error::{ValueError, ValueResult};
pub use geometry::{GeometryFingerprint, GeometryValue, StoredGeometry};
