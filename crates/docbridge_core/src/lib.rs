//! # DocBridge Core
//!
//! The bridge between a typed entity/query abstraction and a schemaless,
//! collection-based document store.
//!
//! This crate provides:
//! - An entity model ([`EntityType`], [`Property`]) and materialized
//!   instances ([`Entity`])
//! - A type mapping registry with structural comparers for byte sequences,
//!   arrays, and capability-resolved geometry values
//! - Per-entity-type tables over a [`docbridge_store::DocumentStore`], held
//!   in a process-wide [`StoreCache`]
//! - A transactional save pipeline applying tracked [`ChangeEntry`] batches
//!   all-or-nothing
//! - A query translator that pushes safe predicates down to documents and
//!   evaluates the residue locally against materialized entities
//!
//! # Example
//!
//! ```rust
//! use docbridge_core::{Bridge, ChangeEntry, Entity, EntityType, Expr, Query, Value, ValueKind};
//!
//! let person = EntityType::builder("Person")
//!     .key_property("Id", ValueKind::Int)
//!     .property("Name", ValueKind::Text)
//!     .build()
//!     .unwrap();
//!
//! let bridge = Bridge::in_memory();
//! let db = bridge.session();
//!
//! let mut ann = Entity::new(person.clone());
//! ann.set("Id", Value::Int(1)).unwrap();
//! ann.set("Name", Value::Text("Ann".into())).unwrap();
//! db.save_changes(&[ChangeEntry::added(ann)]).unwrap();
//!
//! let query = Query::new().filter(Expr::prop("Name").eq(Expr::text("Ann")));
//! let results: Vec<Entity> = db
//!     .execute(&person, query)
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(results.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod change;
mod database;
mod error;
mod generator;
mod mapping;
mod materializer;
mod model;
mod query;
mod table;
mod transaction;

pub use cache::StoreCache;
pub use change::{ChangeEntry, EntityState};
pub use database::{Bridge, Database};
pub use error::{BridgeError, BridgeResult};
pub use generator::{ValueGenerator, ValueGeneratorSelector};
pub use mapping::{TypeMapping, TypeMappingRegistry};
pub use materializer::{Materializer, MaterializerFactory};
pub use model::{Entity, EntityType, EntityTypeBuilder, Key, Property, Value, ValueKind};
pub use query::{CompareOp, ComputedExpr, Direction, Expr, Query, QueryPlan, QueryResults};
pub use table::Table;
pub use transaction::{TransactionManager, TransactionState};

pub use docbridge_value::{Datum, Document, GeometryValue, StoredGeometry};
