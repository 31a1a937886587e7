//! Entity model: types, properties, values, and materialized instances.

mod entity;
mod entity_type;
mod value;

pub use entity::Entity;
pub use entity_type::{EntityType, EntityTypeBuilder, Property};
pub use value::{Value, ValueKind};

use crate::error::BridgeResult;
use docbridge_value::Datum;
use std::fmt;

/// A primary key value: the datums of an entity's key properties, in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(Vec<Datum>);

impl Key {
    /// Creates a key from its datums.
    #[must_use]
    pub fn new(datums: Vec<Datum>) -> Self {
        Self(datums)
    }

    /// Returns the key's datums.
    #[must_use]
    pub fn datums(&self) -> &[Datum] {
        &self.0
    }

    /// Encodes the key to deterministic bytes for the store.
    pub fn encode(&self) -> BridgeResult<Vec<u8>> {
        Ok(Datum::encode_key(&self.0)?)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, datum) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match datum {
                Datum::Null => write!(f, "null")?,
                Datum::Bool(b) => write!(f, "{b}")?,
                Datum::Int(n) => write!(f, "{n}")?,
                Datum::Float(x) => write!(f, "{x}")?,
                Datum::Text(s) => write!(f, "{s:?}")?,
                Datum::Bytes(b) => write!(f, "{b:02x?}")?,
                Datum::Array(_) => write!(f, "[..]")?,
            }
        }
        write!(f, ")")
    }
}
