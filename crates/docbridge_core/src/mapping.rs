//! Type mapping registry and structural comparers.
//!
//! The store compares serialized values, never domain-object identity, so
//! every mapping must supply equality/ordering semantics that survive the
//! round trip: element-wise for byte sequences and arrays, field-wise for
//! geometry, plain value comparison for scalars and text.

use crate::error::{BridgeError, BridgeResult};
use crate::model::{Value, ValueKind};
use docbridge_value::{Datum, GeometryValue, StoredGeometry};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Equality and ordering semantics for one value kind.
trait ValueComparer: Send + Sync + fmt::Debug {
    /// Compares two values. `None` means the pair is unordered, which a
    /// predicate treats as "not equal / not less / not greater".
    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering>;

    fn equals(&self, a: &Value, b: &Value) -> bool {
        self.compare(a, b) == Some(Ordering::Equal)
    }
}

/// Default comparer for scalar and text kinds.
#[derive(Debug)]
struct DefaultComparer;

impl ValueComparer for DefaultComparer {
    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        a.structural_cmp(b)
    }
}

/// Element-wise comparer for byte sequences.
///
/// Two distinct buffers with equal contents must compare equal; identity
/// comparison would break change detection and key lookup.
#[derive(Debug)]
struct BytesComparer;

impl ValueComparer for BytesComparer {
    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bytes(a), Value::Bytes(b)) => {
                for (av, bv) in a.iter().zip(b.iter()) {
                    match av.cmp(bv) {
                        Ordering::Equal => {}
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

/// Element-wise comparer for homogeneous arrays.
#[derive(Debug)]
struct ArrayComparer {
    element: Arc<dyn ValueComparer>,
}

impl ValueComparer for ArrayComparer {
    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Array(a), Value::Array(b)) => {
                for (av, bv) in a.iter().zip(b.iter()) {
                    match self.element.compare(av, bv)? {
                        Ordering::Equal => {}
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

/// Field-wise comparer for geometry values.
///
/// Constructed from the [`GeometryValue`] capability, not from a fixed list
/// of geometry types: any concrete type implementing the trait participates.
/// Comparison goes through the structural fingerprint (kind name, srid,
/// coordinate bit patterns), so distinct library types with equal contents
/// compare equal.
#[derive(Debug)]
struct GeometryComparer;

impl ValueComparer for GeometryComparer {
    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Geometry(a), Value::Geometry(b)) => Some(a.fingerprint().cmp(&b.fingerprint())),
            _ => None,
        }
    }
}

/// Maps one value kind to its storage representation and comparers.
#[derive(Debug)]
pub struct TypeMapping {
    kind: ValueKind,
    element: Option<Arc<TypeMapping>>,
    comparer: Arc<dyn ValueComparer>,
}

impl TypeMapping {
    /// Returns the value kind this mapping covers.
    #[must_use]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Converts a domain value to its storage representation.
    ///
    /// # Errors
    ///
    /// Fails if the value does not match the mapped kind.
    pub fn to_datum(&self, value: &Value) -> BridgeResult<Datum> {
        match (value, &self.kind) {
            (Value::Null, _) => Ok(Datum::Null),
            (Value::Bool(b), ValueKind::Bool) => Ok(Datum::Bool(*b)),
            (Value::Int(n), ValueKind::Int) => Ok(Datum::Int(*n)),
            (Value::Float(x), ValueKind::Float) => Ok(Datum::Float(*x)),
            (Value::Text(s), ValueKind::Text) => Ok(Datum::Text(s.clone())),
            (Value::Bytes(b), ValueKind::Bytes) => Ok(Datum::Bytes(b.clone())),
            (Value::Uuid(u), ValueKind::Uuid) => Ok(Datum::Bytes(u.as_bytes().to_vec())),
            (Value::Array(items), ValueKind::Array(_)) => {
                let element = self.element.as_ref().ok_or_else(|| {
                    BridgeError::not_supported("array mapping lost its element mapping")
                })?;
                let datums = items
                    .iter()
                    .map(|item| element.to_datum(item))
                    .collect::<BridgeResult<Vec<_>>>()?;
                Ok(Datum::Array(datums))
            }
            (Value::Geometry(g), ValueKind::Geometry) => Ok(geometry_to_datum(g.as_ref())),
            (value, kind) => Err(BridgeError::invalid_operation(format!(
                "value {value:?} does not match mapped kind {kind}"
            ))),
        }
    }

    /// Converts a storage representation back to a domain value.
    ///
    /// # Errors
    ///
    /// Fails if the datum does not match the mapped kind.
    pub fn from_datum(&self, datum: &Datum) -> BridgeResult<Value> {
        match (datum, &self.kind) {
            (Datum::Null, _) => Ok(Value::Null),
            (Datum::Bool(b), ValueKind::Bool) => Ok(Value::Bool(*b)),
            (Datum::Int(n), ValueKind::Int) => Ok(Value::Int(*n)),
            (Datum::Float(x), ValueKind::Float) => Ok(Value::Float(*x)),
            (Datum::Text(s), ValueKind::Text) => Ok(Value::Text(s.clone())),
            (Datum::Bytes(b), ValueKind::Bytes) => Ok(Value::Bytes(b.clone())),
            (Datum::Bytes(b), ValueKind::Uuid) => Uuid::from_slice(b)
                .map(Value::Uuid)
                .map_err(|e| BridgeError::invalid_operation(format!("malformed uuid datum: {e}"))),
            (Datum::Array(items), ValueKind::Array(_)) => {
                let element = self.element.as_ref().ok_or_else(|| {
                    BridgeError::not_supported("array mapping lost its element mapping")
                })?;
                let values = items
                    .iter()
                    .map(|item| element.from_datum(item))
                    .collect::<BridgeResult<Vec<_>>>()?;
                Ok(Value::Array(values))
            }
            (datum, ValueKind::Geometry) => geometry_from_datum(datum),
            (datum, kind) => Err(BridgeError::invalid_operation(format!(
                "datum {datum:?} does not match mapped kind {kind}"
            ))),
        }
    }

    /// Structural equality under this mapping.
    #[must_use]
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        self.comparer.equals(a, b)
    }

    /// Structural ordering under this mapping. `None` for unordered pairs.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        self.comparer.compare(a, b)
    }
}

/// Storage shape for geometry: `[kind name, srid, [x0, y0, x1, y1, ...]]`.
fn geometry_to_datum(g: &dyn GeometryValue) -> Datum {
    let coords = g
        .coordinates()
        .iter()
        .flat_map(|c| [Datum::Float(c[0]), Datum::Float(c[1])])
        .collect();
    Datum::Array(vec![
        Datum::Text(g.geometry_type().to_string()),
        Datum::Int(i64::from(g.srid())),
        Datum::Array(coords),
    ])
}

fn geometry_from_datum(datum: &Datum) -> BridgeResult<Value> {
    let malformed = || BridgeError::invalid_operation("malformed geometry datum");

    let Datum::Array(parts) = datum else {
        return Err(malformed());
    };
    let [Datum::Text(kind), Datum::Int(srid), Datum::Array(flat)] = parts.as_slice() else {
        return Err(malformed());
    };
    if flat.len() % 2 != 0 {
        return Err(malformed());
    }

    let mut coords = Vec::with_capacity(flat.len() / 2);
    for pair in flat.chunks(2) {
        let (Datum::Float(x), Datum::Float(y)) = (&pair[0], &pair[1]) else {
            return Err(malformed());
        };
        coords.push([*x, *y]);
    }

    let srid = i32::try_from(*srid).map_err(|_| malformed())?;
    Ok(Value::Geometry(
        StoredGeometry::new(kind.clone(), srid, coords).into_arc(),
    ))
}

/// Process-wide registry of type mappings.
///
/// Lookup is pure; results are cached per value kind for the process
/// lifetime since comparer construction for composite kinds recurses.
#[derive(Debug, Default)]
pub struct TypeMappingRegistry {
    cache: RwLock<HashMap<ValueKind, Arc<TypeMapping>>>,
}

impl TypeMappingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds (or builds and caches) the mapping for a value kind.
    ///
    /// Rules, in order: scalar and text kinds get the default comparer;
    /// byte sequences get an element-wise structural comparer; geometry gets
    /// the capability-resolved structural comparer; arrays recurse on their
    /// element kind.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotSupported`] when no mapping exists — fatal
    /// for the property that declared the kind.
    pub fn find_mapping(&self, kind: &ValueKind) -> BridgeResult<Arc<TypeMapping>> {
        if let Some(mapping) = self.cache.read().get(kind) {
            return Ok(Arc::clone(mapping));
        }

        let mapping = Arc::new(self.build_mapping(kind)?);
        self.cache
            .write()
            .insert(kind.clone(), Arc::clone(&mapping));
        Ok(mapping)
    }

    fn build_mapping(&self, kind: &ValueKind) -> BridgeResult<TypeMapping> {
        let mapping = match kind {
            ValueKind::Bool
            | ValueKind::Int
            | ValueKind::Float
            | ValueKind::Text
            | ValueKind::Uuid => TypeMapping {
                kind: kind.clone(),
                element: None,
                comparer: Arc::new(DefaultComparer),
            },
            ValueKind::Bytes => TypeMapping {
                kind: kind.clone(),
                element: None,
                comparer: Arc::new(BytesComparer),
            },
            ValueKind::Geometry => TypeMapping {
                kind: kind.clone(),
                element: None,
                comparer: Arc::new(GeometryComparer),
            },
            ValueKind::Array(element_kind) => {
                let element = self.find_mapping(element_kind)?;
                TypeMapping {
                    kind: kind.clone(),
                    element: Some(Arc::clone(&element)),
                    comparer: Arc::new(ArrayComparer {
                        element: Arc::clone(&element.comparer),
                    }),
                }
            }
        };
        Ok(mapping)
    }

    /// Structural equality between two values, mapping-dispatched.
    ///
    /// Used by residual predicate evaluation against materialized entities.
    #[must_use]
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        if a.is_null() || b.is_null() {
            return a.is_null() && b.is_null();
        }
        match self.comparer_for(a, b) {
            Some(mapping) => mapping.equals(a, b),
            None => false,
        }
    }

    /// Structural ordering between two values, mapping-dispatched.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        self.comparer_for(a, b)?.compare(a, b)
    }

    fn comparer_for(&self, a: &Value, b: &Value) -> Option<Arc<TypeMapping>> {
        let kind = a.kind().or_else(|| b.kind())?;
        self.find_mapping(&kind).ok()
    }
}
