//! Domain value types.

use docbridge_value::GeometryValue;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The declared type of an entity property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    Text,
    /// Byte sequence.
    Bytes,
    /// Unique identifier.
    Uuid,
    /// Homogeneous array of another kind.
    Array(Box<ValueKind>),
    /// External geometry value, resolved by capability.
    Geometry,
}

impl ValueKind {
    /// Returns the domain default for a property of this kind.
    ///
    /// Nullable properties default to `Null`; non-nullable ones get the
    /// kind's zero value. Geometry has no zero value and defaults to `Null`
    /// regardless — a required geometry missing from a document is a
    /// materialization error before the default would ever be used.
    #[must_use]
    pub fn default_value(&self, nullable: bool) -> Value {
        if nullable {
            return Value::Null;
        }
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::Bytes => Value::Bytes(Vec::new()),
            ValueKind::Uuid => Value::Uuid(Uuid::nil()),
            ValueKind::Array(_) => Value::Array(Vec::new()),
            ValueKind::Geometry => Value::Null,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Text => write!(f, "text"),
            ValueKind::Bytes => write!(f, "bytes"),
            ValueKind::Uuid => write!(f, "uuid"),
            ValueKind::Array(elem) => write!(f, "array<{elem}>"),
            ValueKind::Geometry => write!(f, "geometry"),
        }
    }
}

/// A domain value held by an entity property.
///
/// Equality is structural throughout: byte sequences compare element-wise,
/// arrays compare recursively, and geometry compares by capability
/// fingerprint rather than by allocation identity.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null / unset.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
    /// Byte sequence.
    Bytes(Vec<u8>),
    /// Unique identifier.
    Uuid(Uuid),
    /// Array of values.
    Array(Vec<Value>),
    /// External geometry behind the capability trait.
    Geometry(Arc<dyn GeometryValue>),
}

impl Value {
    /// Returns true if the value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Infers the kind of this value, when determinable.
    ///
    /// `Null` and empty arrays carry no kind of their own.
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Int(_) => Some(ValueKind::Int),
            Value::Float(_) => Some(ValueKind::Float),
            Value::Text(_) => Some(ValueKind::Text),
            Value::Bytes(_) => Some(ValueKind::Bytes),
            Value::Uuid(_) => Some(ValueKind::Uuid),
            Value::Array(items) => items
                .iter()
                .find_map(Value::kind)
                .map(|k| ValueKind::Array(Box::new(k))),
            Value::Geometry(_) => Some(ValueKind::Geometry),
        }
    }

    /// Structural comparison between two values of the same kind.
    ///
    /// Returns `None` when the variants differ (other than both being
    /// comparable) — cross-kind comparisons are unordered.
    #[must_use]
    pub fn structural_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (av, bv) in a.iter().zip(b.iter()) {
                    match av.structural_cmp(bv) {
                        Some(Ordering::Equal) => {}
                        other => return other,
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Value::Geometry(a), Value::Geometry(b)) => {
                Some(a.fingerprint().cmp(&b.fingerprint()))
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structural_cmp(other) == Some(Ordering::Equal)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_value::StoredGeometry;

    #[test]
    fn bytes_equality_is_structural() {
        let a = Value::Bytes(vec![1, 2, 3]);
        let b = Value::Bytes(vec![1, 2, 3]);
        let c = Value::Bytes(vec![1, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn geometry_equality_uses_fingerprint() {
        let a = Value::Geometry(StoredGeometry::new("Point", 0, vec![[1.0, 2.0]]).into_arc());
        let b = Value::Geometry(StoredGeometry::new("Point", 0, vec![[1.0, 2.0]]).into_arc());
        let c = Value::Geometry(StoredGeometry::new("Point", 0, vec![[1.0, 9.0]]).into_arc());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn cross_kind_comparison_is_unordered() {
        assert!(Value::Int(1).structural_cmp(&Value::Text("1".into())).is_none());
        assert_ne!(Value::Int(1), Value::Text("1".into()));
    }

    #[test]
    fn array_kind_inferred_from_elements() {
        let v = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(v.kind(), Some(ValueKind::Array(Box::new(ValueKind::Int))));
        assert!(Value::Array(vec![]).kind().is_none());
    }

    #[test]
    fn non_nullable_defaults_are_zero_values() {
        assert_eq!(ValueKind::Int.default_value(false), Value::Int(0));
        assert_eq!(ValueKind::Text.default_value(false), Value::Text(String::new()));
        assert_eq!(ValueKind::Bytes.default_value(false), Value::Bytes(vec![]));
        assert_eq!(ValueKind::Int.default_value(true), Value::Null);
    }
}
