//! Geometry capability for external spatial types.

use std::fmt;
use std::sync::Arc;

/// Capability trait for external geometry values.
///
/// The bridge does not know geometry libraries at compile time. Any concrete
/// type can participate by exposing its structural content through this
/// trait; comparers and storage mappings are constructed from the capability
/// rather than from a fixed list of geometry types.
pub trait GeometryValue: fmt::Debug + Send + Sync {
    /// The concrete geometry kind, e.g. `"Point"` or `"LineString"`.
    fn geometry_type(&self) -> &str;

    /// Spatial reference identifier. Defaults to 0 (unspecified).
    fn srid(&self) -> i32 {
        0
    }

    /// The flattened coordinate sequence, in declaration order.
    fn coordinates(&self) -> Vec<[f64; 2]>;

    /// The structural identity of this geometry.
    ///
    /// Two geometries with equal fingerprints are equal values, regardless of
    /// which concrete types produced them.
    fn fingerprint(&self) -> GeometryFingerprint {
        GeometryFingerprint {
            geometry_type: self.geometry_type().to_string(),
            srid: self.srid(),
            coordinates: self
                .coordinates()
                .iter()
                .map(|c| [c[0].to_bits(), c[1].to_bits()])
                .collect(),
        }
    }
}

/// Structural identity of a geometry value.
///
/// Coordinates are captured as bit patterns so equality and ordering are
/// total (NaN-safe) and match what a serialized representation would compare.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GeometryFingerprint {
    /// Concrete geometry kind name.
    pub geometry_type: String,
    /// Spatial reference identifier.
    pub srid: i32,
    /// Coordinate pairs as f64 bit patterns.
    pub coordinates: Vec<[u64; 2]>,
}

/// A geometry reconstructed from stored fields.
///
/// Materialization cannot reproduce the caller's concrete library type, so
/// documents round-trip geometry through this structural stand-in. It
/// compares equal to the original because geometry equality is defined by
/// fingerprint, not by concrete type.
#[derive(Debug, Clone)]
pub struct StoredGeometry {
    geometry_type: String,
    srid: i32,
    coordinates: Vec<[f64; 2]>,
}

impl StoredGeometry {
    /// Creates a stored geometry from its structural parts.
    #[must_use]
    pub fn new(geometry_type: impl Into<String>, srid: i32, coordinates: Vec<[f64; 2]>) -> Self {
        Self {
            geometry_type: geometry_type.into(),
            srid,
            coordinates,
        }
    }

    /// Wraps this geometry in a shared capability handle.
    #[must_use]
    pub fn into_arc(self) -> Arc<dyn GeometryValue> {
        Arc::new(self)
    }
}

impl GeometryValue for StoredGeometry {
    fn geometry_type(&self) -> &str {
        &self.geometry_type
    }

    fn srid(&self) -> i32 {
        self.srid
    }

    fn coordinates(&self) -> Vec<[f64; 2]> {
        self.coordinates.clone()
    }
}
