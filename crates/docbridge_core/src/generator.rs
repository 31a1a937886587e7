//! Key value generation for entities saved without explicit keys.

use crate::error::{BridgeError, BridgeResult};
use crate::model::{EntityType, Value, ValueKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Produces key values for entities that were added without one.
///
/// Implementations must be safe under concurrent invocation from multiple
/// sessions: the same value is never handed out twice.
pub trait ValueGenerator: Send + Sync {
    /// Returns the next generated value.
    fn next(&self) -> Value;
}

/// Monotonically increasing integer surrogate.
#[derive(Debug)]
struct SequentialIntGenerator {
    next: AtomicI64,
}

impl SequentialIntGenerator {
    fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }
}

impl ValueGenerator for SequentialIntGenerator {
    fn next(&self) -> Value {
        Value::Int(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Random unique identifier generator.
#[derive(Debug)]
struct UuidGenerator {
    as_text: bool,
}

impl ValueGenerator for UuidGenerator {
    fn next(&self) -> Value {
        let id = Uuid::new_v4();
        if self.as_text {
            Value::Text(id.to_string())
        } else {
            Value::Uuid(id)
        }
    }
}

/// Selects (and owns) one generator per entity-type key property.
///
/// Generators are scoped per `(entity type, property)` so concurrent inserts
/// into different entity types never contend on the same counter. The
/// selector is process-wide shared state, like the store cache.
#[derive(Default)]
pub struct ValueGeneratorSelector {
    generators: RwLock<HashMap<(String, String), Arc<dyn ValueGenerator>>>,
}

impl ValueGeneratorSelector {
    /// Creates an empty selector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the generator for a key property of an entity type,
    /// constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotSupported`] when the property's kind has no
    /// generation strategy.
    pub fn select(
        &self,
        entity_type: &EntityType,
        property_name: &str,
    ) -> BridgeResult<Arc<dyn ValueGenerator>> {
        let cache_key = (entity_type.name().to_string(), property_name.to_string());

        if let Some(existing) = self.generators.read().get(&cache_key) {
            return Ok(Arc::clone(existing));
        }

        let (_, property) = entity_type.property(property_name).ok_or_else(|| {
            BridgeError::invalid_operation(format!(
                "entity type {} has no property {property_name}",
                entity_type.name()
            ))
        })?;

        let generator: Arc<dyn ValueGenerator> = match property.kind() {
            ValueKind::Int => Arc::new(SequentialIntGenerator::new()),
            ValueKind::Uuid => Arc::new(UuidGenerator { as_text: false }),
            ValueKind::Text => Arc::new(UuidGenerator { as_text: true }),
            other => {
                return Err(BridgeError::not_supported(format!(
                    "no value generator for key property {property_name} of kind {other}"
                )))
            }
        };

        let mut generators = self.generators.write();
        let entry = generators
            .entry(cache_key)
            .or_insert_with(|| Arc::clone(&generator));
        Ok(Arc::clone(entry))
    }
}

impl std::fmt::Debug for ValueGeneratorSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueGeneratorSelector")
            .field("generator_count", &self.generators.read().len())
            .finish()
    }
}
