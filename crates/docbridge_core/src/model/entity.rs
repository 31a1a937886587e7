//! Materialized entity instances.

use crate::error::{BridgeError, BridgeResult};
use crate::model::entity_type::EntityType;
use crate::model::value::Value;
use std::sync::Arc;

/// One in-memory entity instance.
///
/// Values are stored positionally, aligned with the entity type's property
/// declaration order. A fresh entity starts at each property's domain
/// default (null for nullable properties, the kind's zero value otherwise).
#[derive(Debug, Clone)]
pub struct Entity {
    entity_type: Arc<EntityType>,
    values: Vec<Value>,
}

impl Entity {
    /// Creates an entity with all properties at their defaults.
    #[must_use]
    pub fn new(entity_type: Arc<EntityType>) -> Self {
        let values = entity_type
            .properties()
            .iter()
            .map(|p| p.kind().default_value(p.is_nullable()))
            .collect();
        Self {
            entity_type,
            values,
        }
    }

    /// Returns the entity's type.
    #[must_use]
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Sets a property value by name.
    ///
    /// # Errors
    ///
    /// Fails if the entity type has no property with that name.
    pub fn set(&mut self, name: &str, value: Value) -> BridgeResult<()> {
        let (idx, _) = self.entity_type.property(name).ok_or_else(|| {
            BridgeError::invalid_operation(format!(
                "entity type {} has no property {name}",
                self.entity_type.name()
            ))
        })?;
        self.values[idx] = value;
        Ok(())
    }

    /// Gets a property value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entity_type
            .property(name)
            .map(|(idx, _)| &self.values[idx])
    }

    /// Gets a property value by position.
    #[must_use]
    pub fn value_at(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// Replaces a property value by position.
    pub(crate) fn set_at(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    /// Iterates over `(property name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entity_type
            .properties()
            .iter()
            .map(|p| p.name())
            .zip(self.values.iter())
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type.name() == other.entity_type.name() && self.values == other.values
    }
}
