//! Entity type descriptions.

use crate::error::{BridgeError, BridgeResult};
use crate::model::value::ValueKind;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One property of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: String,
    kind: ValueKind,
    nullable: bool,
    is_key: bool,
}

impl Property {
    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared value kind.
    #[must_use]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Returns whether the property may hold null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns whether the property is part of the primary key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.is_key
    }
}

/// A named domain type with an ordered list of properties.
///
/// Entity types are identified by name for the process lifetime: the store
/// cache, materializer factory, and value generators all key on it. Shared
/// as `Arc<EntityType>` so every component sees the same description.
#[derive(Debug)]
pub struct EntityType {
    name: String,
    properties: Vec<Property>,
    by_name: HashMap<String, usize>,
    key_indexes: Vec<usize>,
}

impl EntityType {
    /// Starts building an entity type with the given name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<(usize, &Property)> {
        self.by_name
            .get(name)
            .map(|&idx| (idx, &self.properties[idx]))
    }

    /// Returns the indexes of the key properties, in declaration order.
    #[must_use]
    pub fn key_indexes(&self) -> &[usize] {
        &self.key_indexes
    }

    /// Returns the key properties, in declaration order.
    pub fn key_properties(&self) -> impl Iterator<Item = &Property> {
        self.key_indexes.iter().map(|&idx| &self.properties[idx])
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Builder for [`EntityType`].
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name: String,
    properties: Vec<Property>,
}

impl EntityTypeBuilder {
    /// Adds a non-nullable, non-key property.
    #[must_use]
    pub fn property(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.add(name.into(), kind, false, false)
    }

    /// Adds a nullable property.
    #[must_use]
    pub fn nullable_property(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.add(name.into(), kind, true, false)
    }

    /// Adds a key property. Key properties are never nullable.
    #[must_use]
    pub fn key_property(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.add(name.into(), kind, false, true)
    }

    fn add(mut self, name: String, kind: ValueKind, nullable: bool, is_key: bool) -> Self {
        self.properties.push(Property {
            name,
            kind,
            nullable,
            is_key,
        });
        self
    }

    /// Validates and builds the entity type.
    ///
    /// # Errors
    ///
    /// Fails if a property name repeats or no key property was declared.
    pub fn build(self) -> BridgeResult<Arc<EntityType>> {
        let mut by_name = HashMap::with_capacity(self.properties.len());
        let mut key_indexes = Vec::new();

        for (idx, prop) in self.properties.iter().enumerate() {
            if by_name.insert(prop.name.clone(), idx).is_some() {
                return Err(BridgeError::invalid_operation(format!(
                    "entity type {}: duplicate property {}",
                    self.name, prop.name
                )));
            }
            if prop.is_key {
                key_indexes.push(idx);
            }
        }

        if key_indexes.is_empty() {
            return Err(BridgeError::invalid_operation(format!(
                "entity type {} declares no key property",
                self.name
            )));
        }

        Ok(Arc::new(EntityType {
            name: self.name,
            properties: self.properties,
            by_name,
            key_indexes,
        }))
    }
}
