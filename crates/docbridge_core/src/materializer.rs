//! Entity ⇄ document conversion.

use crate::error::{BridgeError, BridgeResult};
use crate::mapping::{TypeMapping, TypeMappingRegistry};
use crate::model::{Entity, EntityType, Key};
use docbridge_value::Document;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Converts between entities of one type and stored documents.
///
/// A materializer resolves each property's type mapping once at construction
/// and reuses it for every row, so the per-document hot path never consults
/// the registry.
pub struct Materializer {
    entity_type: Arc<EntityType>,
    mappings: Vec<Arc<TypeMapping>>,
}

impl Materializer {
    fn new(
        entity_type: Arc<EntityType>,
        registry: &TypeMappingRegistry,
    ) -> BridgeResult<Self> {
        let mappings = entity_type
            .properties()
            .iter()
            .map(|p| registry.find_mapping(p.kind()))
            .collect::<BridgeResult<Vec<_>>>()?;
        Ok(Self {
            entity_type,
            mappings,
        })
    }

    /// Returns the entity type this materializer serves.
    #[must_use]
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Builds an entity from a stored document.
    ///
    /// Properties absent from the document materialize as null when nullable.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Materialization`] when a non-nullable property
    /// is absent or null in the document.
    pub fn materialize(&self, doc: &Document) -> BridgeResult<Entity> {
        let mut entity = Entity::new(Arc::clone(&self.entity_type));
        for (idx, prop) in self.entity_type.properties().iter().enumerate() {
            match doc.get(prop.name()) {
                Some(datum) if !datum.is_null() => {
                    entity.set_at(idx, self.mappings[idx].from_datum(datum)?);
                }
                _ if prop.is_nullable() => entity.set_at(idx, crate::model::Value::Null),
                _ => {
                    return Err(BridgeError::materialization(
                        self.entity_type.name(),
                        prop.name(),
                    ))
                }
            }
        }
        Ok(entity)
    }

    /// Builds the full stored document for an entity.
    ///
    /// Null property values are omitted from the document.
    pub fn dematerialize(&self, entity: &Entity) -> BridgeResult<Document> {
        let mut doc = Document::new();
        for (idx, prop) in self.entity_type.properties().iter().enumerate() {
            let value = entity.value_at(idx);
            if value.is_null() {
                continue;
            }
            doc.set(prop.name(), self.mappings[idx].to_datum(value)?);
        }
        Ok(doc)
    }

    /// Builds a partial document carrying only the entity's changed
    /// non-key properties, for merge-style updates.
    ///
    /// An empty `modified` slice means every non-key property changed. Null
    /// values are written explicitly so the merge clears the stored field.
    pub fn dematerialize_changes(
        &self,
        entity: &Entity,
        modified: &[usize],
    ) -> BridgeResult<Document> {
        let mut doc = Document::new();
        for (idx, prop) in self.entity_type.properties().iter().enumerate() {
            if prop.is_key() {
                continue;
            }
            if !modified.is_empty() && !modified.contains(&idx) {
                continue;
            }
            doc.set(prop.name(), self.mappings[idx].to_datum(entity.value_at(idx))?);
        }
        Ok(doc)
    }

    /// Extracts the primary key from an entity.
    ///
    /// # Errors
    ///
    /// Fails if a key value is null (the caller should have generated it).
    pub fn key_of(&self, entity: &Entity) -> BridgeResult<Key> {
        let mut datums = Vec::with_capacity(self.entity_type.key_indexes().len());
        for &idx in self.entity_type.key_indexes() {
            let value = entity.value_at(idx);
            if value.is_null() {
                return Err(BridgeError::invalid_operation(format!(
                    "entity of type {} has a null key property {}",
                    self.entity_type.name(),
                    self.entity_type.properties()[idx].name()
                )));
            }
            datums.push(self.mappings[idx].to_datum(value)?);
        }
        Ok(Key::new(datums))
    }
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("entity_type", &self.entity_type.name())
            .finish_non_exhaustive()
    }
}

/// Builds and caches one [`Materializer`] per entity type.
pub struct MaterializerFactory {
    registry: Arc<TypeMappingRegistry>,
    materializers: RwLock<HashMap<String, Arc<Materializer>>>,
}

impl MaterializerFactory {
    /// Creates a factory over a type mapping registry.
    #[must_use]
    pub fn new(registry: Arc<TypeMappingRegistry>) -> Self {
        Self {
            registry,
            materializers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the materializer for an entity type, building it on first
    /// use. Repeated calls for the same entity type return the same one.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotSupported`] if a property kind has no type
    /// mapping.
    pub fn materializer_for(
        &self,
        entity_type: &Arc<EntityType>,
    ) -> BridgeResult<Arc<Materializer>> {
        if let Some(existing) = self.materializers.read().get(entity_type.name()) {
            return Ok(Arc::clone(existing));
        }

        let built = Arc::new(Materializer::new(
            Arc::clone(entity_type),
            &self.registry,
        )?);

        let mut materializers = self.materializers.write();
        let entry = materializers
            .entry(entity_type.name().to_string())
            .or_insert_with(|| Arc::clone(&built));
        Ok(Arc::clone(entry))
    }

    /// Returns the shared type mapping registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeMappingRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for MaterializerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializerFactory")
            .field("cached", &self.materializers.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Value, ValueKind};
    use docbridge_value::Datum;

    fn factory() -> MaterializerFactory {
        MaterializerFactory::new(Arc::new(TypeMappingRegistry::new()))
    }

    fn person() -> Arc<EntityType> {
        EntityType::builder("Person")
            .key_property("Id", ValueKind::Int)
            .property("Name", ValueKind::Text)
            .nullable_property("Tags", ValueKind::Array(Box::new(ValueKind::Text)))
            .build()
            .unwrap()
    }

    fn ann() -> Entity {
        let mut e = Entity::new(person());
        e.set("Id", Value::Int(7)).unwrap();
        e.set("Name", Value::Text("Ann".into())).unwrap();
        e.set(
            "Tags",
            Value::Array(vec![Value::Text("a".into()), Value::Text("b".into())]),
        )
        .unwrap();
        e
    }

    #[test]
    fn round_trip_preserves_values() {
        let f = factory();
        let m = f.materializer_for(&person()).unwrap();

        let doc = m.dematerialize(&ann()).unwrap();
        let back = m.materialize(&doc).unwrap();
        assert_eq!(back, ann());
    }

    #[test]
    fn null_values_are_omitted_from_documents() {
        let f = factory();
        let m = f.materializer_for(&person()).unwrap();

        let mut e = ann();
        e.set("Tags", Value::Null).unwrap();
        let doc = m.dematerialize(&e).unwrap();
        assert!(doc.get("Tags").is_none());

        let back = m.materialize(&doc).unwrap();
        assert_eq!(back.get("Tags"), Some(&Value::Null));
    }

    #[test]
    fn absent_required_property_fails_materialization() {
        let f = factory();
        let m = f.materializer_for(&person()).unwrap();

        let mut doc = Document::new();
        doc.set("Id", Datum::Int(7));
        let result = m.materialize(&doc);
        assert!(matches!(
            result,
            Err(BridgeError::Materialization { property, .. }) if property == "Name"
        ));
    }

    #[test]
    fn change_document_excludes_key_and_unmodified() {
        let f = factory();
        let et = person();
        let m = f.materializer_for(&et).unwrap();

        let (tags_idx, _) = et.property("Tags").unwrap();
        let changes = m.dematerialize_changes(&ann(), &[tags_idx]).unwrap();
        assert!(changes.get("Id").is_none());
        assert!(changes.get("Name").is_none());
        assert!(changes.get("Tags").is_some());
    }

    #[test]
    fn key_extraction_maps_values() {
        let f = factory();
        let m = f.materializer_for(&person()).unwrap();
        let key = m.key_of(&ann()).unwrap();
        assert_eq!(key.datums(), &[Datum::Int(7)]);
    }

    #[test]
    fn factory_caches_per_entity_type() {
        let f = factory();
        let et = person();
        let a = f.materializer_for(&et).unwrap();
        let b = f.materializer_for(&et).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
