//! The bridge and its per-session database handle.

use crate::cache::StoreCache;
use crate::change::{ChangeEntry, EntityState};
use crate::error::BridgeResult;
use crate::generator::ValueGeneratorSelector;
use crate::mapping::TypeMappingRegistry;
use crate::materializer::MaterializerFactory;
use crate::model::{Entity, EntityType, Key};
use crate::query::{self, Query, QueryResults};
use crate::transaction::{BufferedOp, TableOp, TransactionManager};
use docbridge_store::{DocumentStore, InMemoryStore};
use std::sync::Arc;
use tracing::debug;

/// The process-wide bridge: shared caches and registries over one document
/// store. Cheap to clone; every clone shares the same state.
///
/// Sessions are opened with [`Bridge::session`]; each gets its own
/// transaction scope over the shared tables.
#[derive(Clone)]
pub struct Bridge {
    cache: Arc<StoreCache>,
    registry: Arc<TypeMappingRegistry>,
    materializers: Arc<MaterializerFactory>,
    generators: Arc<ValueGeneratorSelector>,
}

impl Bridge {
    /// Creates a bridge over an arbitrary document store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let registry = Arc::new(TypeMappingRegistry::new());
        Self {
            cache: Arc::new(StoreCache::new(store)),
            materializers: Arc::new(MaterializerFactory::new(Arc::clone(&registry))),
            generators: Arc::new(ValueGeneratorSelector::new()),
            registry,
        }
    }

    /// Creates a bridge over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Opens a new session.
    #[must_use]
    pub fn session(&self) -> Database {
        Database {
            bridge: self.clone(),
            transactions: TransactionManager::new(Arc::clone(&self.cache)),
        }
    }

    /// Returns the shared type mapping registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeMappingRegistry> {
        &self.registry
    }

    /// Returns the shared store cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<StoreCache> {
        &self.cache
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("tables", &self.cache.table_names())
            .finish_non_exhaustive()
    }
}

/// One session against the bridge: saves change batches and executes
/// queries, optionally inside an explicit transaction.
pub struct Database {
    bridge: Bridge,
    transactions: TransactionManager,
}

impl Database {
    /// Persists a batch of tracked changes.
    ///
    /// Entries apply in the order supplied. Added entities with null key
    /// properties get generated values before insertion; `Unchanged` entries
    /// are skipped. Without an explicit transaction the batch commits
    /// immediately and atomically: if any entry fails, none of the batch
    /// remains visible and the failure identifies the offending entity.
    /// Inside an explicit transaction the batch is buffered until
    /// [`Database::commit`].
    ///
    /// Returns the number of mutations accepted.
    pub fn save_changes(&self, entries: &[ChangeEntry]) -> BridgeResult<usize> {
        let mut ops = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(op) = self.plan_change(entry)? {
                ops.push(op);
            }
        }
        debug!(mutations = ops.len(), "submitting change batch");
        self.transactions.submit(ops)
    }

    /// Converts one change entry into a buffered table mutation.
    fn plan_change(&self, entry: &ChangeEntry) -> BridgeResult<Option<BufferedOp>> {
        let entity_type = Arc::clone(entry.entity().entity_type());
        let materializer = self.bridge.materializers.materializer_for(&entity_type)?;
        let table = self.bridge.cache.table_for(&entity_type)?;

        let op = match entry.state() {
            EntityState::Unchanged => return Ok(None),
            EntityState::Added => {
                let mut entity = entry.entity().clone();
                self.generate_missing_keys(&mut entity)?;
                TableOp::Insert(materializer.dematerialize(&entity)?)
            }
            EntityState::Modified => {
                let key = materializer.key_of(entry.entity())?;
                let changes = materializer
                    .dematerialize_changes(entry.entity(), entry.modified_indexes())?;
                TableOp::Update(key, changes)
            }
            EntityState::Deleted => TableOp::Delete(materializer.key_of(entry.entity())?),
        };
        Ok(Some(BufferedOp { table, op }))
    }

    fn generate_missing_keys(&self, entity: &mut Entity) -> BridgeResult<()> {
        let entity_type = Arc::clone(entity.entity_type());
        for &idx in entity_type.key_indexes() {
            if !entity.value_at(idx).is_null() {
                continue;
            }
            let property = &entity_type.properties()[idx];
            let generator = self.bridge.generators.select(&entity_type, property.name())?;
            entity.set_at(idx, generator.next());
        }
        Ok(())
    }

    /// Fetches one entity by key, or `None` if absent.
    pub fn find(
        &self,
        entity_type: &Arc<EntityType>,
        key: &Key,
    ) -> BridgeResult<Option<Entity>> {
        let table = self.bridge.cache.table_for(entity_type)?;
        let materializer = self.bridge.materializers.materializer_for(entity_type)?;
        match table.get(key)? {
            Some(doc) => Ok(Some(materializer.materialize(&doc)?)),
            None => Ok(None),
        }
    }

    /// Executes a query, returning a lazy, single-pass result sequence.
    ///
    /// The query is translated into a pushed-down document filter plus a
    /// residual entity predicate; the scan snapshot is taken here, so later
    /// mutations do not affect the results.
    pub fn execute(
        &self,
        entity_type: &Arc<EntityType>,
        query: Query,
    ) -> BridgeResult<QueryResults> {
        let plan = query::translate(entity_type, query, &self.bridge.registry)?;
        let table = self.bridge.cache.table_for(entity_type)?;
        let materializer = self.bridge.materializers.materializer_for(entity_type)?;
        QueryResults::new(
            table.scan()?,
            materializer,
            Arc::clone(&self.bridge.registry),
            plan,
        )
    }

    /// Opens an explicit transaction on this session.
    pub fn begin(&self) -> BridgeResult<()> {
        self.transactions.begin()
    }

    /// Commits the session's transaction, applying buffered saves
    /// atomically. Returns the number of mutations applied.
    pub fn commit(&self) -> BridgeResult<usize> {
        self.transactions.commit()
    }

    /// Rolls back the session's transaction, discarding buffered saves.
    pub fn rollback(&self) -> BridgeResult<()> {
        self.transactions.rollback()
    }

    /// Returns the session's transaction manager.
    #[must_use]
    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("transaction", &self.transactions.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Value, ValueKind};
    use crate::query::Expr;
    use docbridge_value::Datum;

    fn person() -> Arc<EntityType> {
        EntityType::builder("Person")
            .key_property("Id", ValueKind::Int)
            .property("Name", ValueKind::Text)
            .build()
            .unwrap()
    }

    fn ann(id: i64) -> Entity {
        let mut e = Entity::new(person());
        e.set("Id", Value::Int(id)).unwrap();
        e.set("Name", Value::Text("Ann".into())).unwrap();
        e
    }

    #[test]
    fn added_entities_with_default_keys_get_generated_ones() {
        let bridge = Bridge::in_memory();
        let db = bridge.session();

        let person = person();
        let mut e = Entity::new(Arc::clone(&person));
        e.set("Name", Value::Text("Ann".into())).unwrap();
        // Force the key to null so generation kicks in.
        e.set("Id", Value::Null).unwrap();

        db.save_changes(&[ChangeEntry::added(e)]).unwrap();

        let found = db
            .find(&person, &Key::new(vec![Datum::Int(1)]))
            .unwrap()
            .unwrap();
        assert_eq!(found.get("Name"), Some(&Value::Text("Ann".into())));
    }

    #[test]
    fn unchanged_entries_are_skipped() {
        let bridge = Bridge::in_memory();
        let db = bridge.session();

        let applied = db
            .save_changes(&[ChangeEntry::unchanged(ann(1)), ChangeEntry::added(ann(2))])
            .unwrap();
        assert_eq!(applied, 1);
    }

    #[test]
    fn buffered_saves_stay_invisible_until_commit() {
        let bridge = Bridge::in_memory();
        let writer = bridge.session();
        let reader = bridge.session();
        let person = person();

        writer.begin().unwrap();
        writer.save_changes(&[ChangeEntry::added(ann(1))]).unwrap();

        let key = Key::new(vec![Datum::Int(1)]);
        assert!(reader.find(&person, &key).unwrap().is_none());

        writer.commit().unwrap();
        assert!(reader.find(&person, &key).unwrap().is_some());
    }

    #[test]
    fn execute_filters_by_pushdown() {
        let bridge = Bridge::in_memory();
        let db = bridge.session();
        let person = person();

        db.save_changes(&[ChangeEntry::added(ann(1))]).unwrap();

        let results: Vec<Entity> = db
            .execute(
                &person,
                Query::new().filter(Expr::prop("Name").eq(Expr::text("Ann"))),
            )
            .unwrap()
            .collect::<BridgeResult<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}
