//! Process-wide cache of open tables.

use crate::error::BridgeResult;
use crate::model::EntityType;
use crate::table::Table;
use docbridge_store::DocumentStore;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shares one [`Table`] per entity type across all sessions.
///
/// The cache also owns the store-wide commit lock: a save batch holds it for
/// the duration of its writes, so at most one batch mutates the store at a
/// time and partially applied batches are never visible to another writer.
pub struct StoreCache {
    store: Arc<dyn DocumentStore>,
    tables: RwLock<HashMap<String, Arc<Table>>>,
    commit_lock: Mutex<()>,
}

impl StoreCache {
    /// Creates a cache over a document store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            tables: RwLock::new(HashMap::new()),
            commit_lock: Mutex::new(()),
        }
    }

    /// Returns the table for an entity type, opening its collection on first
    /// access. Repeated calls for the same entity type return the same table.
    pub fn table_for(&self, entity_type: &Arc<EntityType>) -> BridgeResult<Arc<Table>> {
        if let Some(table) = self.tables.read().get(entity_type.name()) {
            return Ok(Arc::clone(table));
        }

        let collection = self.store.open_collection(entity_type.name())?;
        let table = Arc::new(Table::new(Arc::clone(entity_type), collection));

        let mut tables = self.tables.write();
        let entry = tables
            .entry(entity_type.name().to_string())
            .or_insert_with(|| {
                debug!(table = entity_type.name(), "opened table");
                Arc::clone(&table)
            });
        Ok(Arc::clone(entry))
    }

    /// Acquires the store-wide commit lock.
    pub(crate) fn lock_commit(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock()
    }

    /// Returns the names of open tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for StoreCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCache")
            .field("tables", &self.table_names())
            .finish_non_exhaustive()
    }
}
