//! Per-entity-type table over a store collection.

use crate::error::{BridgeError, BridgeResult};
use crate::model::{EntityType, Key};
use docbridge_store::StoreCollection;
use docbridge_value::Document;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// One logical table: the collection of documents for one entity type,
/// keyed by the entity's primary key.
///
/// Tables are created on first access through the store cache and live for
/// the process lifetime. Structural mutations are serialized by a per-table
/// write lock (single writer at a time); readers see the collection before
/// or after a mutation, never a torn state.
pub struct Table {
    entity_type: Arc<EntityType>,
    collection: Arc<dyn StoreCollection>,
    write_lock: Mutex<()>,
}

impl Table {
    /// Creates a table over an opened store collection.
    pub(crate) fn new(entity_type: Arc<EntityType>, collection: Arc<dyn StoreCollection>) -> Self {
        Self {
            entity_type,
            collection,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the entity type this table stores.
    #[must_use]
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Extracts the primary key from a document.
    ///
    /// # Errors
    ///
    /// Fails if a key property is absent or null in the document.
    pub fn key_of(&self, doc: &Document) -> BridgeResult<Key> {
        let mut datums = Vec::with_capacity(self.entity_type.key_indexes().len());
        for prop in self.entity_type.key_properties() {
            match doc.get(prop.name()) {
                Some(datum) if !datum.is_null() => datums.push(datum.clone()),
                _ => {
                    return Err(BridgeError::invalid_operation(format!(
                        "document for {} is missing key property {}",
                        self.entity_type.name(),
                        prop.name()
                    )))
                }
            }
        }
        Ok(Key::new(datums))
    }

    /// Gets the document stored under `key`.
    pub fn get(&self, key: &Key) -> BridgeResult<Option<Document>> {
        let bytes = self.collection.get(&key.encode()?)?;
        match bytes {
            Some(bytes) => Ok(Some(Document::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new document.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DuplicateKey`] if the key already exists.
    pub fn insert(&self, doc: &Document) -> BridgeResult<()> {
        let key = self.key_of(doc)?;
        let key_bytes = key.encode()?;
        let doc_bytes = doc.encode()?;

        let _guard = self.write_lock.lock();
        if self.collection.contains(&key_bytes)? {
            return Err(BridgeError::duplicate_key(
                self.entity_type.name(),
                key.to_string(),
            ));
        }
        self.collection.put(&key_bytes, &doc_bytes)?;
        trace!(table = self.entity_type.name(), key = %key, "insert");
        Ok(())
    }

    /// Updates the document under `key` by merging `changes` into it.
    ///
    /// Fields absent from `changes` keep their stored values.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] if no document exists under `key` —
    /// the row was removed by an external concurrent modification.
    pub fn update(&self, key: &Key, changes: &Document) -> BridgeResult<()> {
        let key_bytes = key.encode()?;

        let _guard = self.write_lock.lock();
        let existing = self.collection.get(&key_bytes)?.ok_or_else(|| {
            BridgeError::not_found(self.entity_type.name(), key.to_string())
        })?;

        let mut doc = Document::decode(&existing)?;
        doc.merge(changes);
        self.collection.put(&key_bytes, &doc.encode()?)?;
        trace!(table = self.entity_type.name(), key = %key, "update");
        Ok(())
    }

    /// Deletes the document under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] if no document exists under `key`.
    pub fn delete(&self, key: &Key) -> BridgeResult<()> {
        let key_bytes = key.encode()?;

        let _guard = self.write_lock.lock();
        if !self.collection.remove(&key_bytes)? {
            return Err(BridgeError::not_found(
                self.entity_type.name(),
                key.to_string(),
            ));
        }
        trace!(table = self.entity_type.name(), key = %key, "delete");
        Ok(())
    }

    /// Writes a full document under `key` unconditionally. Used to restore
    /// before-images when a save batch unwinds.
    pub(crate) fn force_put(&self, key: &Key, doc: &Document) -> BridgeResult<()> {
        let key_bytes = key.encode()?;
        let doc_bytes = doc.encode()?;
        let _guard = self.write_lock.lock();
        self.collection.put(&key_bytes, &doc_bytes)?;
        Ok(())
    }

    /// Removes the document under `key` if present. Used to undo inserts
    /// when a save batch unwinds.
    pub(crate) fn force_remove(&self, key: &Key) -> BridgeResult<()> {
        let key_bytes = key.encode()?;
        let _guard = self.write_lock.lock();
        self.collection.remove(&key_bytes)?;
        Ok(())
    }

    /// Takes a snapshot scan of the table.
    ///
    /// The scan reflects the table state at call time; concurrent mutations
    /// are never observed mid-iteration. A scan started while a save batch
    /// is mid-apply may still capture a partially applied prefix of that
    /// batch: batch atomicity is guaranteed only for scans started after the
    /// commit or rollback returned. The returned scan is finite and can be
    /// restarted with [`TableScan::reset`].
    pub fn scan(&self) -> BridgeResult<TableScan> {
        let entries = self.collection.scan()?;
        Ok(TableScan {
            entries: Arc::new(entries),
            pos: 0,
        })
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> BridgeResult<usize> {
        Ok(self.collection.len()?)
    }

    /// Returns true if the table holds no documents.
    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("entity_type", &self.entity_type.name())
            .finish_non_exhaustive()
    }
}

/// A snapshot-consistent scan over a table.
#[derive(Debug, Clone)]
pub struct TableScan {
    entries: Arc<Vec<(Vec<u8>, Vec<u8>)>>,
    pos: usize,
}

impl TableScan {
    /// Restarts the scan from the beginning of the snapshot.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Returns the number of documents in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Iterator for TableScan {
    type Item = BridgeResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, doc_bytes) = self.entries.get(self.pos)?;
        self.pos += 1;
        Some(Document::decode(doc_bytes).map_err(BridgeError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueKind;
    use docbridge_store::{DocumentStore, InMemoryStore};
    use docbridge_value::Datum;

    fn person() -> Arc<EntityType> {
        EntityType::builder("Person")
            .key_property("Id", ValueKind::Int)
            .property("Name", ValueKind::Text)
            .nullable_property("Tags", ValueKind::Bytes)
            .build()
            .unwrap()
    }

    fn table() -> Table {
        let store = InMemoryStore::new();
        let et = person();
        let collection = store.open_collection(et.name()).unwrap();
        Table::new(et, collection)
    }

    fn doc(id: i64, name: &str) -> Document {
        let mut d = Document::new();
        d.set("Id", Datum::Int(id));
        d.set("Name", Datum::Text(name.to_string()));
        d
    }

    #[test]
    fn insert_then_get_round_trips() {
        let t = table();
        t.insert(&doc(1, "Ann")).unwrap();

        let key = Key::new(vec![Datum::Int(1)]);
        let found = t.get(&key).unwrap().unwrap();
        assert_eq!(found.get("Name"), Some(&Datum::Text("Ann".into())));
    }

    #[test]
    fn insert_duplicate_key_fails() {
        let t = table();
        t.insert(&doc(1, "Ann")).unwrap();

        let result = t.insert(&doc(1, "Ben"));
        assert!(matches!(result, Err(BridgeError::DuplicateKey { .. })));
    }

    #[test]
    fn insert_without_key_fails() {
        let t = table();
        let mut d = Document::new();
        d.set("Name", Datum::Text("Ann".into()));
        assert!(t.insert(&d).is_err());
    }

    #[test]
    fn update_merges_changed_fields_only() {
        let t = table();
        let mut d = doc(1, "Ann");
        d.set("Tags", Datum::Bytes(vec![1, 2]));
        t.insert(&d).unwrap();

        let key = Key::new(vec![Datum::Int(1)]);
        let mut changes = Document::new();
        changes.set("Tags", Datum::Bytes(vec![1, 2, 3]));
        t.update(&key, &changes).unwrap();

        let found = t.get(&key).unwrap().unwrap();
        assert_eq!(found.get("Name"), Some(&Datum::Text("Ann".into())));
        assert_eq!(found.get("Tags"), Some(&Datum::Bytes(vec![1, 2, 3])));
    }

    #[test]
    fn update_missing_key_fails() {
        let t = table();
        let key = Key::new(vec![Datum::Int(404)]);
        let result = t.update(&key, &Document::new());
        assert!(matches!(result, Err(BridgeError::NotFound { .. })));
    }

    #[test]
    fn delete_then_get_returns_absent() {
        let t = table();
        t.insert(&doc(1, "Ann")).unwrap();

        let key = Key::new(vec![Datum::Int(1)]);
        t.delete(&key).unwrap();
        assert!(t.get(&key).unwrap().is_none());
    }

    #[test]
    fn second_delete_fails_not_found() {
        let t = table();
        t.insert(&doc(1, "Ann")).unwrap();

        let key = Key::new(vec![Datum::Int(1)]);
        t.delete(&key).unwrap();
        let result = t.delete(&key);
        assert!(matches!(result, Err(BridgeError::NotFound { .. })));
    }

    #[test]
    fn scan_is_snapshot_consistent() {
        let t = table();
        t.insert(&doc(1, "Ann")).unwrap();
        t.insert(&doc(2, "Ben")).unwrap();

        let scan = t.scan().unwrap();
        t.insert(&doc(3, "Cay")).unwrap();

        assert_eq!(scan.len(), 2);
        let names: Vec<_> = scan
            .map(|d| d.unwrap().get("Name").cloned().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![Datum::Text("Ann".into()), Datum::Text("Ben".into())]
        );
    }

    #[test]
    fn scan_is_restartable() {
        let t = table();
        t.insert(&doc(1, "Ann")).unwrap();

        let mut scan = t.scan().unwrap();
        assert!(scan.next().is_some());
        assert!(scan.next().is_none());

        scan.reset();
        assert!(scan.next().is_some());
    }

    #[test]
    fn concurrent_inserts_of_distinct_keys_both_succeed() {
        let t = Arc::new(table());
        let t1 = Arc::clone(&t);
        let t2 = Arc::clone(&t);

        let h1 = std::thread::spawn(move || {
            for i in 0..50 {
                t1.insert(&doc(i, "a")).unwrap();
            }
        });
        let h2 = std::thread::spawn(move || {
            for i in 50..100 {
                t2.insert(&doc(i, "b")).unwrap();
            }
        });
        h1.join().unwrap();
        h2.join().unwrap();

        assert_eq!(t.len().unwrap(), 100);
    }
}
