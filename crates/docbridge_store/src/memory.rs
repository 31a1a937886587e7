//! In-memory document store.

use crate::error::StoreResult;
use crate::store::{DocumentStore, StoreCollection};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory document store.
///
/// Collections are created lazily on first open and live for the store's
/// lifetime. All data is lost when the store is dropped.
///
/// # Thread Safety
///
/// The store and its collections are thread-safe and can be shared across
/// sessions. Scans copy the collection contents under the read lock, so an
/// iteration never observes concurrent mutations.
///
/// # Example
///
/// ```rust
/// use docbridge_store::{DocumentStore, InMemoryStore, StoreCollection};
///
/// let store = InMemoryStore::new();
/// let people = store.open_collection("Person").unwrap();
/// people.put(b"k1", b"doc1").unwrap();
/// assert_eq!(people.get(b"k1").unwrap(), Some(b"doc1".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<BTreeMap<String, Arc<MemoryCollection>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the store in a shared handle.
    #[must_use]
    pub fn shared() -> Arc<dyn DocumentStore> {
        Arc::new(Self::new())
    }
}

impl DocumentStore for InMemoryStore {
    fn open_collection(&self, name: &str) -> StoreResult<Arc<dyn StoreCollection>> {
        if let Some(existing) = self.collections.read().get(name) {
            return Ok(Arc::clone(existing) as Arc<dyn StoreCollection>);
        }

        let mut collections = self.collections.write();
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::default()));
        Ok(Arc::clone(collection) as Arc<dyn StoreCollection>)
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }
}

/// One in-memory collection of encoded documents.
#[derive(Debug, Default)]
struct MemoryCollection {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl StoreCollection for MemoryCollection {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], doc: &[u8]) -> StoreResult<()> {
        self.entries.write().insert(key.to_vec(), doc.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn scan(&self) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.entries.read();
        Ok(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.read().len())
    }
}
