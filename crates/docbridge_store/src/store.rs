//! Document store trait definitions.

use crate::error::StoreResult;
use std::sync::Arc;

/// A collection-based document store.
///
/// A store holds one collection per entity-type name. Opening is idempotent:
/// the first call for a name creates the collection, later calls return a
/// handle to the same one.
///
/// # Invariants
///
/// - Collections live for the store's lifetime; nothing destroys them
/// - Handles to the same name observe the same data
/// - Implementations must be `Send + Sync` for concurrent sessions
pub trait DocumentStore: Send + Sync {
    /// Opens (or creates) the collection with the given name.
    fn open_collection(&self, name: &str) -> StoreResult<Arc<dyn StoreCollection>>;

    /// Returns the names of collections that currently exist.
    fn collection_names(&self) -> StoreResult<Vec<String>>;
}

/// One collection of encoded documents keyed by encoded key bytes.
///
/// Every mutation is atomic with respect to concurrent readers: a reader
/// observes the collection before or after a mutation, never a torn
/// intermediate state.
pub trait StoreCollection: Send + Sync {
    /// Gets the document bytes stored under `key`.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `doc` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], doc: &[u8]) -> StoreResult<()>;

    /// Removes the entry under `key`. Returns whether an entry existed.
    fn remove(&self, key: &[u8]) -> StoreResult<bool>;

    /// Returns whether an entry exists under `key`.
    fn contains(&self, key: &[u8]) -> StoreResult<bool>;

    /// Takes a snapshot of all entries, in key order.
    ///
    /// The snapshot reflects the collection state at the time of the call;
    /// concurrent mutations are not observed by an iteration over it.
    fn scan(&self) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Returns the number of stored documents.
    fn len(&self) -> StoreResult<usize>;

    /// Returns true if the collection holds no documents.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
