//! Session-scoped transactions over the shared store.
//!
//! Mutations inside an explicit transaction are buffered and applied on
//! commit; auto-commit saves apply immediately. Either way the batch runs
//! under the store-wide commit lock with an undo log, so a failure midway
//! restores every table it touched before the error propagates.

use crate::cache::StoreCache;
use crate::error::{BridgeError, BridgeResult};
use crate::model::Key;
use crate::table::Table;
use docbridge_value::Document;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// The lifecycle state of a session's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction has been started.
    NotStarted,
    /// A transaction is open and buffering mutations.
    Active,
    /// The last transaction committed.
    Committed,
    /// The last transaction rolled back.
    RolledBack,
}

/// One buffered table mutation.
#[derive(Debug)]
pub(crate) enum TableOp {
    Insert(Document),
    Update(Key, Document),
    Delete(Key),
}

#[derive(Debug)]
pub(crate) struct BufferedOp {
    pub(crate) table: Arc<Table>,
    pub(crate) op: TableOp,
}

enum Undo {
    Remove { table: Arc<Table>, key: Key },
    Restore { table: Arc<Table>, key: Key, doc: Document },
}

impl Undo {
    fn revert(&self) {
        let result = match self {
            Self::Remove { table, key } => table.force_remove(key),
            Self::Restore { table, key, doc } => table.force_put(key, doc),
        };
        if let Err(err) = result {
            // The store itself failed while unwinding; nothing left to do
            // but surface it in the log.
            error!(error = %err, "failed to revert a mutation during rollback");
        }
    }
}

/// Begins, commits, and rolls back one session's transactions.
///
/// A session without an explicit transaction operates in auto-commit mode:
/// each save is wrapped in an implicit begin/commit pair.
///
/// Batches exclude each other through the commit lock, but scans do not take
/// that lock: a scan started while a batch is mid-apply can observe a
/// partially applied prefix. Atomicity holds for any read that starts after
/// commit or rollback has returned.
pub struct TransactionManager {
    cache: Arc<StoreCache>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: TransactionState,
    buffer: Vec<BufferedOp>,
}

impl TransactionManager {
    pub(crate) fn new(cache: Arc<StoreCache>) -> Self {
        Self {
            cache,
            inner: Mutex::new(Inner {
                state: TransactionState::NotStarted,
                buffer: Vec::new(),
            }),
        }
    }

    /// Returns the current transaction state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyActive`] if one is already open.
    pub fn begin(&self) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == TransactionState::Active {
            return Err(BridgeError::AlreadyActive);
        }
        inner.state = TransactionState::Active;
        inner.buffer.clear();
        debug!("transaction begun");
        Ok(())
    }

    /// Applies every buffered mutation atomically and closes the
    /// transaction. Returns the number of mutations applied.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoActiveTransaction`] without an open
    /// transaction. If any buffered mutation fails, the whole batch is
    /// unwound, the transaction ends rolled back, and the failure surfaces.
    pub fn commit(&self) -> BridgeResult<usize> {
        let mut inner = self.inner.lock();
        if inner.state != TransactionState::Active {
            return Err(BridgeError::NoActiveTransaction);
        }
        let ops = std::mem::take(&mut inner.buffer);
        match apply_batch(&self.cache, &ops) {
            Ok(count) => {
                inner.state = TransactionState::Committed;
                debug!(mutations = count, "transaction committed");
                Ok(count)
            }
            Err(err) => {
                inner.state = TransactionState::RolledBack;
                Err(err)
            }
        }
    }

    /// Discards every buffered mutation and closes the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoActiveTransaction`] without an open
    /// transaction.
    pub fn rollback(&self) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != TransactionState::Active {
            return Err(BridgeError::NoActiveTransaction);
        }
        let discarded = inner.buffer.len();
        inner.buffer.clear();
        inner.state = TransactionState::RolledBack;
        debug!(discarded, "transaction rolled back");
        Ok(())
    }

    /// Buffers a batch if a transaction is active; applies it immediately
    /// otherwise. Returns the batch size.
    pub(crate) fn submit(&self, ops: Vec<BufferedOp>) -> BridgeResult<usize> {
        let mut inner = self.inner.lock();
        if inner.state == TransactionState::Active {
            let count = ops.len();
            inner.buffer.extend(ops);
            return Ok(count);
        }
        drop(inner);
        apply_batch(&self.cache, &ops)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Applies a batch of mutations in submission order under the store-wide
/// commit lock. On any failure the already-applied prefix is reverted in
/// reverse order before the error returns.
fn apply_batch(cache: &StoreCache, ops: &[BufferedOp]) -> BridgeResult<usize> {
    let _commit = cache.lock_commit();
    let mut undo: Vec<Undo> = Vec::with_capacity(ops.len());

    for entry in ops {
        if let Err(err) = apply_one(entry, &mut undo) {
            for step in undo.iter().rev() {
                step.revert();
            }
            return Err(err);
        }
    }
    Ok(ops.len())
}

fn apply_one(entry: &BufferedOp, undo: &mut Vec<Undo>) -> BridgeResult<()> {
    let table = &entry.table;
    match &entry.op {
        TableOp::Insert(doc) => {
            let key = table.key_of(doc)?;
            table.insert(doc)?;
            undo.push(Undo::Remove {
                table: Arc::clone(table),
                key,
            });
        }
        TableOp::Update(key, changes) => {
            let before = table.get(key)?.ok_or_else(|| {
                BridgeError::not_found(table.entity_type().name(), key.to_string())
            })?;
            table.update(key, changes)?;
            undo.push(Undo::Restore {
                table: Arc::clone(table),
                key: key.clone(),
                doc: before,
            });
        }
        TableOp::Delete(key) => {
            let before = table.get(key)?.ok_or_else(|| {
                BridgeError::not_found(table.entity_type().name(), key.to_string())
            })?;
            table.delete(key)?;
            undo.push(Undo::Restore {
                table: Arc::clone(table),
                key: key.clone(),
                doc: before,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, ValueKind};
    use docbridge_store::{DocumentStore, InMemoryStore};
    use docbridge_value::Datum;

    fn cache() -> Arc<StoreCache> {
        Arc::new(StoreCache::new(Arc::new(InMemoryStore::new())))
    }

    fn person() -> Arc<EntityType> {
        EntityType::builder("Person")
            .key_property("Id", ValueKind::Int)
            .property("Name", ValueKind::Text)
            .build()
            .unwrap()
    }

    fn doc(id: i64, name: &str) -> Document {
        let mut d = Document::new();
        d.set("Id", Datum::Int(id));
        d.set("Name", Datum::Text(name.into()));
        d
    }

    fn insert_op(table: &Arc<Table>, id: i64, name: &str) -> BufferedOp {
        BufferedOp {
            table: Arc::clone(table),
            op: TableOp::Insert(doc(id, name)),
        }
    }

    #[test]
    fn protocol_misuse_is_rejected() {
        let manager = TransactionManager::new(cache());
        assert_eq!(manager.state(), TransactionState::NotStarted);

        assert!(matches!(
            manager.commit(),
            Err(BridgeError::NoActiveTransaction)
        ));
        assert!(matches!(
            manager.rollback(),
            Err(BridgeError::NoActiveTransaction)
        ));

        manager.begin().unwrap();
        assert!(matches!(manager.begin(), Err(BridgeError::AlreadyActive)));
    }

    #[test]
    fn commit_makes_buffered_mutations_visible() {
        let cache = cache();
        let manager = TransactionManager::new(Arc::clone(&cache));
        let table = cache.table_for(&person()).unwrap();

        manager.begin().unwrap();
        manager.submit(vec![insert_op(&table, 1, "Ann")]).unwrap();
        assert!(table.is_empty().unwrap());

        assert_eq!(manager.commit().unwrap(), 1);
        assert_eq!(manager.state(), TransactionState::Committed);
        assert_eq!(table.len().unwrap(), 1);
    }

    #[test]
    fn rollback_discards_buffered_mutations() {
        let cache = cache();
        let manager = TransactionManager::new(Arc::clone(&cache));
        let table = cache.table_for(&person()).unwrap();

        manager.begin().unwrap();
        manager.submit(vec![insert_op(&table, 1, "Ann")]).unwrap();
        manager.rollback().unwrap();

        assert_eq!(manager.state(), TransactionState::RolledBack);
        assert!(table.is_empty().unwrap());
    }

    #[test]
    fn manager_can_begin_again_after_commit() {
        let manager = TransactionManager::new(cache());
        manager.begin().unwrap();
        manager.commit().unwrap();
        manager.begin().unwrap();
        assert_eq!(manager.state(), TransactionState::Active);
    }

    #[test]
    fn failed_batch_unwinds_applied_prefix() {
        let cache = cache();
        let table = cache.table_for(&person()).unwrap();
        table.insert(&doc(2, "Ben")).unwrap();

        let manager = TransactionManager::new(Arc::clone(&cache));
        // The second op collides with the pre-existing row.
        let result = manager.submit(vec![
            insert_op(&table, 1, "Ann"),
            insert_op(&table, 2, "Imposter"),
        ]);
        assert!(matches!(result, Err(BridgeError::DuplicateKey { .. })));

        // The first insert was reverted and the existing row is intact.
        assert_eq!(table.len().unwrap(), 1);
        let key = Key::new(vec![Datum::Int(2)]);
        let row = table.get(&key).unwrap().unwrap();
        assert_eq!(row.get("Name"), Some(&Datum::Text("Ben".into())));
    }

    #[test]
    fn failed_update_restores_before_image() {
        let cache = cache();
        let table = cache.table_for(&person()).unwrap();
        table.insert(&doc(1, "Ann")).unwrap();

        let manager = TransactionManager::new(Arc::clone(&cache));
        let mut changes = Document::new();
        changes.set("Name", Datum::Text("Anna".into()));
        let result = manager.submit(vec![
            BufferedOp {
                table: Arc::clone(&table),
                op: TableOp::Update(Key::new(vec![Datum::Int(1)]), changes),
            },
            BufferedOp {
                table: Arc::clone(&table),
                op: TableOp::Delete(Key::new(vec![Datum::Int(404)])),
            },
        ]);
        assert!(matches!(result, Err(BridgeError::NotFound { .. })));

        let row = table
            .get(&Key::new(vec![Datum::Int(1)]))
            .unwrap()
            .unwrap();
        assert_eq!(row.get("Name"), Some(&Datum::Text("Ann".into())));
    }
}
