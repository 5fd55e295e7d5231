// Path: crates/api/src/database.rs
//! The key-value database contract served to plugins, one server per version.

use parking_lot::RwLock;
use plugvm_types::DatabaseError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single write in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// A forward iterator over a consistent range of key-value pairs.
pub trait DbIterator: Iterator<Item = (Vec<u8>, Vec<u8>)> + Send {
    /// Returns the error that ended iteration early, if any.
    fn error(&self) -> Result<(), DatabaseError>;
    /// Frees resources held by the iterator. Further calls to `next` return `None`.
    fn release(&mut self);
}

/// A thread-safe key-value store.
///
/// Implementations are shared between concurrent proxy calls, so every method
/// takes `&self`.
pub trait Database: Send + Sync {
    fn has(&self, key: &[u8]) -> Result<bool, DatabaseError>;
    /// Returns the value stored at `key`, or [`DatabaseError::NotFound`].
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, DatabaseError>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError>;
    fn delete(&self, key: &[u8]) -> Result<(), DatabaseError>;
    /// Compacts the key range `[start, limit)`. Empty bounds are open.
    fn compact(&self, start: &[u8], limit: &[u8]) -> Result<(), DatabaseError>;
    fn close(&self) -> Result<(), DatabaseError>;
    /// Returns a JSON health report.
    fn health_check(&self) -> Result<serde_json::Value, DatabaseError>;
    /// Applies every operation in order, atomically.
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), DatabaseError>;
    /// Iterates keys that are `>= start` and begin with `prefix`, in key order.
    fn iterator(&self, start: &[u8], prefix: &[u8]) -> Result<Box<dyn DbIterator>, DatabaseError>;
}

/// A database tagged with the semantic version of its on-disk format.
#[derive(Clone)]
pub struct VersionedDatabase {
    /// e.g. `"v1.0.0"`.
    pub version: String,
    pub db: Arc<dyn Database>,
}

impl std::fmt::Debug for VersionedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedDatabase")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Yields the node's databases, newest version first.
pub trait DatabaseManager: Send + Sync {
    fn databases(&self) -> Vec<VersionedDatabase>;

    /// The database of the current version.
    fn current(&self) -> Option<VersionedDatabase> {
        self.databases().into_iter().next()
    }
}

/// A [`DatabaseManager`] over a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticDatabaseManager {
    databases: Vec<VersionedDatabase>,
}

impl StaticDatabaseManager {
    pub fn new(databases: Vec<VersionedDatabase>) -> Self {
        Self { databases }
    }

    /// A manager holding a single fresh in-memory database at `version`.
    pub fn single_in_memory(version: &str) -> Self {
        Self::new(vec![VersionedDatabase {
            version: version.to_string(),
            db: Arc::new(MemDb::new()),
        }])
    }
}

impl DatabaseManager for StaticDatabaseManager {
    fn databases(&self) -> Vec<VersionedDatabase> {
        self.databases.clone()
    }
}

/// An ordered in-memory database.
#[derive(Debug, Default)]
pub struct MemDb {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        Ok(())
    }
}

impl Database for MemDb {
    fn has(&self, key: &[u8]) -> Result<bool, DatabaseError> {
        self.ensure_open()?;
        Ok(self.entries.read().contains_key(key))
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, DatabaseError> {
        self.ensure_open()?;
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn compact(&self, _start: &[u8], _limit: &[u8]) -> Result<(), DatabaseError> {
        self.ensure_open()
    }

    fn close(&self) -> Result<(), DatabaseError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DatabaseError::Closed);
        }
        self.entries.write().clear();
        Ok(())
    }

    fn health_check(&self) -> Result<serde_json::Value, DatabaseError> {
        self.ensure_open()?;
        Ok(serde_json::Value::Null)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        let mut entries = self.entries.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn iterator(&self, start: &[u8], prefix: &[u8]) -> Result<Box<dyn DbIterator>, DatabaseError> {
        self.ensure_open()?;
        let lower = if start > prefix { start } else { prefix };
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .read()
            .range(lower.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(SnapshotIterator {
            items: snapshot.into_iter(),
        }))
    }
}

/// Iterates over a copy taken when the iterator was created.
struct SnapshotIterator {
    items: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
}

impl Iterator for SnapshotIterator {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl DbIterator for SnapshotIterator {
    fn error(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn release(&mut self) {
        self.items = Vec::new().into_iter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_key_is_not_found() {
        let db = MemDb::new();
        assert_eq!(db.get(b"absent"), Err(DatabaseError::NotFound));
        db.put(b"k", b"v").unwrap();
        assert_eq!(db.get(b"k").unwrap(), b"v".to_vec());
        assert!(db.has(b"k").unwrap());
    }

    #[test]
    fn iterator_respects_start_and_prefix() {
        let db = MemDb::new();
        for key in [&b"a1"[..], b"a2", b"a3", b"b1"] {
            db.put(key, key).unwrap();
        }
        let keys: Vec<Vec<u8>> = db.iterator(b"a2", b"a").unwrap().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a2".to_vec(), b"a3".to_vec()]);

        let mut it = db.iterator(b"", b"").unwrap();
        assert_eq!(it.next().map(|(k, _)| k), Some(b"a1".to_vec()));
        it.release();
        assert!(it.next().is_none());
        assert!(it.error().is_ok());
    }

    #[test]
    fn batch_applies_in_order() {
        let db = MemDb::new();
        db.write_batch(vec![
            BatchOp::Put {
                key: b"k".to_vec(),
                value: b"1".to_vec(),
            },
            BatchOp::Delete { key: b"k".to_vec() },
            BatchOp::Put {
                key: b"j".to_vec(),
                value: b"2".to_vec(),
            },
        ])
        .unwrap();
        assert!(!db.has(b"k").unwrap());
        assert_eq!(db.get(b"j").unwrap(), b"2".to_vec());
    }

    #[test]
    fn closed_database_rejects_calls() {
        let db = MemDb::new();
        db.close().unwrap();
        assert_eq!(db.put(b"k", b"v"), Err(DatabaseError::Closed));
        assert_eq!(db.close(), Err(DatabaseError::Closed));
    }

    #[test]
    fn manager_current_is_first_database() {
        let manager = StaticDatabaseManager::single_in_memory("v1.0.0");
        assert_eq!(manager.current().unwrap().version, "v1.0.0");
        assert_eq!(manager.databases().len(), 1);
    }
}
