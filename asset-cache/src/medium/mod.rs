//! Persistent key-value storage behind the cache worker.
//!
//! A medium holds named databases, each with a fixed set of object stores. Every
//! record is keyed by one string primary key and may carry integer secondary
//! index values. Only the worker thread ever touches a medium.

mod disk;
mod memory;

pub use disk::DiskMedium;
pub use memory::MemoryMedium;

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    pub name: String,
    pub key_path: String,
    pub indices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub version: u32,
    pub stores: Vec<StoreSchema>,
}

impl DatabaseSchema {
    pub fn store(&self, name: &str) -> Option<&StoreSchema> {
        self.stores.iter().find(|s| s.name == name)
    }
}

/// One stored value with its primary key and index values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub indices: BTreeMap<String, u64>,
    pub bytes: Vec<u8>,
}

impl StoredRecord {
    pub fn new(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            indices: BTreeMap::new(),
            bytes,
        }
    }

    pub fn with_index(mut self, index: impl Into<String>, value: u64) -> Self {
        self.indices.insert(index.into(), value);
        self
    }
}

pub trait StoreMedium: Send {
    /// Open `name`, creating it with `schema` when absent. Returns whether it was created.
    fn open_database(&mut self, name: &str, schema: &DatabaseSchema) -> StoreResult<bool>;

    fn delete_database(&mut self, name: &str) -> StoreResult<()>;

    /// Every database name, sorted.
    fn database_names(&self) -> StoreResult<Vec<String>>;

    fn get(&self, db: &str, store: &str, key: &str) -> StoreResult<Option<StoredRecord>>;

    /// Insert or overwrite.
    fn put(&mut self, db: &str, store: &str, record: StoredRecord) -> StoreResult<()>;

    /// Insert only, failing with `KeyExists` when the key is present.
    fn add(&mut self, db: &str, store: &str, record: StoredRecord) -> StoreResult<()>;

    fn delete(&mut self, db: &str, store: &str, key: &str) -> StoreResult<()>;

    /// Every primary key in `store`, sorted.
    fn keys(&self, db: &str, store: &str) -> StoreResult<Vec<String>>;

    /// Keys whose `index` value equals `value`, sorted.
    fn find_by_index(&self, db: &str, store: &str, index: &str, value: u64)
    -> StoreResult<Vec<String>>;

    fn contains(&self, db: &str, store: &str, key: &str) -> StoreResult<bool> {
        Ok(self.get(db, store, key)?.is_some())
    }
}
