use super::{DatabaseSchema, StoreMedium, StoredRecord};
use crate::error::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryDatabase {
    schema: Option<DatabaseSchema>,
    stores: BTreeMap<String, BTreeMap<String, StoredRecord>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    databases: BTreeMap<String, MemoryDatabase>,
    writes: usize,
    deleted_databases: usize,
}

/// In-process medium. Clones share the same state, so a test can keep one
/// handle while the worker owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful `put` and `add` calls so far.
    pub fn writes(&self) -> usize {
        self.lock().map(|s| s.writes).unwrap_or(0)
    }

    pub fn deleted_databases(&self) -> usize {
        self.lock().map(|s| s.deleted_databases).unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn store_mut<'a>(
    state: &'a mut MemoryState,
    db: &str,
    store: &str,
) -> StoreResult<&'a mut BTreeMap<String, StoredRecord>> {
    state
        .databases
        .get_mut(db)
        .ok_or_else(|| StoreError::NoSuchDatabase(db.to_string()))?
        .stores
        .get_mut(store)
        .ok_or_else(|| StoreError::NoSuchStore(store.to_string()))
}

fn store_ref<'a>(
    state: &'a MemoryState,
    db: &str,
    store: &str,
) -> StoreResult<&'a BTreeMap<String, StoredRecord>> {
    state
        .databases
        .get(db)
        .ok_or_else(|| StoreError::NoSuchDatabase(db.to_string()))?
        .stores
        .get(store)
        .ok_or_else(|| StoreError::NoSuchStore(store.to_string()))
}

impl StoreMedium for MemoryMedium {
    fn open_database(&mut self, name: &str, schema: &DatabaseSchema) -> StoreResult<bool> {
        let mut state = self.lock()?;
        if state.databases.contains_key(name) {
            return Ok(false);
        }
        let mut database = MemoryDatabase {
            schema: Some(schema.clone()),
            ..Default::default()
        };
        for store in &schema.stores {
            database.stores.insert(store.name.clone(), BTreeMap::new());
        }
        state.databases.insert(name.to_string(), database);
        Ok(true)
    }

    fn delete_database(&mut self, name: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.databases.remove(name).is_some() {
            state.deleted_databases += 1;
        }
        Ok(())
    }

    fn database_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.databases.keys().cloned().collect())
    }

    fn get(&self, db: &str, store: &str, key: &str) -> StoreResult<Option<StoredRecord>> {
        let state = self.lock()?;
        Ok(store_ref(&state, db, store)?.get(key).cloned())
    }

    fn put(&mut self, db: &str, store: &str, record: StoredRecord) -> StoreResult<()> {
        let mut state = self.lock()?;
        store_mut(&mut state, db, store)?.insert(record.key.clone(), record);
        state.writes += 1;
        Ok(())
    }

    fn add(&mut self, db: &str, store: &str, record: StoredRecord) -> StoreResult<()> {
        let mut state = self.lock()?;
        let records = store_mut(&mut state, db, store)?;
        if records.contains_key(&record.key) {
            return Err(StoreError::KeyExists {
                store: store.to_string(),
                key: record.key,
            });
        }
        records.insert(record.key.clone(), record);
        state.writes += 1;
        Ok(())
    }

    fn delete(&mut self, db: &str, store: &str, key: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        store_mut(&mut state, db, store)?.remove(key);
        Ok(())
    }

    fn keys(&self, db: &str, store: &str) -> StoreResult<Vec<String>> {
        let state = self.lock()?;
        Ok(store_ref(&state, db, store)?.keys().cloned().collect())
    }

    fn find_by_index(
        &self,
        db: &str,
        store: &str,
        index: &str,
        value: u64,
    ) -> StoreResult<Vec<String>> {
        let state = self.lock()?;
        let declared = state
            .databases
            .get(db)
            .and_then(|d| d.schema.as_ref())
            .and_then(|s| s.store(store))
            .is_some_and(|s| s.indices.iter().any(|i| i == index));
        if !declared {
            return Err(StoreError::NoSuchStore(format!("{store}/{index}")));
        }
        Ok(store_ref(&state, db, store)?
            .values()
            .filter(|r| r.indices.get(index) == Some(&value))
            .map(|r| r.key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::StoreSchema;

    fn schema() -> DatabaseSchema {
        DatabaseSchema {
            version: 1,
            stores: vec![StoreSchema {
                name: "images".into(),
                key_path: "name".into(),
                indices: vec!["width".into()],
            }],
        }
    }

    #[test]
    fn add_refuses_existing_keys_put_overwrites() {
        let mut medium = MemoryMedium::new();
        assert!(medium.open_database("db", &schema()).unwrap());
        assert!(!medium.open_database("db", &schema()).unwrap());

        medium.add("db", "images", StoredRecord::new("a", vec![1])).unwrap();
        let err = medium.add("db", "images", StoredRecord::new("a", vec![2])).unwrap_err();
        assert!(matches!(err, StoreError::KeyExists { .. }));

        medium.put("db", "images", StoredRecord::new("a", vec![3])).unwrap();
        assert_eq!(medium.get("db", "images", "a").unwrap().unwrap().bytes, vec![3]);
        assert_eq!(medium.writes(), 2);
    }

    #[test]
    fn index_lookup_matches_values() {
        let mut medium = MemoryMedium::new();
        medium.open_database("db", &schema()).unwrap();
        medium
            .put("db", "images", StoredRecord::new("a", vec![]).with_index("width", 640))
            .unwrap();
        medium
            .put("db", "images", StoredRecord::new("b", vec![]).with_index("width", 320))
            .unwrap();
        assert_eq!(medium.find_by_index("db", "images", "width", 640).unwrap(), vec!["a"]);
        assert!(medium.find_by_index("db", "images", "height", 640).is_err());
    }

    #[test]
    fn clones_share_state() {
        let mut medium = MemoryMedium::new();
        let observer = medium.clone();
        medium.open_database("db", &schema()).unwrap();
        medium.delete_database("db").unwrap();
        assert_eq!(observer.deleted_databases(), 1);
        assert!(observer.database_names().unwrap().is_empty());
    }
}
