/// Top-level task registry and LRU-by-creation eviction
use crate::config::CacheConfig;
use crate::error::{StoreError, StoreResult};
use crate::medium::{DatabaseSchema, StoreMedium, StoreSchema, StoredRecord};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    /// Milliseconds since the unix epoch, strictly increasing across records.
    pub created_at: u64,
}

/// Handle over the registry database. Holds only names; the medium is borrowed per call.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    db: String,
    store: String,
}

impl TaskRegistry {
    /// Open (or create) the registry database described by `config`.
    pub fn open(medium: &mut dyn StoreMedium, config: &CacheConfig) -> StoreResult<Self> {
        let schema = DatabaseSchema {
            version: config.db_version,
            stores: vec![StoreSchema {
                name: config.registry_name.clone(),
                key_path: "name".to_string(),
                indices: Vec::new(),
            }],
        };
        if medium.open_database(&config.registry_name, &schema)? {
            info!("Created task registry '{}'", config.registry_name);
        }
        Ok(Self {
            db: config.registry_name.clone(),
            store: config.registry_name.clone(),
        })
    }

    /// Every task, oldest first.
    pub fn tasks(&self, medium: &dyn StoreMedium) -> StoreResult<Vec<TaskRecord>> {
        let mut tasks = Vec::new();
        for key in medium.keys(&self.db, &self.store)? {
            if let Some(record) = medium.get(&self.db, &self.store, &key)? {
                tasks.push(serde_json::from_slice::<TaskRecord>(&record.bytes)?);
            }
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(tasks)
    }

    pub fn contains(&self, medium: &dyn StoreMedium, name: &str) -> StoreResult<bool> {
        medium.contains(&self.db, &self.store, name)
    }

    /// Make room for `incoming` when it is new: evict the oldest tasks until
    /// exactly one slot below `limit` is free. Returns the evicted names.
    pub fn evict_for(
        &self,
        medium: &mut dyn StoreMedium,
        incoming: &str,
        limit: usize,
    ) -> StoreResult<Vec<String>> {
        if self.contains(medium, incoming)? {
            return Ok(Vec::new());
        }
        let tasks = self.tasks(medium)?;
        let excess = (tasks.len() + 1).saturating_sub(limit.max(1));

        let mut evicted = Vec::with_capacity(excess);
        for task in tasks.into_iter().take(excess) {
            medium.delete_database(&task.name)?;
            medium.delete(&self.db, &self.store, &task.name)?;
            info!("Evicted task cache '{}'", task.name);
            evicted.push(task.name);
        }
        Ok(evicted)
    }

    /// Add `name` with a creation time after every existing record.
    pub fn record(&self, medium: &mut dyn StoreMedium, name: &str) -> StoreResult<TaskRecord> {
        let latest = self
            .tasks(medium)?
            .last()
            .map(|t| t.created_at)
            .unwrap_or(0);
        let record = TaskRecord {
            name: name.to_string(),
            created_at: now_ms().max(latest + 1),
        };
        let stored = StoredRecord::new(name, serde_json::to_vec(&record)?);
        match medium.add(&self.db, &self.store, stored) {
            Ok(()) | Err(StoreError::KeyExists { .. }) => Ok(record),
            Err(err) => Err(err),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::MemoryMedium;

    #[test]
    fn eviction_keeps_most_recent_tasks() {
        let mut medium = MemoryMedium::new();
        let config = CacheConfig::new("unused");
        let registry = TaskRegistry::open(&mut medium, &config).unwrap();
        let schema = DatabaseSchema {
            version: 1,
            stores: vec![],
        };

        for i in 0..5 {
            let name = format!("task-{i}");
            registry.evict_for(&mut medium, &name, 2).unwrap();
            medium.open_database(&name, &schema).unwrap();
            registry.record(&mut medium, &name).unwrap();
        }

        let names: Vec<String> = registry
            .tasks(&medium)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["task-3", "task-4"]);
        assert_eq!(
            medium.database_names().unwrap(),
            vec!["spo-db-list", "task-3", "task-4"]
        );
    }

    #[test]
    fn known_task_evicts_nothing() {
        let mut medium = MemoryMedium::new();
        let registry = TaskRegistry::open(&mut medium, &CacheConfig::default()).unwrap();
        registry.record(&mut medium, "a").unwrap();
        registry.record(&mut medium, "b").unwrap();
        assert!(registry.evict_for(&mut medium, "a", 2).unwrap().is_empty());
        assert_eq!(registry.evict_for(&mut medium, "c", 2).unwrap(), vec!["a"]);
    }
}
