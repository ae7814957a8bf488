/// Cache store configuration, handed to the worker as its startup message
use constants::cache::{
    DEFAULT_DB_VERSION, DEFAULT_TASK_LIMIT, IMAGES_OBJECT_STORE, POINTS_OBJECT_STORE,
    TASK_REGISTRY_DB,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the session's task cache. Also the name of its database.
    pub task_name: String,
    /// Task caches kept before the oldest are evicted. Values below 1 act as 1.
    pub task_limit: usize,
    pub registry_name: String,
    pub points_store: String,
    pub images_store: String,
    pub db_version: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            task_name: String::new(),
            task_limit: DEFAULT_TASK_LIMIT,
            registry_name: TASK_REGISTRY_DB.to_string(),
            points_store: POINTS_OBJECT_STORE.to_string(),
            images_store: IMAGES_OBJECT_STORE.to_string(),
            db_version: DEFAULT_DB_VERSION,
        }
    }
}

impl CacheConfig {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            ..Self::default()
        }
    }

    pub fn with_task_limit(mut self, task_limit: usize) -> Self {
        self.task_limit = task_limit;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn effective_limit(&self) -> usize {
        self.task_limit.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = CacheConfig::from_json_str(r#"{ "task_name": "task-7" }"#).unwrap();
        assert_eq!(config.task_name, "task-7");
        assert_eq!(config.task_limit, DEFAULT_TASK_LIMIT);
        assert_eq!(config.points_store, "points-data");
        assert_eq!(config.registry_name, "spo-db-list");
    }

    #[test]
    fn zero_limit_still_keeps_current_task() {
        assert_eq!(CacheConfig::new("t").with_task_limit(0).effective_limit(), 1);
    }
}
