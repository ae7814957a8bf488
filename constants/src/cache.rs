/// Maximum number of task caches kept side by side before the oldest are evicted.
pub const DEFAULT_TASK_LIMIT: usize = 2;

/// Name of the top-level database listing every task cache.
pub const TASK_REGISTRY_DB: &str = "spo-db-list";

/// Object store holding decoded point clouds inside a task database.
pub const POINTS_OBJECT_STORE: &str = "points-data";

/// Object store holding image blobs inside a task database.
pub const IMAGES_OBJECT_STORE: &str = "images-data";

/// Secondary indices declared on the image store.
pub const IMAGE_INDICES: &[&str] = &["width", "height"];

/// Schema version written alongside every database.
pub const DEFAULT_DB_VERSION: u32 = 1;
