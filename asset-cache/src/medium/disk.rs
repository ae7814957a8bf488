use super::{DatabaseSchema, StoreMedium, StoredRecord};
use crate::error::{StoreError, StoreResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const SCHEMA_FILE: &str = "schema.json";
const NAME_FILE: &str = "name";
const RECORD_EXT: &str = "rec";
/// Longest hex encoded file name. Longer names are stored under a digest.
const MAX_HEX_NAME: usize = 128;
const DIGEST_MARK: char = '~';

/// Directory-backed medium.
///
/// ```text
/// <root>/<name(db)>/schema.json
/// <root>/<name(db)>/name                           database name, utf-8
/// <root>/<name(db)>/<name(store)>/<name(key)>.rec  bincode StoredRecord
/// ```
///
/// `name(s)` is `s` hex encoded, or `~` and a 64-bit FNV-1a digest of `s` once the hex
/// form would pass `MAX_HEX_NAME` characters. Digest named records are told apart by
/// the key they carry.
#[derive(Debug, Clone)]
pub struct DiskMedium {
    root: PathBuf,
}

impl DiskMedium {
    /// Open (creating if needed) a medium rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn db_dir(&self, db: &str) -> PathBuf {
        self.root.join(file_name(db))
    }

    fn schema(&self, db: &str) -> StoreResult<DatabaseSchema> {
        let path = self.db_dir(db).join(SCHEMA_FILE);
        if !path.exists() {
            return Err(StoreError::NoSuchDatabase(db.to_string()));
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    fn store_dir(&self, db: &str, store: &str) -> StoreResult<PathBuf> {
        let schema = self.schema(db)?;
        if schema.store(store).is_none() {
            return Err(StoreError::NoSuchStore(store.to_string()));
        }
        Ok(self.db_dir(db).join(file_name(store)))
    }

    fn record_path(&self, db: &str, store: &str, key: &str) -> StoreResult<PathBuf> {
        Ok(self
            .store_dir(db, store)?
            .join(format!("{}.{RECORD_EXT}", file_name(key))))
    }

    /// Record at `path` when it belongs to `key`.
    fn read_record(path: &Path, key: &str) -> StoreResult<Option<StoredRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let record: StoredRecord = bincode::deserialize(&fs::read(path)?)?;
        Ok((record.key == key).then_some(record))
    }

    /// Fail when a different key already owns the file `key` maps to.
    fn check_owner(path: &Path, key: &str) -> StoreResult<()> {
        if !is_digest(path) || !path.exists() {
            return Ok(());
        }
        let existing: StoredRecord = bincode::deserialize(&fs::read(path)?)?;
        if existing.key != key {
            return Err(StoreError::NameCollision {
                key: key.to_string(),
                existing: existing.key,
            });
        }
        Ok(())
    }

    fn records(&self, db: &str, store: &str) -> StoreResult<Vec<StoredRecord>> {
        let dir = self.store_dir(db, store)?;
        let mut records = Vec::new();
        for path in record_files(&dir)? {
            records.push(bincode::deserialize::<StoredRecord>(&fs::read(path)?)?);
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn record_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXT) {
            files.push(path);
        }
    }
    Ok(files)
}

fn list_keys(dir: &Path) -> StoreResult<Vec<String>> {
    let mut keys = Vec::new();
    for path in record_files(dir)? {
        if is_digest(&path) {
            let record: StoredRecord = bincode::deserialize(&fs::read(&path)?)?;
            keys.push(record.key);
        } else if let Some(key) = path.file_stem().and_then(|s| s.to_str()).and_then(hex_decode) {
            keys.push(key);
        }
    }
    keys.sort();
    Ok(keys)
}

fn file_name(s: &str) -> String {
    let hex = hex_encode(s);
    if hex.len() <= MAX_HEX_NAME {
        hex
    } else {
        format!("{DIGEST_MARK}{:016x}", fnv1a(s.as_bytes()))
    }
}

fn is_digest(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with(DIGEST_MARK))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn hex_encode(s: &str) -> String {
    s.bytes().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<String> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

/// Name of the database in `dir`. Directories without a name file are hex named.
fn database_name(dir: &Path) -> StoreResult<Option<String>> {
    let path = dir.join(NAME_FILE);
    if path.exists() {
        return Ok(String::from_utf8(fs::read(path)?).ok());
    }
    Ok(dir.file_name().and_then(|s| s.to_str()).and_then(hex_decode))
}

impl StoreMedium for DiskMedium {
    fn open_database(&mut self, name: &str, schema: &DatabaseSchema) -> StoreResult<bool> {
        let dir = self.db_dir(name);
        if dir.join(SCHEMA_FILE).exists() {
            return match database_name(&dir)? {
                Some(existing) if existing != name => Err(StoreError::NameCollision {
                    key: name.to_string(),
                    existing,
                }),
                _ => Ok(false),
            };
        }
        for store in &schema.stores {
            fs::create_dir_all(dir.join(file_name(&store.name)))?;
        }
        write_atomic(&dir.join(NAME_FILE), name.as_bytes())?;
        write_atomic(&dir.join(SCHEMA_FILE), &serde_json::to_vec_pretty(schema)?)?;
        Ok(true)
    }

    fn delete_database(&mut self, name: &str) -> StoreResult<()> {
        let dir = self.db_dir(name);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    fn database_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.join(SCHEMA_FILE).exists() {
                continue;
            }
            if let Some(name) = database_name(&path)? {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn get(&self, db: &str, store: &str, key: &str) -> StoreResult<Option<StoredRecord>> {
        let path = self.record_path(db, store, key)?;
        Self::read_record(&path, key)
    }

    fn put(&mut self, db: &str, store: &str, record: StoredRecord) -> StoreResult<()> {
        let path = self.record_path(db, store, &record.key)?;
        Self::check_owner(&path, &record.key)?;
        write_atomic(&path, &bincode::serialize(&record)?)
    }

    fn add(&mut self, db: &str, store: &str, record: StoredRecord) -> StoreResult<()> {
        let path = self.record_path(db, store, &record.key)?;
        Self::check_owner(&path, &record.key)?;
        if path.exists() {
            return Err(StoreError::KeyExists {
                store: store.to_string(),
                key: record.key,
            });
        }
        write_atomic(&path, &bincode::serialize(&record)?)
    }

    fn delete(&mut self, db: &str, store: &str, key: &str) -> StoreResult<()> {
        let path = self.record_path(db, store, key)?;
        if Self::read_record(&path, key)?.is_some() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self, db: &str, store: &str) -> StoreResult<Vec<String>> {
        list_keys(&self.store_dir(db, store)?)
    }

    fn find_by_index(
        &self,
        db: &str,
        store: &str,
        index: &str,
        value: u64,
    ) -> StoreResult<Vec<String>> {
        let schema = self.schema(db)?;
        let declared = schema
            .store(store)
            .is_some_and(|s| s.indices.iter().any(|i| i == index));
        if !declared {
            return Err(StoreError::NoSuchStore(format!("{store}/{index}")));
        }
        Ok(self
            .records(db, store)?
            .into_iter()
            .filter(|r| r.indices.get(index) == Some(&value))
            .map(|r| r.key)
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
                name: "points-data".into(),
                key_path: "name".into(),
                indices: vec![],
            }],
        }
    }

    #[test]
    fn hex_names_round_trip() {
        let name = "frame/0001 ünïcode.pcd";
        assert_eq!(hex_decode(&hex_encode(name)).as_deref(), Some(name));
        assert_eq!(hex_decode("abc"), None);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut medium = DiskMedium::open(dir.path()).unwrap();
            assert!(medium.open_database("task-a", &schema()).unwrap());
            medium
                .add("task-a", "points-data", StoredRecord::new("p/1", vec![9, 8, 7]))
                .unwrap();
        }

        let mut medium = DiskMedium::open(dir.path()).unwrap();
        assert!(!medium.open_database("task-a", &schema()).unwrap());
        assert_eq!(medium.keys("task-a", "points-data").unwrap(), vec!["p/1"]);
        assert!(matches!(
            medium.add("task-a", "points-data", StoredRecord::new("p/1", vec![])),
            Err(StoreError::KeyExists { .. })
        ));
        assert_eq!(medium.database_names().unwrap(), vec!["task-a"]);

        medium.delete_database("task-a").unwrap();
        assert!(medium.database_names().unwrap().is_empty());
        assert!(matches!(
            medium.get("task-a", "points-data", "p/1"),
            Err(StoreError::NoSuchDatabase(_))
        ));
    }

    #[test]
    fn long_names_fit_the_file_system() {
        let dir = tempfile::tempdir().unwrap();
        let db = format!("task-{}", "d".repeat(300));
        let key = format!("frames/{}.pcd", "k".repeat(300));
        {
            let mut medium = DiskMedium::open(dir.path()).unwrap();
            assert!(medium.open_database(&db, &schema()).unwrap());
            medium
                .add(&db, "points-data", StoredRecord::new(key.clone(), vec![1, 2, 3]))
                .unwrap();
            medium
                .put(&db, "points-data", StoredRecord::new("short", vec![4]))
                .unwrap();
        }

        let mut medium = DiskMedium::open(dir.path()).unwrap();
        assert!(!medium.open_database(&db, &schema()).unwrap());
        assert_eq!(medium.database_names().unwrap(), vec![db.clone()]);
        let mut keys = vec![key.clone(), "short".to_string()];
        keys.sort();
        assert_eq!(medium.keys(&db, "points-data").unwrap(), keys);
        let record = medium.get(&db, "points-data", &key).unwrap().unwrap();
        assert_eq!(record.bytes, vec![1, 2, 3]);
        assert!(matches!(
            medium.add(&db, "points-data", StoredRecord::new(key.clone(), vec![])),
            Err(StoreError::KeyExists { .. })
        ));

        medium.delete(&db, "points-data", &key).unwrap();
        assert_eq!(medium.keys(&db, "points-data").unwrap(), vec!["short"]);
    }

    #[test]
    fn digest_names_are_bounded() {
        let long = "x".repeat(100);
        assert!(file_name(&long).starts_with(DIGEST_MARK));
        assert_eq!(file_name(&long).len(), 17);
        assert_eq!(file_name("p/1"), hex_encode("p/1"));
        assert_ne!(file_name(&long), file_name(&"x".repeat(101)));
    }
}
