//! Durable store: one JSON document per key under a directory.
//!
//! Survives process restarts and is shared by every process pointed at the
//! same directory. Concurrent writers to one key resolve last-write-wins.

use common::Error;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::KeyValueStore;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Store(format!("cannot create store dir {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// Map a key to a safe file stem. ASCII alphanumerics, `-` and `_` pass
/// through; every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!("Corrupt store file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), Error> {
        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", encode_key(key), std::process::id()));
        let raw = serde_json::to_vec(value)?;

        fs::write(&tmp, raw)
            .map_err(|e| Error::Store(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::Store(format!("replace {}: {}", path.display(), e))
        })
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Store(format!("remove {}: {}", key, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        store.set("uploadedFiles", &json!([{"name": "a.csv"}])).unwrap();

        let reopened = JsonFileStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.get("uploadedFiles"), Some(json!([{"name": "a.csv"}])));
    }

    #[test]
    fn test_corrupt_file_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        fs::write(tmp.path().join("supplierClustering.json"), "[{\"x\": NaN}]").unwrap();
        assert!(store.get("supplierClustering").is_none());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        assert!(store.remove("dataLoaded").is_ok());
        store.set("dataLoaded", &json!(true)).unwrap();
        store.remove("dataLoaded").unwrap();
        assert!(store.get("dataLoaded").is_none());
    }

    #[test]
    fn test_key_encoding_stays_inside_dir() {
        assert_eq!(encode_key("topReorderPoints"), "topReorderPoints");
        assert_eq!(encode_key("../etc"), "%2E%2E%2Fetc");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        store.set("k", &json!(1)).unwrap();
        store.set("k", &json!(2)).unwrap();
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }
}
