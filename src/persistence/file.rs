use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::adapter::PersistenceAdapter;
use crate::error::PersistenceError;

/// Longest key, in bytes, stored under its plain hex name.
pub const MAX_PLAIN_KEY_LEN: usize = 100;

/// Persistence backend storing one JSON file per key in a directory.
///
/// File names are the hex encoding of the key bytes, so any key is safe
/// regardless of separators. Keys longer than [`MAX_PLAIN_KEY_LEN`] bytes are
/// named by their SHA-256 digest instead to stay under filesystem name
/// limits. Each write goes to its own temp file in the directory, which is
/// then renamed over the target.
#[derive(Clone, Debug)]
pub struct FileAdapter {
    dir: PathBuf,
}

impl FileAdapter {
    /// Open (and create if needed) a storage directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let stem = if key.len() <= MAX_PLAIN_KEY_LEN {
            hex::encode(key)
        } else {
            format!("h-{}", hex::encode(Sha256::digest(key.as_bytes())))
        };
        self.dir.join(format!("{stem}.json"))
    }
}

impl PersistenceAdapter for FileAdapter {
    fn load_raw(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }

    fn save_raw(&self, key: &str, payload: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        let io_error = |source: std::io::Error| PersistenceError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_error)?;
        tmp.write_all(payload.as_bytes()).map_err(io_error)?;
        tmp.persist(&path).map_err(|e| io_error(e.error))?;
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();

        adapter.save_raw("app:counter", "42").unwrap();
        assert_eq!(adapter.load_raw("app:counter").unwrap().as_deref(), Some("42"));

        adapter.save_raw("app:counter", "43").unwrap();
        assert_eq!(adapter.load_raw("app:counter").unwrap().as_deref(), Some("43"));
    }

    #[test]
    fn missing_key_is_absent() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();

        assert_eq!(adapter.load_raw("nothing").unwrap(), None);
    }

    #[test]
    fn keys_with_separators_stay_inside_dir() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();

        adapter.save_raw("../escape/attempt", "1").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(adapter.load_raw("../escape/attempt").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn remove_deletes_file() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();

        adapter.save_raw("k", "1").unwrap();
        adapter.remove_raw("k").unwrap();
        adapter.remove_raw("k").unwrap();

        assert_eq!(adapter.load_raw("k").unwrap(), None);
    }

    #[test]
    fn creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");

        let adapter = FileAdapter::new(&nested).unwrap();

        assert!(nested.is_dir());
        assert_eq!(adapter.dir(), nested.as_path());
    }

    #[test]
    fn long_keys_round_trip() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();
        let key = "k".repeat(300);

        adapter.save_raw(&key, "1").unwrap();
        assert_eq!(adapter.load_raw(&key).unwrap().as_deref(), Some("1"));
        assert_eq!(adapter.load_raw(&"k".repeat(301)).unwrap(), None);

        let name = adapter.path_for(&key).file_name().unwrap().len();
        assert!(name < 255);
    }

    #[test]
    fn concurrent_writes_to_one_key_all_land() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let adapter = adapter.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        adapter.save_raw("shared", &format!("{t}-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let stored = adapter.load_raw("shared").unwrap().unwrap();
        assert!(stored.ends_with("-49"));

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
