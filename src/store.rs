//! Durable key/value settings.
//!
//! The pipeline persists a handful of values across host restarts: resolved binding
//! descriptors, the synthetic packet counter and user settings such as the envelope
//! passphrase. [`ConfigStore`] is the boundary for that; [`MemoryStore`] keeps values in
//! process and [`JsonFileStore`] mirrors them into a JSON document on disk, rewritten
//! atomically on every change.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde::{Deserialize, Serialize};

use crate::Result;

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    /// Integer setting
    Int(i64),
    /// Text setting
    Text(String),
}

/// Durable string/integer key-value store.
pub trait ConfigStore: Send + Sync {
    /// Read a raw value.
    fn get(&self, key: &str) -> Option<StoreValue>;

    /// Write a raw value.
    ///
    /// # Errors
    /// Returns an error if the value could not be persisted.
    fn set(&self, key: &str, value: StoreValue) -> Result<()>;

    /// Delete a value; deleting a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if the change could not be persisted.
    fn remove(&self, key: &str) -> Result<()>;

    /// Read a text value; integers are rendered.
    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            StoreValue::Text(text) => Some(text),
            StoreValue::Int(value) => Some(value.to_string()),
        }
    }

    /// Read an integer value; numeric text is parsed.
    fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            StoreValue::Int(value) => Some(value),
            StoreValue::Text(text) => text.trim().parse().ok(),
        }
    }

    /// Write a text value.
    ///
    /// # Errors
    /// Returns an error if the value could not be persisted.
    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, StoreValue::Text(value.to_string()))
    }

    /// Write an integer value.
    ///
    /// # Errors
    /// Returns an error if the value could not be persisted.
    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, StoreValue::Int(value))
    }
}

/// In-process store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, StoreValue>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        read_lock!(self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: StoreValue) -> Result<()> {
        write_lock!(self.values).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        write_lock!(self.values).remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk.
///
/// Values are cached in memory; every change rewrites the whole file through a
/// temporary file in the same directory that is then renamed over the target. A failed
/// rewrite rolls the in-memory change back.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, StoreValue>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing values. A missing file is an empty store.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file exists but cannot be read and
    /// [`crate::Error::Json`] if it is not a JSON object of strings and integers.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(JsonFileStore {
            path,
            values: RwLock::new(values),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, StoreValue>) -> Result<()> {
        let contents = serde_json::to_vec_pretty(values)?;
        atomic_write(&self.path, &contents)
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let temp = tempfile::NamedTempFile::new_in(dir)?;
    fs::write(temp.path(), data)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        read_lock!(self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: StoreValue) -> Result<()> {
        let mut values = write_lock!(self.values);
        let previous = values.insert(key.to_string(), value);
        if let Err(error) = self.flush(&values) {
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(error);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = write_lock!(self.values);
        if let Some(previous) = values.remove(key) {
            if let Err(error) = self.flush(&values) {
                values.insert(key.to_string(), previous);
                return Err(error);
            }
        }
        Ok(())
    }
}
