//! Durable, directory-backed definition store.
//!
//! Layout:
//!
//! ```text
//! <store_path>/
//! ├─ DEFINITIONS       # All records (magic, version, CBOR body)
//! ├─ DEFINITIONS.tmp   # Transient, only during a save
//! └─ LOCK              # Advisory lock for single-writer
//! ```
//!
//! Every save rewrites `DEFINITIONS` with the write-then-rename pattern, so
//! a crash leaves either the previous or the new record set on disk.

use super::{detached, DefinitionStore};
use crate::config::StoreConfig;
use crate::definition::Definition;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for the records file.
pub const STORE_MAGIC: [u8; 4] = *b"RSDF";

/// Current records file version.
pub const STORE_VERSION: u16 = 1;

const RECORDS_FILE: &str = "DEFINITIONS";
const RECORDS_TEMP: &str = "DEFINITIONS.tmp";
const LOCK_FILE: &str = "LOCK";

/// A definition store persisted in a directory.
///
/// # Thread Safety
///
/// The store holds an exclusive lock on its directory for its lifetime, so
/// only one `FileDefinitionStore` can exist per directory at a time. Within
/// the process, records are guarded by a read-write lock and saves are
/// serialized.
#[derive(Debug)]
pub struct FileDefinitionStore {
    path: PathBuf,
    config: StoreConfig,
    records: RwLock<BTreeMap<String, Definition>>,
    _lock_file: File,
}

impl FileDefinitionStore {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreLocked`)
    /// - The records file is corrupt or from a newer version
    /// - I/O errors occur
    pub fn open(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        let records = load_records(&path.join(RECORDS_FILE))?;
        debug!(path = %path.display(), count = records.len(), "opened definition store");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            records: RwLock::new(records),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of stored definitions.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn persist(&self, records: &BTreeMap<String, Definition>) -> CoreResult<()> {
        let data = encode(records)?;
        let records_path = self.path.join(RECORDS_FILE);
        let temp_path = self.path.join(RECORDS_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        if self.config.sync_on_save {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&temp_path, &records_path)?;

        if self.config.sync_on_save {
            self.sync_directory()?;
        }
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}

impl DefinitionStore for FileDefinitionStore {
    fn find_by_key(&self, key: &str) -> CoreResult<Option<Definition>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn save(&self, definition: &Definition) -> CoreResult<()> {
        let mut records = self.records.write();
        let previous = records.insert(definition.key().to_string(), detached(definition));
        if let Err(e) = self.persist(&records) {
            // keep memory and disk in agreement
            match previous {
                Some(old) => records.insert(old.key().to_string(), old),
                None => records.remove(definition.key()),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> CoreResult<bool> {
        let mut records = self.records.write();
        let Some(old) = records.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&records) {
            records.insert(key.to_string(), old);
            return Err(e);
        }
        Ok(true)
    }

    fn all(&self) -> CoreResult<Vec<Definition>> {
        Ok(self.records.read().values().cloned().collect())
    }
}

fn load_records(path: &Path) -> CoreResult<BTreeMap<String, Definition>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    if data.is_empty() {
        return Ok(BTreeMap::new());
    }

    let definitions = decode(&data)?;
    Ok(definitions
        .into_iter()
        .map(|d| (d.key().to_string(), d))
        .collect())
}

fn encode(records: &BTreeMap<String, Definition>) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&STORE_MAGIC);
    buf.extend_from_slice(&STORE_VERSION.to_le_bytes());

    let body: Vec<&Definition> = records.values().collect();
    ciborium::into_writer(&body, &mut buf).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(buf)
}

fn decode(data: &[u8]) -> CoreResult<Vec<Definition>> {
    if data.len() < 6 || data[0..4] != STORE_MAGIC {
        return Err(CoreError::invalid_format("invalid definitions magic"));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version > STORE_VERSION {
        return Err(CoreError::invalid_format(format!(
            "unsupported definitions version: {version}"
        )));
    }

    ciborium::from_reader(&data[6..]).map_err(|e| CoreError::codec(e.to_string()))
}
