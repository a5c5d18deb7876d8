//! JSON-file persistent store
//!
//! Keeps the full mapping in memory and rewrites one JSON object on disk
//! after every mutation, before the call returns.
//!
//! ## Durability
//!
//! - Writers serialize on `write_lock`, held across building the snapshot,
//!   writing it and publishing the change to memory.
//! - The snapshot is written to `<file>.tmp`, fsynced, then renamed over the
//!   target, so a crash mid-write never leaves a truncated snapshot.
//! - Memory is only updated after the snapshot is on disk. A failed write
//!   leaves both memory and disk at the previous state.
//! - Readers use the `RwLock` and never wait on disk I/O.
//!
//! Every write costs O(total size) I/O.

use crate::error::{KvError, Result};
use crate::store::{KvStore, Snapshot};
use crate::types::{KvKey, KvValue};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Store whose contents survive restarts as a JSON snapshot file
#[derive(Debug)]
pub struct PersistentStore {
    path: PathBuf,
    temp_path: PathBuf,
    data: RwLock<HashMap<String, KvValue>>,
    write_lock: Mutex<()>,
}

impl PersistentStore {
    /// Open the store at `path`, loading an existing snapshot if there is one.
    ///
    /// A missing file starts an empty store. A file that exists but is not a
    /// JSON object of scalar values fails with `CorruptSnapshot`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let temp_path = temp_path_for(&path)?;

        if temp_path.exists() {
            warn!(
                "Removing stale snapshot temp file {} from an interrupted write",
                temp_path.display()
            );
            fs::remove_file(&temp_path).map_err(|source| KvError::Io {
                path: temp_path.clone(),
                source,
            })?;
        }

        let data = match fs::read(&path) {
            Ok(bytes) => parse_snapshot(&path, &bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|source| KvError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                debug!("No snapshot at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(source) => return Err(KvError::Io { path, source }),
        };

        info!(
            "Opened persistent store {} with {} entries",
            path.display(),
            data.len()
        );

        Ok(Self {
            path,
            temp_path,
            data: RwLock::new(data),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `view` as the new snapshot (temp file + fsync + rename)
    fn write_snapshot(&self, view: &BTreeMap<&str, &KvValue>) -> Result<()> {
        let result = self.try_write_snapshot(view);
        if result.is_err() {
            if let Err(e) = remove_if_exists(&self.temp_path) {
                warn!(
                    "Failed to remove snapshot temp file {}: {}",
                    self.temp_path.display(),
                    e
                );
            }
        }
        result.map_err(|source| KvError::Durability {
            path: self.path.clone(),
            source,
        })
    }

    fn try_write_snapshot(&self, view: &BTreeMap<&str, &KvValue>) -> io::Result<()> {
        let file = File::create(&self.temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, view).map_err(io::Error::from)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&self.temp_path, &self.path)?;

        debug!(
            "Wrote snapshot {} ({} entries)",
            self.path.display(),
            view.len()
        );
        Ok(())
    }
}

impl KvStore for PersistentStore {
    fn set(&self, key: &KvKey, value: KvValue) -> Result<()> {
        let _writer = self.write_lock.lock();

        {
            let data = self.data.read();
            let mut view = sorted_view(&data);
            view.insert(key.as_str(), &value);
            self.write_snapshot(&view)?;
        }

        self.data.write().insert(key.as_str().to_string(), value);
        Ok(())
    }

    fn get(&self, key: &KvKey) -> Option<KvValue> {
        self.data.read().get(key.as_str()).cloned()
    }

    fn delete(&self, key: &KvKey) -> Result<Option<KvValue>> {
        let _writer = self.write_lock.lock();

        {
            let data = self.data.read();
            if !data.contains_key(key.as_str()) {
                return Ok(None);
            }
            let mut view = sorted_view(&data);
            view.remove(key.as_str());
            self.write_snapshot(&view)?;
        }

        Ok(self.data.write().remove(key.as_str()))
    }

    fn all(&self) -> Snapshot {
        self.data.read().clone()
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }

    fn flush(&self) -> Result<()> {
        let _writer = self.write_lock.lock();
        let data = self.data.read();
        self.write_snapshot(&sorted_view(&data))?;
        info!(
            "Flushed {} entries to {}",
            data.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Borrowed, key-sorted view of the map for serialization
fn sorted_view(data: &HashMap<String, KvValue>) -> BTreeMap<&str, &KvValue> {
    data.iter().map(|(k, v)| (k.as_str(), v)).collect()
}

/// Remove `path`, treating an already missing file as success
fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        KvError::InvalidConfig(format!(
            "snapshot path {} has no file name",
            path.display()
        ))
    })?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

fn parse_snapshot(path: &Path, bytes: &[u8]) -> Result<HashMap<String, KvValue>> {
    let corrupt = |reason: String| KvError::CorruptSnapshot {
        path: path.to_path_buf(),
        reason,
    };

    let data: HashMap<String, KvValue> =
        serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;

    for key in data.keys() {
        KvKey::new(key.as_str()).map_err(|e| corrupt(format!("bad key {:?}: {}", key, e)))?;
    }

    Ok(data)
}
