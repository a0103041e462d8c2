use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::PersistBackend;
use crate::{Result, StoreError};

const STORAGE_FILENAME: &str = "storage.json";
const CORRUPT_SUFFIX: &str = ".corrupt";

/// Backend keeping every key in one JSON object file.
///
/// The file maps storage keys to raw strings, the same shape a browser's
/// local storage has. Each write rewrites the whole file through a sibling
/// temp file and a rename. A write over a file that cannot be parsed moves
/// it aside to `<name>.corrupt` and starts from an empty map.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Use the storage file at `path`. The file is created on first save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Use `<platform data dir>/<app_name>/storage.json`.
    pub fn in_data_dir(app_name: &str) -> Result<Self> {
        let dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::open(dir.join(app_name).join(STORAGE_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|source| StoreError::InvalidStorageFile {
            path: self.path.clone(),
            source,
        })
    }

    /// `<file name><suffix>` next to the storage file.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| STORAGE_FILENAME.into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.sibling(".tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StoreError::InvalidStorageFile { path, source }) => {
                let aside = self.sibling(CORRUPT_SUFFIX);
                warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    error = %source,
                    "moving unreadable storage file aside"
                );
                fs::rename(&path, &aside)?;
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut entries);
        self.write_entries(&entries)
    }
}

impl PersistBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(key))
    }

    fn save(&self, key: &str, data: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), data.to_string());
        })?;
        debug!(key, path = %self.path.display(), "saved entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}
