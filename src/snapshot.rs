//! File-backed storage for persisted snapshots.

use crate::error::PersistError;
use crate::persist::{StorageAdapter, StoredValue};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// On-disk envelope around a [`StoredValue`].
///
/// The file is JSON and can be inspected directly. `state` stays compact
/// because its bytes are what the checksum covers:
///
/// ```text
/// $ cat state/prefs.snapshot.json
/// {
///   "state": {"theme":"dark"},
///   "version": 2,
///   "hash": "a3f2e1b09c4d..."
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    /// Kept verbatim so the checksum covers the exact bytes on disk.
    state: Box<RawValue>,
    version: u32,
    /// Hex-encoded xxh64 of the `state` text.
    hash: String,
}

/// Stores one snapshot file per name in a directory.
///
/// Writes go to a `.tmp` file that is synced and renamed into place, so a
/// crash mid-write leaves the previous snapshot intact. A file that is
/// unreadable JSON or whose checksum does not match its contents is treated
/// as missing.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` for snapshot files, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(FileStorage { dir })
    }

    /// Returns the snapshot directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file a snapshot named `name` is stored in.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::InvalidName`] if `name` is empty, is `.` or
    /// `..`, or contains a path separator, so it could not escape the
    /// snapshot directory.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, PersistError> {
        let unsafe_name = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if unsafe_name {
            return Err(PersistError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.snapshot.json")))
    }
}

/// Compute xxh64 of raw bytes, hex-encoded.
fn state_hash(bytes: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh64::xxh64(bytes, 0))
}

impl StorageAdapter for FileStorage {
    fn get_item(&self, name: &str) -> Result<Option<StoredValue>, PersistError> {
        let path = self.path_for(name)?;
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: SnapshotFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("statefold: snapshot {} is corrupt: {err}", path.display());
                return Ok(None);
            }
        };

        if state_hash(file.state.get().as_bytes()) != file.hash {
            log::warn!("statefold: snapshot {} failed its checksum", path.display());
            return Ok(None);
        }

        let state = serde_json::from_str(file.state.get())?;
        Ok(Some(StoredValue::new(state, file.version)))
    }

    fn set_item(&self, name: &str, value: &StoredValue) -> Result<(), PersistError> {
        let path = self.path_for(name)?;
        let tmp_path = path.with_extension("json.tmp");

        let state = serde_json::to_string(&value.state)?;
        let file = SnapshotFile {
            hash: state_hash(state.as_bytes()),
            state: RawValue::from_string(state)?,
            version: value.version,
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut out = fs::File::create(&tmp_path)?;
        out.write_all(json.as_bytes())?;
        out.sync_data()?;
        drop(out);

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove_item(&self, name: &str) -> Result<(), PersistError> {
        let path = self.path_for(name)?;
        for target in [path.clone(), path.with_extension("json.tmp")] {
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
