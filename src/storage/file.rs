//! Directory-backed storage, one JSON file per key.

use super::KeyValueStorage;
use crate::error::{Result, StoreError};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the storage manifest.
const STORAGE_MAGIC: &[u8; 4] = b"TGT\0";

/// Current storage format version.
const STORAGE_VERSION: u8 = 1;

/// Storage rooted at a directory.
///
/// Holds an exclusive lock on `LOCK` for its lifetime, so two processes
/// cannot write the same directory.
pub struct FileStorage {
    path: PathBuf,
    _lock_file: File,
}

impl FileStorage {
    /// Open an existing storage directory or create a new one.
    pub fn open_or_create(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.join("MANIFEST").exists() {
            Self::open(path)
        } else if create_if_missing {
            Self::create(path)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new storage directory.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Self::write_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Open an existing storage directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Self::verify_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Directory this storage writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.path.join(format!("{key}.json")))
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORAGE_MAGIC)?;
        file.write_all(&[STORAGE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORAGE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid storage magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORAGE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported storage version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn write_temp(tmp_path: &Path, value: &str) -> Result<()> {
        let mut file = File::create(tmp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let tmp_path = path.with_extension("json.tmp");

        Self::write_temp(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stage every value in a temp file first; nothing is renamed into
    /// place unless all of them were written.
    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        let mut staged = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let path = self.entry_path(key)?;
            let tmp_path = path.with_extension("json.tmp");
            if let Err(e) = Self::write_temp(&tmp_path, value) {
                for (_, tmp) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
            staged.push((path, tmp_path));
        }

        for (path, tmp_path) in &staged {
            fs::rename(tmp_path, path)?;
        }
        Ok(())
    }
}
