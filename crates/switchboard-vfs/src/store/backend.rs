//! Storage backends for the vault.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use serde_json::Value;
use tempfile::Builder;

use super::VaultError;

/// Opaque key-value storage.
///
/// Implementations receive keys that have already been validated.
pub trait KvBackend: Send + Sync {
    /// Returns the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Value>, VaultError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] when the backend cannot be written.
    fn set(&self, key: &str, value: Value) -> Result<(), VaultError>;

    /// Removes `key`, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] when the backend cannot be written.
    fn delete(&self, key: &str) -> Result<bool, VaultError>;

    /// Every stored key, in any order.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] when the backend cannot be read.
    fn keys(&self) -> Result<Vec<String>, VaultError>;
}

impl<B: KvBackend + ?Sized> KvBackend for Box<B> {
    fn get(&self, key: &str) -> Result<Option<Value>, VaultError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), VaultError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool, VaultError> {
        (**self).delete(key)
    }

    fn keys(&self) -> Result<Vec<String>, VaultError> {
        (**self).keys()
    }
}

type Entries = BTreeMap<String, Value>;

fn lock(entries: &Mutex<Entries>) -> Result<MutexGuard<'_, Entries>, VaultError> {
    entries.lock().map_err(|_| VaultError::Poisoned)
}

/// Process-local backend; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<Entries>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, VaultError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), VaultError> {
        lock(&self.entries)?.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, VaultError> {
        Ok(lock(&self.entries)?.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, VaultError> {
        Ok(lock(&self.entries)?.keys().cloned().collect())
    }
}

/// Backend persisting a single JSON object to disk.
///
/// Several processes may open the same file, so nothing is cached: every
/// operation reloads the document while holding an advisory lock on a
/// sibling `.lock` file. Reads share the lock; changes hold it exclusively
/// across the read-modify-write and replace the document atomically.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileBackend {
    /// Opens the store at `path`, starting empty when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] when the file or its lock cannot be read and
    /// [`VaultError::Corrupt`] when it is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map_or_else(|| OsString::from("store"), OsStr::to_os_string);
        lock_name.push(".lock");
        let backend = Self {
            lock_path: path.with_file_name(lock_name),
            path,
        };
        if let Some(directory) = backend
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(directory).map_err(|source| backend.io_error(source))?;
        }
        backend.read()?;
        Ok(backend)
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> VaultError {
        VaultError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn acquire(&self, exclusive: bool) -> Result<File, VaultError> {
        let lock_error = |source| VaultError::Io {
            path: self.lock_path.display().to_string(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(lock_error)?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(lock_error)?;
        Ok(file)
    }

    /// Loads the document under a shared lock.
    fn read(&self) -> Result<Entries, VaultError> {
        let _lock = self.acquire(false)?;
        self.load()
    }

    /// Applies `change` to the current document under an exclusive lock,
    /// writing it back when `change` reports a modification.
    fn update<T>(&self, change: impl FnOnce(&mut Entries) -> (T, bool)) -> Result<T, VaultError> {
        let _lock = self.acquire(true)?;
        let mut entries = self.load()?;
        let (outcome, modified) = change(&mut entries);
        if modified {
            self.persist(&entries)?;
        }
        Ok(outcome)
    }

    fn load(&self) -> Result<Entries, VaultError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| VaultError::Corrupt {
                path: self.path.display().to_string(),
                source,
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn persist(&self, entries: &Entries) -> Result<(), VaultError> {
        let mut contents =
            serde_json::to_vec_pretty(entries).map_err(|source| VaultError::Corrupt {
                path: self.path.display().to_string(),
                source,
            })?;
        contents.push(b'\n');
        atomic_write(&self.path, &contents).map_err(|source| self.io_error(source))
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, VaultError> {
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), VaultError> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value);
            ((), true)
        })
    }

    fn delete(&self, key: &str) -> Result<bool, VaultError> {
        self.update(|entries| {
            let removed = entries.remove(key).is_some();
            (removed, removed)
        })
    }

    fn keys(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.read()?.into_keys().collect())
    }
}

/// Writes `contents` to `path` through a synced temporary file in the same
/// directory.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "store path has no parent directory")
        })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("store"),
    );
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
