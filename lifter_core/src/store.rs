//! State persistence.
//!
//! `JsonFileStore` keeps the record in a JSON file written atomically and
//! holds an exclusive lock on a sidecar `<file>.lock` while it is alive, so a
//! second process pointed at the same state fails fast instead of interleaving
//! load/modify/save cycles.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::LifterError;
use crate::state::StateRecord;

/// Where the lifter state lives between runs.
pub trait StateStore {
    /// Load the persisted record; a store with nothing saved yields the default.
    fn load(&mut self) -> Result<StateRecord, LifterError>;
    fn save(&mut self, record: &StateRecord) -> Result<(), LifterError>;
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn load(&mut self) -> Result<StateRecord, LifterError> {
        (**self).load()
    }
    fn save(&mut self, record: &StateRecord) -> Result<(), LifterError> {
        (**self).save(record)
    }
}

/// Write `bytes` to `path` via a temp file, fsync and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = sibling(path, "tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    // Make the rename itself durable. Not every platform lets a directory be opened.
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty())
        && let Ok(d) = File::open(dir)
    {
        let _ = d.sync_all();
    }
    Ok(())
}

fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Held for the lifetime of the store; the OS drops the lock on close.
    _lock: File,
}

impl JsonFileStore {
    /// Open (without reading) the state at `path`, taking the process lock.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LifterError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                LifterError::State(format!("create state directory {}: {e}", dir.display()))
            })?;
        }
        let lock_path = sibling(&path, "lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| LifterError::State(format!("open {}: {e}", lock_path.display())))?;
        match lock.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(LifterError::Busy(format!(
                    "state file {} is in use by another process",
                    path.display()
                )));
            }
            Err(TryLockError::Error(e)) => {
                return Err(LifterError::State(format!(
                    "lock {}: {e}",
                    lock_path.display()
                )));
            }
        }
        tracing::debug!(path = %path.display(), "state store opened");
        Ok(Self { path, _lock: lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&mut self) -> Result<StateRecord, LifterError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no saved state, starting fresh");
                return Ok(StateRecord::default());
            }
            Err(e) => {
                return Err(LifterError::State(format!(
                    "read {}: {e}",
                    self.path.display()
                )));
            }
        };
        StateRecord::from_json(&text).map_err(|e| match e {
            LifterError::State(msg) => {
                LifterError::State(format!("{}: {msg}", self.path.display()))
            }
            other => other,
        })
    }

    fn save(&mut self, record: &StateRecord) -> Result<(), LifterError> {
        let json = record.to_json()?;
        write_atomic(&self.path, json.as_bytes())
            .map_err(|e| LifterError::State(format!("write {}: {e}", self.path.display())))?;
        tracing::trace!(
            path = %self.path.display(),
            intervals = record.usage_periods.len(),
            "state saved"
        );
        Ok(())
    }
}
