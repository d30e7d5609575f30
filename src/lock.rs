use fs4::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Error, Result};

/// Advisory `flock` on a fixed file. One holder per open file
/// description, so two `ScanLock`s on the same path contend even inside one
/// process.
///
/// Methods take `&self` so a signal watcher thread can release the lock the
/// main thread acquired.
#[derive(Debug)]
pub struct ScanLock {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ScanLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| Error::Lock {
                path: self.path.clone(),
                source,
            })
    }

    /// Returns `Ok(false)` without blocking when another holder has it.
    pub fn try_acquire(&self) -> Result<bool> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Ok(true);
        }
        let file = self.open()?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                *slot = Some(file);
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                debug!(path = %self.path.display(), "lock is held elsewhere");
                Ok(false)
            }
            Err(source) => Err(Error::Lock {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Blocks until the lock is free.
    pub fn acquire(&self) -> Result<()> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Ok(());
        }
        let file = self.open()?;
        file.lock_exclusive().map_err(|source| Error::Lock {
            path: self.path.clone(),
            source,
        })?;
        *slot = Some(file);
        Ok(())
    }

    pub fn is_held(&self) -> bool {
        self.slot().is_some()
    }

    /// Closing the descriptor drops the `flock`. Safe to call when not held.
    pub fn release(&self) {
        if self.slot().take().is_some() {
            debug!(path = %self.path.display(), "lock released");
        }
    }
}

impl Drop for ScanLock {
    fn drop(&mut self) {
        self.release();
    }
}
