use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    /// Another run created the marker and has not removed it
    #[error("already running (lock marker {} exists)", .path.display())]
    AlreadyRunning { path: PathBuf },

    #[error("failed to create lock marker {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A held run lock
///
/// The marker is a directory, so `create_dir` decides ownership atomically.
/// Released by [`RunLock::release`], or on drop if the owner unwinds first.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    held: bool,
}

impl RunLock {
    /// Create the marker at `path`, failing if it already exists
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;
        }

        match fs::create_dir(&path) {
            Ok(()) => {
                debug!("Acquired run lock {}", path.display());
                Ok(Self { path, held: true })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LockError::AlreadyRunning { path }),
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the marker
    pub fn release(mut self) -> io::Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> io::Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;

        match fs::remove_dir(&self.path) {
            Ok(()) => {
                debug!("Released run lock {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Lock marker {} was already gone", self.path.display());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("Failed to remove lock marker {}: {}", self.path.display(), e);
        }
    }
}
