//! Persistence boundary
//!
//! The registry talks to storage through [`BlobStore`], a small byte-level
//! interface. [`FsStore`] is the filesystem implementation: writes land in a
//! `.tmp` sibling first and are renamed into place, so a crashed write never
//! leaves a half-written artifact at the published path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DriftError, Result};

/// Byte-level storage used by the version registry
pub trait BlobStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Non-authoritative convenience link; implementations without symlink
    /// support ignore it.
    fn symlink(&self, _target: &Path, _link: &Path) -> Result<()> {
        Ok(())
    }
}

/// Filesystem-backed store with atomic (write-then-rename) writes
#[derive(Debug, Default, Clone)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

fn persistence_err(path: &Path, source: std::io::Error) -> DriftError {
    DriftError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

impl BlobStore for FsStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| persistence_err(path, e))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| persistence_err(path, e))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| persistence_err(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| persistence_err(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| persistence_err(path, e))
    }

    #[cfg(unix)]
    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        if link.exists() || link.is_symlink() {
            let _ = fs::remove_file(link);
        }
        std::os::unix::fs::symlink(target, link).map_err(|e| persistence_err(link, e))
    }
}

/// Advisory lock serializing version creation per registry root.
///
/// Acquisition creates the lock file with `create_new`; an existing file
/// means another run holds the registry. The file is removed on drop.
pub struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(".drift.lock");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| persistence_err(&path, e))?;
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(DriftError::LockHeld { path })
            }
            Err(e) => Err(DriftError::Persistence { path, source: e }),
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
