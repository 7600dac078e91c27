use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Small files kept between sessions, all inside one directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Creates `dir` when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        if dir.exists() {
            let meta = fs::metadata(&dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
            if !meta.is_dir() {
                return Err(PersistError::StateDir(format!(
                    "{} is not a directory",
                    dir.display()
                )));
            }
        } else {
            fs::create_dir_all(&dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// `None` when the file does not exist.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>, PersistError> {
        match fs::read(self.path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a temp file next to the target, then renames it over the target.
    pub fn write_atomic(&self, name: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.path(name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Returns whether a file was removed.
    pub fn remove(&self, name: &str) -> Result<bool, PersistError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
