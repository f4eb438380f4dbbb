use crate::core::path::SzsPath;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, SzsError};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores files below a base directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Maps an archive-relative path below the base, refusing anything that
    /// normalizes to a location outside of it.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let normalized = SzsPath::new(path).normalize();
        if normalized.names().iter().any(|name| name == ".." || name.contains('\\')) {
            return Err(SzsError::UnsafePath {
                path: path.to_string(),
            });
        }
        Ok(normalized
            .names()
            .iter()
            .fold(self.base_path.clone(), |full, name| full.join(name)))
    }
}

impl Storage for LocalStorage {
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    fn create_dir(&self, path: &str) -> Result<()> {
        fs::create_dir_all(self.full_path(path)?)?;
        Ok(())
    }
}
