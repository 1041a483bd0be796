use std::fs;
use std::path::{Path, PathBuf};

use hdr_core::error::{AppError, ErrorKind};

use crate::model::IndexSnapshot;

/// Whole-snapshot persistence for the vector index.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<IndexSnapshot>, AppError>;

    fn save(&self, snapshot: &IndexSnapshot) -> Result<(), AppError>;

    fn delete(&self) -> Result<(), AppError>;
}

/// `data.json` on disk, written to a temp file then renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn ensure_parent(&self) -> Result<(), AppError> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(ErrorKind::Storage, "INDEX_DIR_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", parent.display(), e))
        })
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> Result<Option<IndexSnapshot>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path).map_err(|e| {
            AppError::new(ErrorKind::Storage, "INDEX_READ_FAILED", "Failed to read index snapshot")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })?;
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new(ErrorKind::Storage, "INDEX_DECODE_FAILED", "Failed to decode index snapshot")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<(), AppError> {
        self.ensure_parent()?;
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| {
            AppError::new(ErrorKind::Storage, "INDEX_ENCODE_FAILED", "Failed to encode index snapshot")
                .with_details(e.to_string())
        })?;
        fs::write(&tmp, json.as_bytes()).map_err(|e| {
            AppError::new(ErrorKind::Storage, "INDEX_WRITE_FAILED", "Failed to write index snapshot")
                .with_details(format!("path={}; err={}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::new(ErrorKind::Storage, "INDEX_WRITE_FAILED", "Failed to finalize index snapshot write")
                .with_details(format!(
                    "tmp={}; dest={}; err={}",
                    tmp.display(),
                    self.path.display(),
                    e
                ))
        })
    }

    fn delete(&self) -> Result<(), AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::new(
                ErrorKind::Storage,
                "INDEX_DELETE_FAILED",
                "Failed to delete index snapshot",
            )
            .with_details(format!("path={}; err={}", self.path.display(), e))),
        }
    }
}
