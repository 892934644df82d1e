//! Persisted "alert outstanding" flag
//!
//! The only state that survives between runs. Reads never fail: a missing,
//! unreadable or corrupted record counts as "not outstanding" so a broken
//! store can cause a repeat alert but never a suppressed one.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Durable alert flag shared across process invocations
pub trait AlertStateStore: Send + Sync {
    fn is_outstanding(&self) -> bool;

    /// Set the flag; returns `true` only on the absent to present transition
    fn mark_outstanding(&self) -> Result<bool, StateError>;

    /// Unset the flag; returns `true` only on the present to absent transition
    fn clear(&self) -> Result<bool, StateError>;
}

/// On-disk alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub outstanding: bool,
    /// When the alert was first raised
    pub since: DateTime<Utc>,
}

/// Store backed by a small JSON file; presence means outstanding
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Current record, `None` when absent or unusable
    pub fn record(&self) -> Option<AlertRecord> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Alert state unreadable, treating as clear");
                return None;
            }
        };

        match serde_json::from_slice::<AlertRecord>(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Alert state corrupted, treating as clear");
                None
            }
        }
    }

    fn write_record(&self, record: &AlertRecord) -> Result<(), StateError> {
        let data = serde_json::to_vec(record)
            .map_err(|e| StateError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Replace atomically
        let tmp = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

impl AlertStateStore for FileStateStore {
    fn is_outstanding(&self) -> bool {
        self.record().map(|r| r.outstanding).unwrap_or(false)
    }

    fn mark_outstanding(&self) -> Result<bool, StateError> {
        if self.is_outstanding() {
            return Ok(false);
        }

        self.write_record(&AlertRecord {
            outstanding: true,
            since: Utc::now(),
        })?;
        Ok(true)
    }

    fn clear(&self) -> Result<bool, StateError> {
        let was_outstanding = self.is_outstanding();

        // Also drops corrupted records
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(was_outstanding)
    }
}

/// Volatile store, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    outstanding: Mutex<bool>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertStateStore for MemoryStateStore {
    fn is_outstanding(&self) -> bool {
        *self.outstanding.lock()
    }

    fn mark_outstanding(&self) -> Result<bool, StateError> {
        let mut outstanding = self.outstanding.lock();
        let transitioned = !*outstanding;
        *outstanding = true;
        Ok(transitioned)
    }

    fn clear(&self) -> Result<bool, StateError> {
        let mut outstanding = self.outstanding.lock();
        let transitioned = *outstanding;
        *outstanding = false;
        Ok(transitioned)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
