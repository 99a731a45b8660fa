use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use stride_tracker_lib::log_entry::LogEntry;

use crate::{ensure_parent_dir, StrideError};

/// Key-value persistence of the whole run log, newest entry first.
/// `set` replaces everything: last writer wins, nothing is merged.
pub trait LogStore: Send + 'static {
    fn get(&self) -> Result<Vec<LogEntry>, StrideError>;

    fn set(&mut self, entries: &[LogEntry]) -> Result<(), StrideError>;
}

/// The log as a single JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileLogStore {
    path: PathBuf,
}

impl JsonFileLogStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StrideError> {
        let path = path.into();
        ensure_parent_dir(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for JsonFileLogStore {
    fn get(&self) -> Result<Vec<LogEntry>, StrideError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        // A corrupt file reads as an empty log rather than blocking the app
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                tracing::warn!("Ignoring unreadable log file {:?}: {}", self.path, err);
                Ok(Vec::new())
            }
        }
    }

    fn set(&mut self, entries: &[LogEntry]) -> Result<(), StrideError> {
        let bytes = serde_json::to_vec(entries)?;
        std::fs::write(&self.path, bytes)?;
        tracing::debug!("Wrote {} log entries to {:?}", entries.len(), self.path);
        Ok(())
    }
}

/// In-memory log. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryLogStore {
    fn get(&self) -> Result<Vec<LogEntry>, StrideError> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set(&mut self, entries: &[LogEntry]) -> Result<(), StrideError> {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLogStore::open(dir.path().join("nested/log.json")).unwrap();
        assert!(store.get().unwrap().is_empty());
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileLogStore::open(dir.path().join("log.json")).unwrap();
        let entries = vec![
            LogEntry::manual(Utc::now(), 10., 3000),
            LogEntry::manual(Utc::now(), 5., 1500),
        ];

        store.set(&entries).unwrap();

        let reopened = JsonFileLogStore::open(store.path()).unwrap();
        assert_eq!(reopened.get().unwrap(), entries);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileLogStore::open(&path).unwrap();
        assert!(store.get().unwrap().is_empty());
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let mut store = MemoryLogStore::new();
        let observer = store.clone();
        store.set(&[LogEntry::manual(Utc::now(), 1., 400)]).unwrap();
        assert_eq!(observer.get().unwrap().len(), 1);
    }
}
