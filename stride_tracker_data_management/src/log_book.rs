use chrono::{DateTime, Utc};
use stride_tracker_lib::{log_entry::LogEntry, run_session::RunEngine};

use crate::{gpx_util, log_store::LogStore, StrideError};

/// The public interface for the run log.
pub struct LogBook<S: LogStore> {
    store: S,
}

impl<S: LogStore> LogBook<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn entries(&self) -> Result<Vec<LogEntry>, StrideError> {
        self.store.get()
    }

    pub fn find(&self, id: &str) -> Result<LogEntry, StrideError> {
        self.entries()?
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| StrideError::EntryNotFound(id.to_string()))
    }

    /// Newest first.
    pub fn prepend(&mut self, entry: LogEntry) -> Result<(), StrideError> {
        let mut entries = self.entries()?;
        tracing::info!(
            "Saving run {} ({:.2} km, {}s)",
            entry.id,
            entry.distance_km,
            entry.duration_seconds
        );
        entries.insert(0, entry);
        self.store.set(&entries)
    }

    pub fn rename(&mut self, id: &str, title: &str) -> Result<(), StrideError> {
        let mut entries = self.entries()?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| StrideError::EntryNotFound(id.to_string()))?;
        entry.title = title.trim().to_string();
        self.store.set(&entries)
    }

    /// Returns false when nothing had that id.
    pub fn delete(&mut self, id: &str) -> Result<bool, StrideError> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.store.set(&entries)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StrideError> {
        tracing::info!("Clearing run log");
        self.store.set(&[])
    }

    /// Adds a hand-entered run. A non-finite distance or a missing duration adds nothing.
    pub fn add_manual(
        &mut self,
        distance_km: f64,
        duration_seconds: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Option<LogEntry>, StrideError> {
        let Some(duration_seconds) = duration_seconds.filter(|_| distance_km.is_finite()) else {
            return Ok(None);
        };
        let entry = LogEntry::manual(now, distance_km, duration_seconds);
        self.prepend(entry.clone())?;
        Ok(Some(entry))
    }

    pub fn export_json(&self) -> Result<String, StrideError> {
        Ok(serde_json::to_string_pretty(&self.entries()?)?)
    }

    /// Replaces the whole log. Only the top-level shape is checked; the store is untouched
    /// on failure. Unreadable fields inside an entry fall back to their defaults.
    pub fn import_json(&mut self, text: &str) -> Result<usize, StrideError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|_| StrideError::MalformedImport("Invalid JSON".into()))?;
        if !value.is_array() {
            return Err(StrideError::MalformedImport("Invalid log file".into()));
        }
        let entries: Vec<LogEntry> = serde_json::from_value(value)
            .map_err(|err| StrideError::MalformedImport(err.to_string()))?;

        self.store.set(&entries)?;
        tracing::info!("Imported {} log entries", entries.len());
        Ok(entries.len())
    }

    pub fn export_gpx(&self, id: &str) -> Result<String, StrideError> {
        gpx_util::write_gpx(&self.find(id)?.points)
    }

    /// Plays the GPX track through `engine` and saves the result. Replaces any session in
    /// `engine`, but only once the document has parsed.
    pub fn import_gpx(
        &mut self,
        engine: &mut RunEngine,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<LogEntry, StrideError> {
        let coordinates = gpx_util::read_gpx_coordinates(text)?;
        self.import_track(engine, &coordinates, now)
    }

    /// Replays (lat, lon) pairs through `engine` and saves the result.
    pub fn import_track(
        &mut self,
        engine: &mut RunEngine,
        coordinates: &[(f64, f64)],
        now: DateTime<Utc>,
    ) -> Result<LogEntry, StrideError> {
        let entry = engine.replay_track(coordinates, now).ok_or(StrideError::NoRunData)?;
        self.prepend(entry.clone())?;
        Ok(entry)
    }
}
