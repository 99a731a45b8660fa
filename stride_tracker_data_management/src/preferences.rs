use std::{io::ErrorKind, path::Path};

use serde::{Deserialize, Serialize};

use crate::{ensure_parent_dir, StrideError};

/// Runner settings. Unknown or missing keys fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Spoken announcements
    pub voice: bool,
    pub haptics: bool,
    /// Pause the run when the app loses focus
    pub autopause: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            voice: true,
            haptics: true,
            autopause: false,
        }
    }
}

impl Preferences {
    pub fn load(path: &Path) -> Result<Self, StrideError> {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(preferences) => Ok(preferences),
                Err(err) => {
                    tracing::warn!("Ignoring unreadable preferences {:?}: {}", path, err);
                    Ok(Self::default())
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StrideError> {
        ensure_parent_dir(path)?;
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Preferences::load(&dir.path().join("prefs.json")).unwrap();
        assert_eq!(loaded, Preferences::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/prefs.json");
        let preferences = Preferences { voice: false, haptics: true, autopause: true };

        preferences.save(&path).unwrap();

        assert_eq!(Preferences::load(&path).unwrap(), preferences);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"autopause": true}"#).unwrap();

        let preferences = Preferences::load(&path).unwrap();
        assert!(preferences.autopause);
        assert!(preferences.voice);
    }
}
