use std::path::{Path, PathBuf};

use const_format::concatcp;

pub mod clock;
pub mod gpx_util;
pub mod location;
mod log_book;
pub mod log_store;
pub mod notify;
pub mod preferences;
pub mod session_controller;

pub use log_book::*;

pub const DATA_DIR: &str = "data/";
pub const LOG_FILE_NAME: &str = "stride_log.json";
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";
pub const LOG_PATH: &str = concatcp!(DATA_DIR, LOG_FILE_NAME);
pub const PREFERENCES_PATH: &str = concatcp!(DATA_DIR, PREFERENCES_FILE_NAME);

#[derive(Debug, thiserror::Error)]
pub enum StrideError {
    #[error("Location is not supported on this device")]
    LocationUnsupported,

    #[error("Invalid import: {0}")]
    MalformedImport(String),

    #[error("No active run data")]
    NoRunData,

    #[error("No log entry with id {0}")]
    EntryNotFound(String),

    #[error("Failed to write GPX: {0}")]
    GpxWrite(String),

    #[error("Session controller is not running")]
    ControllerClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the log and the preferences live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub log_file: PathBuf,
    pub preferences_file: PathBuf,
}

impl DataPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            log_file: dir.join(LOG_FILE_NAME),
            preferences_file: dir.join(PREFERENCES_FILE_NAME),
        }
    }
}

impl Default for DataPaths {
    /// Project root when it can be found, the working directory otherwise.
    fn default() -> Self {
        let root = project_root::get_project_root().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            log_file: root.join(LOG_PATH),
            preferences_file: root.join(PREFERENCES_PATH),
        }
    }
}

/// Creates the parent directory of a data file if it doesn't exist.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), StrideError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}
