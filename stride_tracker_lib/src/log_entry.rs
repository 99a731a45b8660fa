use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{geo_point::GeoPoint, pace, run_session::Split, serde_util::lenient};

pub const OUTDOOR_RUN_TITLE: &str = "Outdoor Run";
pub const MANUAL_RUN_TITLE: &str = "Manual Run";

/// A finished run as stored in the log.
/// Field names on the wire follow the log file format, which is also what JSON import accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub date: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub distance_km: f64,
    #[serde(rename = "duration_s", default, deserialize_with = "lenient")]
    pub duration_seconds: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub splits: Vec<Split>,
    #[serde(default, deserialize_with = "lenient")]
    pub points: Vec<GeoPoint>,
}

impl LogEntry {
    pub fn new(
        title: String,
        date: DateTime<Utc>,
        distance_km: f64,
        duration_seconds: u64,
        splits: Vec<Split>,
        points: Vec<GeoPoint>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            title,
            distance_km,
            duration_seconds,
            splits,
            points,
        }
    }

    /// Entry typed in by hand, without a track.
    pub fn manual(date: DateTime<Utc>, distance_km: f64, duration_seconds: u64) -> Self {
        let title = MANUAL_RUN_TITLE.into();
        Self::new(title, date, distance_km, duration_seconds, Vec::new(), Vec::new())
    }

    pub fn pace(&self) -> Option<f64> {
        pace::pace_calculator(self.distance_km, self.duration_seconds)
    }
}
