use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    geo_point::GeoPoint,
    log_entry::{LogEntry, OUTDOOR_RUN_TITLE},
    pace,
};

/// Time taken for one whole kilometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    #[serde(rename = "km")]
    pub kilometer_index: u32,
    #[serde(rename = "seconds")]
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSession {
    pub start_time: DateTime<Utc>,
    pub points: Vec<GeoPoint>,
    pub splits: Vec<Split>,
    pub paused: bool,
    pub total_distance_meters: f64,
    pub elapsed_seconds: u64,
}

impl RunSession {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            points: Vec::new(),
            splits: Vec::new(),
            paused: false,
            total_distance_meters: 0.,
            elapsed_seconds: 0,
        }
    }

    /// Read-only session rebuilt from a saved entry. It starts paused so nothing can extend it.
    pub fn from_entry(entry: &LogEntry, now: DateTime<Utc>) -> Self {
        Self {
            start_time: now,
            points: entry.points.clone(),
            splits: entry.splits.clone(),
            paused: true,
            total_distance_meters: entry.distance_km * 1000.,
            elapsed_seconds: entry.duration_seconds,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.total_distance_meters / 1000.
    }

    pub fn pace(&self) -> Option<f64> {
        pace::pace_seconds_per_km(self.elapsed_seconds, self.total_distance_meters)
    }

    fn split_seconds_total(&self) -> u64 {
        self.splits.iter().map(|split| split.duration_seconds).sum()
    }

    fn record_point(&mut self, point: GeoPoint) -> Option<Split> {
        let previous = self.points.last().copied();
        self.points.push(point);

        let previous = previous?;
        self.total_distance_meters += previous.distance_to(&point);

        // A jump over several kilometer marks still yields one split, at the current kilometer.
        let km_done = self.distance_km().floor() as u32;
        if km_done as usize <= self.splits.len() {
            return None;
        }

        let split = Split {
            kilometer_index: km_done,
            duration_seconds: self.elapsed_seconds.saturating_sub(self.split_seconds_total()),
        };
        self.splits.push(split);
        Some(split)
    }

    fn tick(&mut self, now: DateTime<Utc>) {
        let millis = now.signed_duration_since(self.start_time).num_milliseconds();
        self.elapsed_seconds = (millis as f64 / 1000.).round().max(0.) as u64;
    }

    fn into_log_entry(self, date: DateTime<Utc>) -> LogEntry {
        let distance_km = (self.distance_km() * 100.).round() / 100.;
        LogEntry::new(
            OUTDOOR_RUN_TITLE.into(),
            date,
            distance_km,
            self.elapsed_seconds,
            self.splits,
            self.points,
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            start_time: self.start_time,
            paused: self.paused,
            distance_meters: self.total_distance_meters,
            elapsed_seconds: self.elapsed_seconds,
            pace: self.pace(),
            splits: self.splits.clone(),
            points: self.points.clone(),
        }
    }
}

/// What a renderer needs to draw the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub start_time: DateTime<Utc>,
    pub paused: bool,
    pub distance_meters: f64,
    pub elapsed_seconds: u64,
    pub pace: Option<f64>,
    pub splits: Vec<Split>,
    pub points: Vec<GeoPoint>,
}

/// Owns the single active run, if any. Every operation is a no-op without one.
#[derive(Debug, Default)]
pub struct RunEngine {
    session: Option<RunSession>,
}

impl RunEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&RunSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Starts a fresh run, dropping whatever was there.
    pub fn start_session(&mut self, now: DateTime<Utc>) {
        tracing::debug!("Starting run session at {}", now);
        self.session = Some(RunSession::new(now));
    }

    /// Returns the split completed by this point, if any.
    pub fn record_point(
        &mut self,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<Split> {
        let session = self.session.as_mut().filter(|session| !session.paused)?;
        let split = session.record_point(GeoPoint::new(latitude, longitude, timestamp));
        if let Some(split) = split {
            tracing::debug!(
                "Kilometer {} done in {}s",
                split.kilometer_index,
                split.duration_seconds
            );
        }
        split
    }

    /// Returns true when the elapsed time was updated.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let Some(session) = self.session.as_mut().filter(|session| !session.paused) else {
            return false;
        };
        session.tick(now);
        true
    }

    /// Flips the pause flag and returns the new value.
    pub fn toggle_pause(&mut self) -> Option<bool> {
        let session = self.session.as_mut()?;
        session.paused = !session.paused;
        Some(session.paused)
    }

    /// Ends the run. The trailing partial kilometer never becomes a split.
    pub fn finalize(&mut self, save: bool, now: DateTime<Utc>) -> Option<LogEntry> {
        let session = self.session.take()?;
        if save {
            Some(session.into_log_entry(now))
        } else {
            None
        }
    }

    pub fn view_entry(&mut self, entry: &LogEntry, now: DateTime<Utc>) {
        self.session = Some(RunSession::from_entry(entry, now));
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(RunSession::snapshot)
    }

    /// Plays back an untimed track one second per point and saves it.
    /// Shares every distance and split rule with live recording.
    pub fn replay_track(
        &mut self,
        coordinates: &[(f64, f64)],
        base_time: DateTime<Utc>,
    ) -> Option<LogEntry> {
        self.start_session(base_time);
        for (i, &(latitude, longitude)) in coordinates.iter().enumerate() {
            let timestamp = base_time + Duration::seconds(i as i64);
            self.record_point(latitude, longitude, timestamp);
            self.tick(timestamp);
        }
        self.finalize(true, base_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::geo_point::haversine_distance;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(seconds)
    }

    /// Latitude offset (degrees) covering the given meters due north.
    fn north(meters: f64) -> f64 {
        (meters / crate::geo_point::EARTH_RADIUS_M).to_degrees()
    }

    #[test]
    fn first_point_adds_no_distance() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.record_point(45., 9., t0());

        let session = engine.session().unwrap();
        assert_eq!(session.points.len(), 1);
        assert_eq!(session.total_distance_meters, 0.);
    }

    #[test]
    fn two_points_accumulate_haversine() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.record_point(45., 9., t0());
        engine.record_point(45.001, 9., at(1));

        let d = engine.session().unwrap().total_distance_meters;
        assert!((d - 111.19).abs() < 0.01);
    }

    #[test]
    fn no_session_is_a_no_op() {
        let mut engine = RunEngine::new();
        assert_eq!(engine.record_point(45., 9., t0()), None);
        assert!(!engine.tick(at(10)));
        assert_eq!(engine.toggle_pause(), None);
        assert_eq!(engine.finalize(true, t0()), None);
        assert!(!engine.is_active());
    }

    #[test]
    fn paused_session_ignores_points_and_ticks() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.record_point(45., 9., t0());
        engine.tick(at(5));
        assert_eq!(engine.toggle_pause(), Some(true));

        let before = engine.session().unwrap().clone();
        assert_eq!(engine.record_point(45.1, 9., at(6)), None);
        assert!(!engine.tick(at(30)));
        assert_eq!(engine.session().unwrap(), &before);

        assert_eq!(engine.toggle_pause(), Some(false));
        assert!(engine.tick(at(31)));
        assert_eq!(engine.session().unwrap().elapsed_seconds, 31);
    }

    #[test]
    fn tick_rounds_to_nearest_second() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.tick(t0() + Duration::milliseconds(2_499));
        assert_eq!(engine.session().unwrap().elapsed_seconds, 2);
        engine.tick(t0() + Duration::milliseconds(2_500));
        assert_eq!(engine.session().unwrap().elapsed_seconds, 3);
    }

    #[test]
    fn crossing_one_kilometer_in_a_single_step() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.record_point(45., 9., t0());
        engine.tick(at(280));
        engine.record_point(45. + north(990.), 9., at(280));
        assert!(engine.session().unwrap().splits.is_empty());

        engine.tick(at(300));
        let split = engine.record_point(45. + north(1050.), 9., at(300));

        assert_eq!(split, Some(Split { kilometer_index: 1, duration_seconds: 300 }));
        assert_eq!(engine.session().unwrap().splits.len(), 1);
    }

    #[test]
    fn multi_kilometer_jump_collapses_into_one_split() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.record_point(45., 9., t0());
        engine.tick(at(600));
        let split = engine.record_point(45. + north(2500.), 9., at(600));

        assert_eq!(split, Some(Split { kilometer_index: 2, duration_seconds: 600 }));
        assert_eq!(engine.session().unwrap().splits.len(), 1);
    }

    #[test]
    fn split_durations_are_deltas() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        let mut lat = 45.;
        engine.record_point(lat, 9., t0());

        // 110 m every 33 s, so no point lands exactly on a kilometer mark
        for i in 1..=28 {
            lat += north(110.);
            engine.tick(at(i * 33));
            engine.record_point(lat, 9., at(i * 33));
            let session = engine.session().unwrap();
            assert_eq!(session.splits.len(), session.distance_km().floor() as usize);
        }

        let session = engine.session().unwrap();
        let durations: Vec<u64> = session.splits.iter().map(|s| s.duration_seconds).collect();
        assert_eq!(durations, vec![330, 297, 297]);
        assert_eq!(durations.iter().sum::<u64>(), session.elapsed_seconds);
    }

    #[test]
    fn distance_never_decreases() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        let coords = [(45., 9.), (45.001, 9.), (45., 9.), (45., 9.), (44.9, 9.3), (45., 9.)];
        let mut last = 0.;
        for (i, (lat, lon)) in coords.iter().enumerate() {
            engine.record_point(*lat, *lon, at(i as i64));
            let d = engine.session().unwrap().total_distance_meters;
            assert!(d >= last);
            last = d;
        }
    }

    #[test]
    fn finalize_builds_log_entry() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.record_point(45., 9., t0());
        engine.record_point(45. + north(5000.), 9., at(1500));
        engine.tick(at(1500));

        let session = engine.session().unwrap();
        assert_eq!(session.pace().map(f64::round), Some(300.));

        let entry = engine.finalize(true, at(1501)).unwrap();
        assert_eq!(entry.distance_km, 5.);
        assert_eq!(entry.duration_seconds, 1500);
        assert_eq!(entry.title, OUTDOOR_RUN_TITLE);
        assert_eq!(entry.points.len(), 2);
        assert!(!engine.is_active());
    }

    #[test]
    fn finalize_without_saving_discards() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        assert_eq!(engine.finalize(false, at(3)), None);
        assert!(!engine.is_active());
    }

    #[test]
    fn partial_kilometer_is_dropped() {
        let mut engine = RunEngine::new();
        engine.start_session(t0());
        engine.record_point(45., 9., t0());
        engine.tick(at(400));
        engine.record_point(45. + north(1400.), 9., at(400));
        engine.tick(at(520));

        let entry = engine.finalize(true, at(520)).unwrap();
        assert_eq!(entry.splits.len(), 1);
        assert_eq!(entry.duration_seconds, 520);
        assert_eq!(entry.distance_km, 1.4);
    }

    #[test]
    fn viewed_entry_is_read_only() {
        let entry = LogEntry::manual(t0(), 3.2, 1000);
        let mut engine = RunEngine::new();
        engine.view_entry(&entry, t0());

        assert_eq!(engine.record_point(45., 9., at(1)), None);
        assert!(!engine.tick(at(100)));

        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.elapsed_seconds, 1000);
        assert!((snapshot.distance_meters - 3200.).abs() < 1e-9);
    }

    #[test]
    fn replay_uses_playback_timing() {
        let coords: Vec<(f64, f64)> =
            (0..=25).map(|i| (45. + north(i as f64 * 110.), 9.)).collect();

        let mut engine = RunEngine::new();
        let entry = engine.replay_track(&coords, t0()).unwrap();

        let expected: f64 = coords.windows(2).map(|w| haversine_distance(w[0], w[1])).sum();
        assert_eq!(entry.points.len(), 26);
        assert_eq!(entry.duration_seconds, 25);
        assert!((entry.distance_km - (expected / 1000. * 100.).round() / 100.).abs() < 1e-9);
        // The 10th point closes km 1 while the clock still shows the previous second.
        assert_eq!(entry.splits[0], Split { kilometer_index: 1, duration_seconds: 9 });
        assert_eq!(entry.splits[1], Split { kilometer_index: 2, duration_seconds: 9 });
        assert!(!engine.is_active());
    }
}
