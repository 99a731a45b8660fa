//! Pace math and the time formats shown to the runner.

/// Shown wherever a value cannot be computed.
pub const UNDEFINED: &str = "—";

/// Exponent of Riegel's endurance model.
pub const RIEGEL_EXPONENT: f64 = 1.06;

/// Seconds per kilometer, or `None` while no distance has been covered.
pub fn pace_seconds_per_km(elapsed_seconds: u64, distance_meters: f64) -> Option<f64> {
    if distance_meters > 0. {
        Some(elapsed_seconds as f64 / (distance_meters / 1000.))
    } else {
        None
    }
}

/// Pace for a given distance (km) and duration, rejecting non-positive or non-finite distances.
pub fn pace_calculator(distance_km: f64, duration_seconds: u64) -> Option<f64> {
    if !distance_km.is_finite() || distance_km <= 0. {
        return None;
    }
    Some(duration_seconds as f64 / distance_km)
}

/// Predicted time over `d2` given a result `t1` over `d1`: `t1 * (d2 / d1)^1.06`.
pub fn riegel_prediction(d1: f64, t1: u64, d2: f64) -> Option<u64> {
    if !d1.is_finite() || !d2.is_finite() || d1 <= 0. || d2 <= 0. {
        return None;
    }
    Some((t1 as f64 * (d2 / d1).powf(RIEGEL_EXPONENT)).round() as u64)
}

/// `h:mm:ss` once past the hour, `mm:ss` below it.
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

pub fn format_pace(pace: Option<f64>) -> String {
    match pace {
        Some(p) if p.is_finite() && p > 0. => {
            let minutes = (p / 60.).floor() as u64;
            let seconds = (p % 60.).floor() as u64;
            format!("{minutes:02}:{seconds:02} /km")
        }
        _ => UNDEFINED.to_string(),
    }
}

/// Parses `mm:ss` or `h:mm:ss` into seconds.
pub fn parse_duration(text: &str) -> Option<u64> {
    let parts = text
        .split(':')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    match parts.as_slice() {
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}
