use std::time::SystemTime;

use geo_types::Point;
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use stride_tracker_lib::geo_point::GeoPoint;
use time::OffsetDateTime;

use crate::StrideError;

pub const GPX_CREATOR: &str = "StrideTracker";
pub const GPX_TRACK_NAME: &str = "StrideTracker Run";

/// GPX 1.1 document with one track and one segment. Only position and time are written.
pub fn write_gpx(points: &[GeoPoint]) -> Result<String, StrideError> {
    if points.is_empty() {
        return Err(StrideError::NoRunData);
    }

    let mut gpx = Gpx::default();
    gpx.version = GpxVersion::Gpx11;
    gpx.creator = Some(GPX_CREATOR.into());

    let mut track = Track::new();
    track.name = Some(GPX_TRACK_NAME.into());
    let mut segment = TrackSegment::new();

    points.iter().for_each(|p| {
        let mut wp = Waypoint::new(Point::new(p.longitude, p.latitude));
        let time: SystemTime = p.timestamp.into();
        let time: OffsetDateTime = time.into();
        wp.time = Some(Time::from(time));
        segment.points.push(wp);
    });

    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buf = Vec::new();
    gpx::write(&gpx, &mut buf).map_err(|err| StrideError::GpxWrite(err.to_string()))?;
    String::from_utf8(buf).map_err(|err| StrideError::GpxWrite(err.to_string()))
}

/// Track point coordinates as (lat, lon), in document order. Times are ignored.
pub fn read_gpx_coordinates(text: &str) -> Result<Vec<(f64, f64)>, StrideError> {
    let gpx = gpx::read(text.as_bytes())
        .map_err(|err| StrideError::MalformedImport(err.to_string()))?;

    let coordinates = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|point| {
            let position = point.point();
            (position.y(), position.x())
        })
        .collect();

    Ok(coordinates)
}
