//! Forgiving field decoders. Log files come from other tools and older versions,
//! so a null or mistyped field must not sink the whole entry.

use chrono::{DateTime, Utc};
use serde::{de::IgnoredAny, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Other(IgnoredAny),
}

fn lenient_or<'de, D, T>(deserializer: D, fallback: T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Value(value) => value,
        Lenient::Other(_) => fallback,
    })
}

/// `T::default()` for null or a value of the wrong type.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    lenient_or(deserializer, T::default())
}

/// NaN for a coordinate that was written as null (NaN in JSON) or garbage.
pub(crate) fn lenient_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_or(deserializer, f64::NAN)
}

/// Epoch milliseconds, or the epoch itself when unreadable.
pub(crate) fn lenient_millis<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis: Option<i64> = lenient(deserializer)?;
    Ok(millis.and_then(DateTime::from_timestamp_millis).unwrap_or_default())
}
