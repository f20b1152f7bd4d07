//! Serde support for human-readable durations (`"5s"`, `"1m"`, `"250ms"`).
//!
//! Used via `#[serde(with = "crate::config::duration")]` on duration fields
//! of the configuration schema, and by the CLI for duration-valued flags.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de};

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humanize(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(raw.as_str()).map_err(de::Error::custom)
}

/// Renders a duration in the most compact unit that loses no precision.
pub(crate) fn humanize(value: Duration) -> String {
    let nanos = value.subsec_nanos();
    if nanos == 0 {
        format!("{}s", value.as_secs())
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", value.as_millis())
    } else if nanos % 1_000 == 0 {
        format!("{}us", value.as_micros())
    } else {
        format!("{}ns", value.as_nanos())
    }
}
