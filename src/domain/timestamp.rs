//! Lenient timestamp decoding for stored documents.
//!
//! Documents written by different clients carry timestamps in different
//! shapes: RFC 3339 strings, epoch milliseconds (`Date.now()`), or exported
//! `{ seconds, nanoseconds }` objects. All decode to `DateTime<Utc>`;
//! serialization always emits RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
    Parts {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds", alias = "nanos")]
        nanoseconds: u32,
    },
}

fn resolve(raw: RawTimestamp) -> Result<DateTime<Utc>, String> {
    match raw {
        RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| format!("timestamp out of range: {ms}")),
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid timestamp {text:?}: {e}")),
        RawTimestamp::Parts {
            seconds,
            nanoseconds,
        } => DateTime::from_timestamp(seconds, nanoseconds)
            .ok_or_else(|| format!("timestamp out of range: {seconds}s")),
    }
}

/// Deserializes a required timestamp.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawTimestamp::deserialize(deserializer)?;
    resolve(raw).map_err(serde::de::Error::custom)
}

/// Deserializes an optional timestamp; `null` maps to `None`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    raw.map(resolve)
        .transpose()
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "deserialize")]
        at: DateTime<Utc>,
    }

    fn probe(value: serde_json::Value) -> Result<DateTime<Utc>, serde_json::Error> {
        serde_json::from_value::<Probe>(json!({ "at": value })).map(|p| p.at)
    }

    #[test]
    fn accepts_rfc3339() {
        let at = probe(json!("2025-03-01T08:30:00Z")).unwrap();
        assert_eq!(at.timestamp(), 1_740_817_800);
    }

    #[test]
    fn accepts_epoch_millis() {
        let at = probe(json!(1_740_817_800_000_i64)).unwrap();
        assert_eq!(at.timestamp(), 1_740_817_800);
    }

    #[test]
    fn accepts_exported_seconds_object() {
        let at = probe(json!({ "_seconds": 1_740_817_800, "_nanoseconds": 5 })).unwrap();
        assert_eq!(at.timestamp(), 1_740_817_800);
        assert_eq!(at.timestamp_subsec_nanos(), 5);
    }

    #[test]
    fn rejects_garbage() {
        assert!(probe(json!("next tuesday")).is_err());
        assert!(probe(json!(true)).is_err());
    }
}
