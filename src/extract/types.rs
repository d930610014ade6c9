//! Raw input record types
//!
//! Field names follow the source JSON exactly. Everything the mapper does
//! not strictly need is optional so that sparse records still parse.

use crate::types::NEXT_SONG_PAGE;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One song catalog entry (one per catalog file)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub num_songs: Option<i64>,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub artist_latitude: Option<f64>,
    #[serde(default)]
    pub artist_longitude: Option<f64>,
    #[serde(default)]
    pub artist_location: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub song_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
}

/// One user activity event (one per line of an event log file)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub item_in_session: Option<i64>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub registration: Option<f64>,
    pub session_id: i64,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    /// Milliseconds since the Unix epoch
    pub ts: i64,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Absent for logged-out users, which the logs encode as `""`
    #[serde(default, deserialize_with = "deserialize_user_id")]
    pub user_id: Option<i64>,
}

impl LogEvent {
    /// Whether this event is a song play
    pub fn is_song_play(&self) -> bool {
        self.page == NEXT_SONG_PAGE
    }

    /// Event instant in UTC, `None` if `ts` is out of range
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts)
    }
}

/// Accept `userId` as a number, a numeric string, an empty string or null
fn deserialize_user_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("userId {n} is not an integer"))),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<i64>()
                    .map(Some)
                    .map_err(|e| de::Error::custom(format!("invalid userId '{s}': {e}")))
            }
        }
        Some(other) => Err(de::Error::custom(format!(
            "userId must be a number or string, got {other}"
        ))),
    }
}
