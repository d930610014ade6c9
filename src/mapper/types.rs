//! Star schema record types

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

/// Song dimension row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    /// `0` when unknown
    pub year: i32,
    /// Seconds, never negative
    pub duration: f64,
}

/// Artist dimension row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// User dimension row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

/// Time dimension row, fully derived from `start_time`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRecord {
    pub start_time: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    /// ISO-8601 week of year
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// Sunday = 1 ... Saturday = 7
    pub weekday: u32,
}

impl TimeRecord {
    /// Derive the calendar fields of an instant (UTC)
    pub fn from_start_time(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            hour: start_time.hour(),
            day: start_time.day(),
            week: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().number_from_sunday(),
        }
    }
}

/// A songplay that has not been given its surrogate key yet
///
/// Carries the event's song title, artist name and position in the session
/// so that key assignment can order rows deterministically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongplayDraft {
    pub start_time: DateTime<Utc>,
    pub user_id: i64,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub item_in_session: Option<i64>,
    pub song_title: Option<String>,
    pub artist_name: Option<String>,
}

impl SongplayDraft {
    /// Whether the catalog lookup found a song for this play
    pub fn is_matched(&self) -> bool {
        self.song_id.is_some()
    }
}

/// Songplay fact row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongplayRecord {
    pub songplay_id: i64,
    pub start_time: DateTime<Utc>,
    pub user_id: i64,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl SongplayRecord {
    /// Attach a surrogate key to a draft
    pub fn from_draft(songplay_id: i64, draft: SongplayDraft) -> Self {
        Self {
            songplay_id,
            start_time: draft.start_time,
            user_id: draft.user_id,
            level: draft.level,
            song_id: draft.song_id,
            artist_id: draft.artist_id,
            session_id: draft.session_id,
            location: draft.location,
            user_agent: draft.user_agent,
        }
    }
}
