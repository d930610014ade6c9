//! Projections from raw records into the five relations

use super::lookup::SongLookup;
use super::types::{ArtistRecord, SongRecord, SongplayDraft, TimeRecord, UserRecord};
use crate::extract::{CatalogEntry, LogEvent};
use crate::keys::order_songplays;
use std::collections::BTreeMap;
use tracing::debug;

/// Project NextSong events into users, deduplicated by user_id
///
/// Events are stably sorted by `ts` first so the last-seen values (notably
/// `level`) win. Events without a user id are anonymous and skipped, as are
/// events without a level.
pub fn map_users(events: &[LogEvent]) -> Vec<UserRecord> {
    let mut plays: Vec<&LogEvent> = events.iter().filter(|e| e.is_song_play()).collect();
    plays.sort_by_key(|e| e.ts);

    let mut users = BTreeMap::new();
    for event in plays {
        let Some(user_id) = event.user_id else {
            continue;
        };
        let Some(level) = play_level(event) else {
            continue;
        };
        users.insert(
            user_id,
            UserRecord {
                user_id,
                first_name: event.first_name.clone(),
                last_name: event.last_name.clone(),
                gender: event.gender.clone(),
                level,
            },
        );
    }

    users.into_values().collect()
}

/// Derive time rows from NextSong events, deduplicated by start_time
pub fn map_time(events: &[LogEvent]) -> Vec<TimeRecord> {
    let mut times = BTreeMap::new();
    for event in events.iter().filter(|e| e.is_song_play()) {
        match event.start_time() {
            Some(start_time) => {
                times
                    .entry(start_time)
                    .or_insert_with(|| TimeRecord::from_start_time(start_time));
            }
            None => debug!(ts = event.ts, "Skipping event with out-of-range timestamp"),
        }
    }
    times.into_values().collect()
}

/// Project catalog entries into songs and artists, deduplicated by primary key
///
/// The first occurrence of a key wins. Entries without a song_id yield no
/// song and entries without an artist_id yield no artist.
pub fn map_songs_and_artists(catalog: &[CatalogEntry]) -> (Vec<SongRecord>, Vec<ArtistRecord>) {
    let mut songs = BTreeMap::new();
    let mut artists = BTreeMap::new();

    for entry in catalog {
        if let Some(song_id) = non_empty(entry.song_id.as_deref()) {
            songs.entry(song_id.to_string()).or_insert_with(|| SongRecord {
                song_id: song_id.to_string(),
                title: entry.title.clone().unwrap_or_default(),
                artist_id: entry.artist_id.clone().unwrap_or_default(),
                year: entry.year.unwrap_or(0),
                duration: sanitize_duration(entry.duration),
            });
        }

        if let Some(artist_id) = non_empty(entry.artist_id.as_deref()) {
            artists
                .entry(artist_id.to_string())
                .or_insert_with(|| ArtistRecord {
                    artist_id: artist_id.to_string(),
                    name: entry.artist_name.clone().unwrap_or_default(),
                    location: non_empty(entry.artist_location.as_deref()).map(str::to_string),
                    latitude: entry.artist_latitude.filter(|v| v.is_finite()),
                    longitude: entry.artist_longitude.filter(|v| v.is_finite()),
                });
        }
    }

    (songs.into_values().collect(), artists.into_values().collect())
}

/// Turn NextSong events into keyless songplays, resolved through the lookup
///
/// A lookup miss leaves song_id and artist_id null and still emits the row.
/// Events without a user id or a level emit nothing. The result is already
/// in key-assignment order.
pub fn map_songplays(events: &[LogEvent], lookup: &SongLookup) -> Vec<SongplayDraft> {
    let mut drafts: Vec<SongplayDraft> = events
        .iter()
        .filter(|e| e.is_song_play())
        .filter_map(|event| {
            let user_id = event.user_id?;
            let start_time = event.start_time()?;
            let level = play_level(event)?;

            let resolved = match (event.song.as_deref(), event.artist.as_deref()) {
                (Some(title), Some(artist)) => lookup.resolve(title, artist),
                _ => None,
            };

            Some(SongplayDraft {
                start_time,
                user_id,
                level,
                song_id: resolved.map(|(song_id, _)| song_id.to_string()),
                artist_id: resolved.map(|(_, artist_id)| artist_id.to_string()),
                session_id: event.session_id,
                location: event.location.clone(),
                user_agent: event.user_agent.clone(),
                item_in_session: event.item_in_session,
                song_title: event.song.clone(),
                artist_name: event.artist.clone(),
            })
        })
        .collect();

    order_songplays(&mut drafts);
    drafts
}

/// Subscription level of a play; a blank or missing level is skipped
fn play_level(event: &LogEvent) -> Option<String> {
    let level = non_empty(event.level.as_deref()).map(str::to_string);
    if level.is_none() {
        debug!(
            ts = event.ts,
            session = event.session_id,
            "Skipping play without a level"
        );
    }
    level
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn sanitize_duration(duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d.is_finite() && d >= 0.0 => d,
        _ => 0.0,
    }
}
