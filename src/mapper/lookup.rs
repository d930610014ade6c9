//! Song lookup for resolving play events against the catalog

use super::types::{ArtistRecord, SongRecord};
use std::collections::HashMap;

/// Lookup from (song title, artist name) to (song_id, artist_id)
///
/// Events only carry the song title and artist name, so plays are matched
/// on that pair rather than on a foreign key. When two catalog songs share a
/// pair, the smallest song_id wins.
#[derive(Debug, Clone, Default)]
pub struct SongLookup {
    entries: HashMap<(String, String), (String, String)>,
}

impl SongLookup {
    /// Build the lookup from the run's songs and artists
    ///
    /// Songs whose artist is unknown are skipped: they can never match.
    pub fn build(songs: &[SongRecord], artists: &[ArtistRecord]) -> Self {
        let artist_names: HashMap<&str, &str> = artists
            .iter()
            .map(|a| (a.artist_id.as_str(), a.name.as_str()))
            .collect();

        let mut ordered: Vec<&SongRecord> = songs.iter().collect();
        ordered.sort_by(|a, b| a.song_id.cmp(&b.song_id));

        let mut entries = HashMap::with_capacity(ordered.len());
        for song in ordered {
            let Some(name) = artist_names.get(song.artist_id.as_str()) else {
                continue;
            };
            entries
                .entry((song.title.clone(), (*name).to_string()))
                .or_insert_with(|| (song.song_id.clone(), song.artist_id.clone()));
        }

        Self { entries }
    }

    /// Resolve a play's (title, artist name) to (song_id, artist_id)
    pub fn resolve(&self, title: &str, artist_name: &str) -> Option<(&str, &str)> {
        self.entries
            .get(&(title.to_string(), artist_name.to_string()))
            .map(|(song_id, artist_id)| (song_id.as_str(), artist_id.as_str()))
    }

    /// Number of distinct (title, artist name) keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the lookup is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
