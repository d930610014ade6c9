//! Schema mapper
//!
//! Projects extracted catalog entries and log events into the star schema:
//! the `songs`, `artists`, `users` and `time` dimensions and the `songplays`
//! fact table.
//!
//! # Overview
//!
//! Every projection deduplicates by primary key and returns rows sorted by
//! that key, so the same input always maps to the same output. Songplays are
//! matched to the catalog through a [`SongLookup`] keyed on (song title,
//! artist name).

mod lookup;
mod projections;
mod types;

pub use lookup::SongLookup;
pub use projections::{map_songplays, map_songs_and_artists, map_time, map_users};
pub use types::{
    ArtistRecord, SongRecord, SongplayDraft, SongplayRecord, TimeRecord, UserRecord,
};
