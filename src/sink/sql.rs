//! SQL for the row store
//!
//! Dimension inserts are upserts so that reprocessing already committed
//! files does not duplicate rows. Songplays remember the input file they came
//! from: a file's rows are replaced wholesale when it is loaded again, since
//! their ids shift whenever an earlier file starts or stops parsing.
//! Timestamps are bound as epoch milliseconds.

use crate::types::Relation;

/// Quoted table name (`time` is a keyword)
pub fn table_name(relation: Relation) -> String {
    format!("\"{}\"", relation.name())
}

pub const CREATE_SONGS: &str = r#"
CREATE TABLE IF NOT EXISTS "songs" (
    song_id   VARCHAR PRIMARY KEY,
    title     VARCHAR NOT NULL,
    artist_id VARCHAR NOT NULL,
    year      INTEGER NOT NULL,
    duration  DOUBLE NOT NULL
)"#;

pub const CREATE_ARTISTS: &str = r#"
CREATE TABLE IF NOT EXISTS "artists" (
    artist_id VARCHAR PRIMARY KEY,
    name      VARCHAR NOT NULL,
    location  VARCHAR,
    latitude  DOUBLE,
    longitude DOUBLE
)"#;

pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS "users" (
    user_id    BIGINT PRIMARY KEY,
    first_name VARCHAR,
    last_name  VARCHAR,
    gender     VARCHAR,
    level      VARCHAR NOT NULL
)"#;

pub const CREATE_TIME: &str = r#"
CREATE TABLE IF NOT EXISTS "time" (
    start_time TIMESTAMP PRIMARY KEY,
    hour       INTEGER NOT NULL,
    day        INTEGER NOT NULL,
    week       INTEGER NOT NULL,
    month      INTEGER NOT NULL,
    year       INTEGER NOT NULL,
    weekday    INTEGER NOT NULL
)"#;

pub const CREATE_SONGPLAYS: &str = r#"
CREATE TABLE IF NOT EXISTS "songplays" (
    songplay_id BIGINT PRIMARY KEY,
    start_time  TIMESTAMP NOT NULL,
    user_id     BIGINT NOT NULL,
    level       VARCHAR NOT NULL,
    song_id     VARCHAR,
    artist_id   VARCHAR,
    session_id  BIGINT NOT NULL,
    location    VARCHAR,
    user_agent  VARCHAR,
    source_file VARCHAR
)"#;

/// DDL for every relation, in load order
pub fn create_tables() -> [&'static str; 5] {
    [
        CREATE_SONGS,
        CREATE_ARTISTS,
        CREATE_USERS,
        CREATE_TIME,
        CREATE_SONGPLAYS,
    ]
}

pub const INSERT_SONG: &str = r#"
INSERT INTO "songs" (song_id, title, artist_id, year, duration)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (song_id) DO NOTHING"#;

pub const INSERT_ARTIST: &str = r#"
INSERT INTO "artists" (artist_id, name, location, latitude, longitude)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (artist_id) DO NOTHING"#;

/// Latest level wins across files
pub const UPSERT_USER: &str = r#"
INSERT INTO "users" (user_id, first_name, last_name, gender, level)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (user_id) DO UPDATE SET level = excluded.level"#;

pub const INSERT_TIME: &str = r#"
INSERT INTO "time" (start_time, hour, day, week, month, year, weekday)
VALUES (epoch_ms(?), ?, ?, ?, ?, ?, ?)
ON CONFLICT (start_time) DO NOTHING"#;

/// Replaces whatever row held the id before, including rows from other files
pub const UPSERT_SONGPLAY: &str = r#"
INSERT INTO "songplays"
    (songplay_id, start_time, user_id, level, song_id, artist_id, session_id, location, user_agent, source_file)
VALUES (?, epoch_ms(?), ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (songplay_id) DO UPDATE SET
    start_time = excluded.start_time,
    user_id = excluded.user_id,
    level = excluded.level,
    song_id = excluded.song_id,
    artist_id = excluded.artist_id,
    session_id = excluded.session_id,
    location = excluded.location,
    user_agent = excluded.user_agent,
    source_file = excluded.source_file"#;

/// Drop a file's earlier songplays that fall outside its new id range
///
/// Ids inside the range are overwritten by the upsert instead, which keeps a
/// transaction from deleting and re-inserting the same key.
pub const DELETE_STALE_SONGPLAYS: &str = r#"
DELETE FROM "songplays"
WHERE source_file = ? AND (songplay_id < ? OR songplay_id > ?)"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_are_quoted() {
        assert_eq!(table_name(Relation::Time), "\"time\"");
        assert_eq!(table_name(Relation::Songplays), "\"songplays\"");
    }

    #[test]
    fn test_ddl_covers_every_relation() {
        let ddl = create_tables();
        for relation in Relation::ALL {
            assert!(
                ddl.iter().any(|sql| sql.contains(&table_name(relation))),
                "no DDL for {relation}"
            );
        }
    }

    #[test]
    fn test_songplays_track_source_file() {
        assert!(CREATE_SONGPLAYS.contains("source_file"));
        assert!(UPSERT_SONGPLAY.contains("source_file = excluded.source_file"));
        assert_eq!(UPSERT_SONGPLAY.matches('?').count(), 10);
        assert_eq!(DELETE_STALE_SONGPLAYS.matches('?').count(), 3);
    }
}
