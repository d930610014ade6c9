//! Transactional row store backed by DuckDB
//!
//! A DuckDB database file (or `:memory:`) is used directly. A PostgreSQL
//! warehouse is reached by attaching it through DuckDB's postgres extension
//! and making it the default catalog.

use super::sql;
use super::{CommitGranularity, LoadStats, Sink, StarBatch};
use crate::config::{RowStoreConfig, RowStoreEngine};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::Relation;
use async_trait::async_trait;
use duckdb::{params, Connection};
use tracing::{debug, info, warn};

/// Row store sink
pub struct RowStoreSink {
    /// DuckDB connection
    conn: Connection,
    /// Connection target with secrets masked (for logging)
    target: String,
    retry: RetryPolicy,
}

impl RowStoreSink {
    /// Connect and create the tables if missing
    pub fn open(config: &RowStoreConfig, retry: RetryPolicy) -> Result<Self> {
        let target = config.describe();
        let conn = match config.engine {
            RowStoreEngine::Duckdb => open_duckdb(&config.connection_string())?,
            RowStoreEngine::Postgres => attach_postgres(&config.connection_string())?,
        };

        let sink = Self {
            conn,
            target,
            retry,
        };
        sink.create_tables()?;
        info!("Opened row store {}", sink.target);
        Ok(sink)
    }

    /// In-memory DuckDB row store
    pub fn in_memory(retry: RetryPolicy) -> Result<Self> {
        let sink = Self {
            conn: open_duckdb(":memory:")?,
            target: "duckdb::memory:".to_string(),
            retry,
        };
        sink.create_tables()?;
        Ok(sink)
    }

    fn create_tables(&self) -> Result<()> {
        for ddl in sql::create_tables() {
            self.conn.execute_batch(ddl)?;
        }
        Ok(())
    }

    /// Number of rows currently in a relation
    pub fn count(&self, relation: Relation) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {}", sql::table_name(relation));
        Ok(self.conn.query_row(&query, [], |row| row.get(0))?)
    }

    /// Underlying connection, for ad-hoc queries
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Write one batch inside a single transaction
    ///
    /// Songplays are tagged with the batch source. Earlier rows from the same
    /// source outside the batch's id range are deleted first.
    fn write_batch(&mut self, batch: &StarBatch) -> duckdb::Result<LoadStats> {
        let tx = self.conn.transaction()?;
        let mut stats = LoadStats::default();

        {
            let mut stmt = tx.prepare(sql::INSERT_SONG)?;
            for song in &batch.songs {
                stats.songs += stmt.execute(params![
                    song.song_id,
                    song.title,
                    song.artist_id,
                    song.year,
                    song.duration,
                ])?;
            }

            let mut stmt = tx.prepare(sql::INSERT_ARTIST)?;
            for artist in &batch.artists {
                stats.artists += stmt.execute(params![
                    artist.artist_id,
                    artist.name,
                    artist.location,
                    artist.latitude,
                    artist.longitude,
                ])?;
            }

            let mut stmt = tx.prepare(sql::UPSERT_USER)?;
            for user in &batch.users {
                stats.users += stmt.execute(params![
                    user.user_id,
                    user.first_name,
                    user.last_name,
                    user.gender,
                    user.level,
                ])?;
            }

            let mut stmt = tx.prepare(sql::INSERT_TIME)?;
            for time in &batch.time {
                stats.time += stmt.execute(params![
                    time.start_time.timestamp_millis(),
                    i64::from(time.hour),
                    i64::from(time.day),
                    i64::from(time.week),
                    i64::from(time.month),
                    time.year,
                    i64::from(time.weekday),
                ])?;
            }

            // An empty range (MAX, MIN) clears every earlier row of the source
            let first = batch.songplays.iter().map(|p| p.songplay_id).min();
            let last = batch.songplays.iter().map(|p| p.songplay_id).max();
            let stale = tx.execute(
                sql::DELETE_STALE_SONGPLAYS,
                params![
                    batch.source,
                    first.unwrap_or(i64::MAX),
                    last.unwrap_or(i64::MIN),
                ],
            )?;
            if stale > 0 {
                debug!("Removed {} stale songplays from {}", stale, batch.source);
            }

            let mut stmt = tx.prepare(sql::UPSERT_SONGPLAY)?;
            for play in &batch.songplays {
                stats.songplays += stmt.execute(params![
                    play.songplay_id,
                    play.start_time.timestamp_millis(),
                    play.user_id,
                    play.level,
                    play.song_id,
                    play.artist_id,
                    play.session_id,
                    play.location,
                    play.user_agent,
                    batch.source,
                ])?;
            }
        }

        tx.commit()?;
        Ok(stats)
    }
}

/// Map a DuckDB failure onto the crate error, marking transient ones
///
/// Lost connections to an attached catalog, I/O failures, lock contention
/// and transaction conflicts become [`Error::Connection`], which the retry
/// policy retries. Everything else stays a [`Error::Database`].
pub(crate) fn classify_duckdb_error(err: duckdb::Error) -> Error {
    const TRANSIENT: [&str; 7] = [
        "io error",
        "connection error",
        "could not set lock",
        "conflict on",
        "interrupt",
        "connection to server",
        "server closed the connection",
    ];

    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    if TRANSIENT.iter().any(|marker| lower.contains(marker)) {
        Error::connection(message)
    } else {
        Error::Database(err)
    }
}

/// Run one write attempt at a time until it succeeds or the policy gives up
///
/// The attempt is synchronous so no transaction is ever held across the
/// backoff sleep.
pub(crate) async fn write_with_retry<F>(
    retry: &RetryPolicy,
    source: &str,
    mut attempt_write: F,
) -> Result<LoadStats>
where
    F: FnMut() -> duckdb::Result<LoadStats>,
{
    let mut attempt = 0;
    loop {
        match attempt_write().map_err(classify_duckdb_error) {
            Ok(stats) => return Ok(stats),
            Err(e) => match retry.should_retry(attempt, &e) {
                Some(delay) => {
                    warn!(
                        "Loading {} failed, attempt {}/{}, retrying in {:?}: {}",
                        source,
                        attempt + 1,
                        retry.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(retry.give_up(e)),
            },
        }
    }
}

#[async_trait]
impl Sink for RowStoreSink {
    fn name(&self) -> &str {
        "row_store"
    }

    fn granularity(&self) -> CommitGranularity {
        CommitGranularity::PerFile
    }

    async fn load(&mut self, batch: StarBatch) -> Result<LoadStats> {
        // Empty batches still clear the source's earlier songplays
        let retry = self.retry.clone();
        let stats = write_with_retry(&retry, &batch.source, || self.write_batch(&batch)).await?;
        debug!(
            "Committed {} rows from {} to {}",
            stats.total(),
            batch.source,
            self.target
        );
        Ok(stats)
    }

    async fn finish(&mut self) -> Result<LoadStats> {
        // Every batch is committed in load
        Ok(LoadStats::default())
    }
}

/// Open a native DuckDB database file, or an in-memory one for `:memory:`
fn open_duckdb(path: &str) -> Result<Connection> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()
    } else {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Connection::open(path)
    };
    conn.map_err(|e| Error::connection(format!("Failed to open DuckDB database {path}: {e}")))
}

/// Attach a PostgreSQL warehouse and make it the default catalog
fn attach_postgres(connection_string: &str) -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;

    conn.execute_batch("INSTALL postgres; LOAD postgres;")
        .map_err(|e| Error::config(format!("Failed to load postgres extension: {e}")))?;

    let escaped = connection_string.replace('\'', "''");
    conn.execute_batch(&format!(
        "ATTACH '{escaped}' AS warehouse (TYPE POSTGRES); USE warehouse;"
    ))
    .map_err(|e| Error::connection(format!("Failed to attach PostgreSQL: {e}")))?;

    Ok(conn)
}
