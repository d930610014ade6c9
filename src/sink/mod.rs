//! Sink writers
//!
//! One [`Sink`] trait with two backends:
//!
//! - [`RowStoreSink`]: a transactional row store (DuckDB, or a PostgreSQL
//!   warehouse attached through DuckDB), committing one batch per input file
//! - [`FileStoreSink`]: Hive-partitioned Parquet on object storage, written
//!   once per run with overwrite semantics
//!
//! The pipeline asks the sink for its [`CommitGranularity`] and batches the
//! mapped rows accordingly.

mod file_store;
mod row_store;
mod sql;

pub use file_store::FileStoreSink;
pub use row_store::RowStoreSink;

use crate::config::{EtlConfig, SinkConfig};
use crate::error::Result;
use crate::mapper::{ArtistRecord, SongRecord, SongplayRecord, TimeRecord, UserRecord};
use crate::retry::RetryPolicy;
use crate::types::Relation;
use async_trait::async_trait;
use serde::Serialize;
use std::ops::{Add, AddAssign};

// ============================================================================
// Sink Trait
// ============================================================================

/// How often the sink wants to receive a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitGranularity {
    /// One batch, one commit, per input file
    PerFile,
    /// One batch holding the whole run
    PerRun,
}

/// Destination for mapped star schema rows
#[async_trait]
pub trait Sink: Send {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Batching the sink expects from the driver
    fn granularity(&self) -> CommitGranularity;

    /// Load one batch
    async fn load(&mut self, batch: StarBatch) -> Result<LoadStats>;

    /// Flush anything still pending; called once at the end of a run
    async fn finish(&mut self) -> Result<LoadStats>;
}

/// Create the sink selected by the configuration
pub fn open_sink(config: &EtlConfig) -> Result<Box<dyn Sink>> {
    let retry = RetryPolicy::from(&config.retry);
    match &config.sink {
        SinkConfig::RowStore(row_store) => Ok(Box::new(RowStoreSink::open(row_store, retry)?)),
        SinkConfig::FileStore(file_store) => {
            Ok(Box::new(FileStoreSink::open(file_store, retry)?))
        }
    }
}

// ============================================================================
// Batches and Stats
// ============================================================================

/// Rows for all five relations from one load unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StarBatch {
    /// Input file (or `run`) the rows came from, for logs
    pub source: String,
    pub songs: Vec<SongRecord>,
    pub artists: Vec<ArtistRecord>,
    pub users: Vec<UserRecord>,
    pub time: Vec<TimeRecord>,
    pub songplays: Vec<SongplayRecord>,
}

impl StarBatch {
    /// Empty batch labelled with its source
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Whether the batch holds no rows at all
    pub fn is_empty(&self) -> bool {
        self.row_counts().total() == 0
    }

    /// Number of rows per relation
    pub fn row_counts(&self) -> LoadStats {
        LoadStats {
            songs: self.songs.len(),
            artists: self.artists.len(),
            users: self.users.len(),
            time: self.time.len(),
            songplays: self.songplays.len(),
        }
    }

    /// Append another batch's rows
    pub fn extend(&mut self, other: StarBatch) {
        self.songs.extend(other.songs);
        self.artists.extend(other.artists);
        self.users.extend(other.users);
        self.time.extend(other.time);
        self.songplays.extend(other.songplays);
    }
}

/// Rows written per relation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub songs: usize,
    pub artists: usize,
    pub users: usize,
    pub time: usize,
    pub songplays: usize,
}

impl LoadStats {
    /// Total rows across relations
    pub fn total(&self) -> usize {
        self.songs + self.artists + self.users + self.time + self.songplays
    }

    /// Rows for one relation
    pub fn get(&self, relation: Relation) -> usize {
        match relation {
            Relation::Songs => self.songs,
            Relation::Artists => self.artists,
            Relation::Users => self.users,
            Relation::Time => self.time,
            Relation::Songplays => self.songplays,
        }
    }

    fn slot(&mut self, relation: Relation) -> &mut usize {
        match relation {
            Relation::Songs => &mut self.songs,
            Relation::Artists => &mut self.artists,
            Relation::Users => &mut self.users,
            Relation::Time => &mut self.time,
            Relation::Songplays => &mut self.songplays,
        }
    }

    /// Set the count for one relation
    pub fn set(&mut self, relation: Relation, rows: usize) {
        *self.slot(relation) = rows;
    }
}

impl Add for LoadStats {
    type Output = LoadStats;

    fn add(mut self, rhs: LoadStats) -> LoadStats {
        self += rhs;
        self
    }
}

impl AddAssign for LoadStats {
    fn add_assign(&mut self, rhs: LoadStats) {
        for relation in Relation::ALL {
            *self.slot(relation) += rhs.get(relation);
        }
    }
}

#[cfg(test)]
mod tests;
