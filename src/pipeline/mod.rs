//! Run driver
//!
//! Wires the extractor, mapper, key assigner and sink together for one run.
//!
//! # Overview
//!
//! 1. Catalog files are parsed and mapped to songs and artists; a per-file
//!    sink receives one committed batch per file.
//! 2. A [`SongLookup`] is built from the whole catalog.
//! 3. Event log files are parsed and mapped to users, time and songplays.
//!    Songplays are ordered and keyed before loading.
//! 4. The sink is finished and [`RunStats`] returned.
//!
//! Files are parsed concurrently (bounded by `extract.parallelism`) but
//! always consumed in path order, so keys and output are reproducible. A
//! file that fails to parse is logged, counted and skipped. A sink failure
//! ends the run.

mod types;

pub use types::{FileStats, RunStats};

use crate::config::EtlConfig;
use crate::error::Result;
use crate::extract::{CatalogEntry, InputSource, LogEvent};
use crate::keys::SurrogateKeyAssigner;
use crate::mapper::{map_songplays, map_songs_and_artists, map_time, map_users, SongLookup};
use crate::sink::{open_sink, CommitGranularity, Sink, StarBatch};
use futures::StreamExt;
use std::time::Instant;
use tracing::{debug, info, warn};
use types::InputKind;

/// One ETL run over a song catalog and an event log
pub struct Pipeline {
    config: EtlConfig,
    songs: InputSource,
    logs: InputSource,
    sink: Box<dyn Sink>,
    keys: SurrogateKeyAssigner,
}

impl Pipeline {
    /// Create a pipeline loading into the given sink
    pub fn new(config: EtlConfig, sink: Box<dyn Sink>) -> Result<Self> {
        config.validate()?;
        let songs = InputSource::open(&config.input.song_data)?;
        let logs = InputSource::open(&config.input.log_data)?;
        let keys = SurrogateKeyAssigner::new(config.keys.base);

        Ok(Self {
            config,
            songs,
            logs,
            sink,
            keys,
        })
    }

    /// Create a pipeline with the sink selected by the configuration
    pub fn from_config(config: EtlConfig) -> Result<Self> {
        config.validate()?;
        let sink = open_sink(&config)?;
        Self::new(config, sink)
    }

    /// The sink rows are loaded into
    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    /// Consume the pipeline, returning its sink
    pub fn into_sink(self) -> Box<dyn Sink> {
        self.sink
    }

    /// Execute the run
    pub async fn run(&mut self) -> Result<RunStats> {
        let start = Instant::now();
        let mut stats = RunStats::new();

        let Self {
            config,
            songs,
            logs,
            sink,
            keys,
        } = self;
        let per_file = sink.granularity() == CommitGranularity::PerFile;
        let extension = config.extract.extension.as_str();
        let parallelism = config.extract.parallelism.max(1);

        info!(
            "Starting run: songs from {}, logs from {}, {} sink",
            songs.url(),
            logs.url(),
            sink.name()
        );

        // ====================================================================
        // Song catalog
        // ====================================================================

        let files = songs.list(extension).await?;
        stats.song_files.found = files.len();
        info!("Found {} song files", files.len());

        let mut catalog: Vec<CatalogEntry> = Vec::with_capacity(files.len());
        let source = &*songs;
        let mut parsed = futures::stream::iter(files)
            .map(move |path| async move {
                let result = source.read_catalog(&path).await;
                (path, result)
            })
            .buffered(parallelism);

        while let Some((path, result)) = parsed.next().await {
            match result {
                Ok(entry) => {
                    stats.file_loaded(InputKind::Songs);
                    if per_file {
                        let (file_songs, file_artists) =
                            map_songs_and_artists(std::slice::from_ref(&entry));
                        let batch = StarBatch {
                            songs: file_songs,
                            artists: file_artists,
                            ..StarBatch::new(path)
                        };
                        stats.add_rows(sink.load(batch).await?);
                    }
                    catalog.push(entry);
                }
                Err(e) => {
                    warn!("Skipping {} file {}: {}", InputKind::Songs.label(), path, e);
                    stats.file_failed(InputKind::Songs, path);
                }
            }
        }
        drop(parsed);

        let (song_rows, artist_rows) = map_songs_and_artists(&catalog);
        let lookup = SongLookup::build(&song_rows, &artist_rows);
        info!(
            "Mapped {} songs and {} artists ({} lookup keys)",
            song_rows.len(),
            artist_rows.len(),
            lookup.len()
        );

        let mut run_batch = StarBatch::new("run");
        if !per_file {
            run_batch.songs = song_rows;
            run_batch.artists = artist_rows;
        }

        // ====================================================================
        // Event logs
        // ====================================================================

        let files = logs.list(extension).await?;
        stats.log_files.found = files.len();
        info!("Found {} log files", files.len());

        let mut events: Vec<LogEvent> = Vec::new();
        let source = &*logs;
        let mut parsed = futures::stream::iter(files)
            .map(move |path| async move {
                let result = source.read_events(&path).await;
                (path, result)
            })
            .buffered(parallelism);

        while let Some((path, result)) = parsed.next().await {
            match result {
                Ok(file_events) => {
                    stats.file_loaded(InputKind::Logs);
                    debug!("Parsed {} events from {}", file_events.len(), path);
                    if per_file {
                        let drafts = map_songplays(&file_events, &lookup);
                        stats.unmatched_songplays +=
                            drafts.iter().filter(|d| !d.is_matched()).count();
                        let batch = StarBatch {
                            users: map_users(&file_events),
                            time: map_time(&file_events),
                            songplays: keys.assign(drafts),
                            ..StarBatch::new(path)
                        };
                        stats.add_rows(sink.load(batch).await?);
                    } else {
                        events.extend(file_events);
                    }
                }
                Err(e) => {
                    warn!("Skipping {} file {}: {}", InputKind::Logs.label(), path, e);
                    stats.file_failed(InputKind::Logs, path);
                }
            }
        }
        drop(parsed);

        if !per_file {
            let drafts = map_songplays(&events, &lookup);
            stats.unmatched_songplays = drafts.iter().filter(|d| !d.is_matched()).count();
            run_batch.users = map_users(&events);
            run_batch.time = map_time(&events);
            run_batch.songplays = keys.assign(drafts);
            stats.add_rows(sink.load(run_batch).await?);
        }
        debug!(
            "Assigned {} songplay ids, next id {}",
            keys.assigned(),
            keys.peek()
        );

        stats.add_rows(sink.finish().await?);
        stats.set_duration(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));

        info!(
            "Run complete: {} rows ({} songplays, {} unmatched), {} files skipped, {}ms",
            stats.rows.total(),
            stats.rows.songplays,
            stats.unmatched_songplays,
            stats.files_failed(),
            stats.elapsed_ms
        );

        Ok(stats)
    }
}
