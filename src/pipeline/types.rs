//! Pipeline types

use crate::sink::LoadStats;
use serde::Serialize;

/// Per input kind file counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    /// Files listed under the root
    pub found: usize,
    /// Files parsed successfully
    pub loaded: usize,
    /// Files skipped because they failed to read or parse
    pub failed: usize,
}

/// Statistics for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Catalog files
    pub song_files: FileStats,
    /// Event log files
    pub log_files: FileStats,
    /// Rows written per relation
    pub rows: LoadStats,
    /// Songplays without a catalog match
    pub unmatched_songplays: usize,
    /// Paths of files that were skipped
    pub failed_files: Vec<String>,
    /// Duration in milliseconds
    pub elapsed_ms: u64,
}

impl RunStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Total files skipped
    pub fn files_failed(&self) -> usize {
        self.song_files.failed + self.log_files.failed
    }

    /// Add rows written by the sink
    pub fn add_rows(&mut self, rows: LoadStats) {
        self.rows += rows;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.elapsed_ms = ms;
    }

    pub(crate) fn files_mut(&mut self, kind: InputKind) -> &mut FileStats {
        match kind {
            InputKind::Songs => &mut self.song_files,
            InputKind::Logs => &mut self.log_files,
        }
    }

    pub(crate) fn file_loaded(&mut self, kind: InputKind) {
        self.files_mut(kind).loaded += 1;
    }

    pub(crate) fn file_failed(&mut self, kind: InputKind, path: String) {
        self.files_mut(kind).failed += 1;
        self.failed_files.push(path);
    }
}

/// Which input tree a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputKind {
    Songs,
    Logs,
}

impl InputKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            InputKind::Songs => "song",
            InputKind::Logs => "log",
        }
    }
}
