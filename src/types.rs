//! Common types used throughout the ETL
//!
//! This module contains shared type definitions used across the
//! extract, mapper, sink and pipeline modules.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// The page value that marks an event as a song play
pub const NEXT_SONG_PAGE: &str = "NextSong";

// ============================================================================
// Relations
// ============================================================================

/// The five relations of the star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Song dimension
    Songs,
    /// Artist dimension
    Artists,
    /// User dimension
    Users,
    /// Time dimension
    Time,
    /// Songplay fact table
    Songplays,
}

impl Relation {
    /// All relations, dimensions first so facts never reference a missing row
    pub const ALL: [Relation; 5] = [
        Relation::Songs,
        Relation::Artists,
        Relation::Users,
        Relation::Time,
        Relation::Songplays,
    ];

    /// Table / directory name
    pub fn name(self) -> &'static str {
        match self {
            Relation::Songs => "songs",
            Relation::Artists => "artists",
            Relation::Users => "users",
            Relation::Time => "time",
            Relation::Songplays => "songplays",
        }
    }

    /// Columns the file store partitions this relation by, outermost first
    pub fn partition_columns(self) -> &'static [&'static str] {
        match self {
            Relation::Songs => &["year", "artist_id"],
            Relation::Time | Relation::Songplays => &["year", "month"],
            Relation::Artists | Relation::Users => &[],
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}
