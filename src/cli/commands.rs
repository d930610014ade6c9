//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sparkify star-schema ETL
#[derive(Parser, Debug)]
#[command(name = "sparkify-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ETL once
    Run {
        /// Sink to load into (overrides the config file)
        #[arg(long)]
        sink: Option<SinkKind>,

        /// Song catalog root (local path or object store URL)
        #[arg(long)]
        input_songs: Option<String>,

        /// Event log root (local path or object store URL)
        #[arg(long)]
        input_logs: Option<String>,

        /// File store output root
        /// Supports: /path, s3://bucket/path, gs://bucket/path, az://container/path
        #[arg(short, long)]
        output: Option<String>,

        /// Row store database (DuckDB file or ":memory:")
        #[arg(long)]
        database: Option<String>,

        /// First songplay id of the run
        #[arg(long)]
        key_base: Option<i64>,
    },

    /// Validate the configuration file
    Validate,

    /// Dry-run the `cluster` section against the in-memory provider
    Cluster {
        #[command(subcommand)]
        action: ClusterAction,
    },
}

/// Cluster lifecycle step
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterAction {
    /// Create the role, the cluster and the ingress rule
    Up,
    /// Delete the cluster and the role
    Down,
}

/// Sink selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SinkKind {
    /// Transactional row store
    RowStore,
    /// Partitioned Parquet files
    FileStore,
}
