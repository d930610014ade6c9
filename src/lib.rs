// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Sparkify ETL
//!
//! Loads a music streaming service's song catalog and listening-event logs
//! into a star schema: a `songplays` fact table with `users`, `songs`,
//! `artists` and `time` dimensions.
//!
//! ## Features
//!
//! - **Extraction**: Line-delimited JSON from local paths or object storage
//! - **Deterministic mapping**: Deduplicated dimensions, ordered and keyed facts
//! - **Row store sink**: DuckDB (or Postgres through DuckDB) with idempotent reloads
//! - **File store sink**: Partitioned Parquet with overwrite semantics
//! - **Cluster provisioning**: Idempotent create and teardown behind a provider trait
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sparkify_etl::{EtlConfig, Pipeline, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = EtlConfig::from_file("sparkify.yaml")?;
//!     let mut pipeline = Pipeline::from_config(config)?;
//!     let stats = pipeline.run().await?;
//!     println!("{} songplays", stats.rows.songplays);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Extract    │──▶│    Mapper    │──▶│     Keys     │──▶│     Sink     │
//! │ catalog/logs │   │ dims + facts │   │ songplay_id  │   │ rows / files │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the ETL
pub mod error;

/// Common types and type aliases
pub mod types;

/// Template interpolation for config files
pub mod template;

/// Run configuration
pub mod config;

/// Catalog and event log extraction
pub mod extract;

/// Star-schema projections
pub mod mapper;

/// Songplay ordering and surrogate keys
pub mod keys;

/// Retry with backoff
pub mod retry;

/// Arrow/Parquet output
pub mod output;

/// Load targets
pub mod sink;

/// Run driver
pub mod pipeline;

/// Warehouse cluster provisioning
pub mod cluster;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::EtlConfig;
pub use pipeline::{Pipeline, RunStats};
pub use sink::{open_sink, Sink, StarBatch};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
