//! Output module
//!
//! Arrow and Parquet plumbing for the file-store sink.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Converting star schema rows to Arrow RecordBatches
//! - Encoding Parquet files
//! - Object storage access (S3, R2, GCS, Azure, local)

pub(crate) mod cloud;
mod schema;
mod writer;

pub use cloud::{build_partitioned_path, escape_partition_value, CloudDestination};
pub use schema::ArrowRows;
pub use writer::{encode_parquet, ParquetWriter, ParquetWriterConfig};

#[cfg(test)]
mod tests;
