//! Partitioned Parquet file store
//!
//! Rows are buffered for the whole run and written on [`Sink::finish`]. Each
//! relation is laid out Hive-style under `<root>/<relation>/`:
//!
//! ```text
//! songs/year=1969/artist_id=ARMJAGH1187FB546F3/part-00000.snappy.parquet
//! time/year=2018/month=11/part-00000.snappy.parquet
//! users/part-00000.snappy.parquet
//! users/_SUCCESS
//! ```
//!
//! Writing a relation replaces whatever was under its prefix, and `_SUCCESS`
//! is only written once every partition file of the relation is stored.

use super::{CommitGranularity, LoadStats, Sink, StarBatch};
use crate::config::FileStoreConfig;
use crate::error::{Error, Result};
use crate::output::{
    build_partitioned_path, encode_parquet, ArrowRows, CloudDestination, ParquetWriterConfig,
};
use crate::retry::RetryPolicy;
use arrow::array::UInt32Array;
use arrow::compute::take_record_batch;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Marker written after all partitions of a relation are stored
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// File store sink
pub struct FileStoreSink {
    dest: CloudDestination,
    writer: ParquetWriterConfig,
    max_concurrent_writes: usize,
    retry: RetryPolicy,
    pending: StarBatch,
}

impl FileStoreSink {
    /// Open the output root, creating it when local
    pub fn open(config: &FileStoreConfig, retry: RetryPolicy) -> Result<Self> {
        let dest = CloudDestination::parse(&config.output)?;
        info!("Opened file store {} ({})", config.output, dest.scheme());
        Ok(Self {
            dest,
            writer: ParquetWriterConfig::from(config),
            max_concurrent_writes: config.max_concurrent_writes.max(1),
            retry,
            pending: StarBatch::new("run"),
        })
    }

    /// Output destination
    pub fn destination(&self) -> &CloudDestination {
        &self.dest
    }

    /// Replace one relation's files with the given rows
    async fn write_relation<T: ArrowRows>(&self, rows: &[T]) -> Result<usize> {
        let relation = T::RELATION;
        let prefix = relation.name();

        // Encode before touching the destination so a bad batch leaves the
        // previous output in place
        let files = self.encode_partitions(rows)?;
        let partitions = files.len();

        let removed = self
            .retry
            .run(prefix, || self.dest.delete_prefix(prefix))
            .await?;
        if removed > 0 {
            debug!("Removed {} existing objects under {}/", removed, prefix);
        }

        let dest = &self.dest;
        let retry = &self.retry;
        futures::stream::iter(files.into_iter().map(move |(path, data)| async move {
            let path = path.as_str();
            retry.run(path, move || dest.write(path, data.clone())).await
        }))
        .buffer_unordered(self.max_concurrent_writes)
        .try_collect::<Vec<_>>()
        .await?;

        let marker = format!("{prefix}/{SUCCESS_MARKER}");
        retry
            .run(&marker, || dest.write(&marker, Bytes::new()))
            .await?;

        info!(
            "Wrote {} rows to {} in {} partition(s)",
            rows.len(),
            relation,
            partitions
        );
        Ok(rows.len())
    }

    /// Group rows by partition and encode one Parquet file per partition
    ///
    /// Partition columns are dropped from the files; their values live in
    /// the path.
    fn encode_partitions<T: ArrowRows>(&self, rows: &[T]) -> Result<Vec<(String, Bytes)>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let relation = T::RELATION;
        let columns = relation.partition_columns();

        let mut groups: BTreeMap<Vec<Option<String>>, Vec<u32>> = BTreeMap::new();
        for (index, row) in rows.iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| Error::output(format!("too many rows for {relation}")))?;
            groups.entry(row.partition_values()).or_default().push(index);
        }

        let batch = T::to_batch(rows)?;
        let schema = batch.schema();
        let data_columns: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !columns.contains(&field.name().as_str()))
            .map(|(i, _)| i)
            .collect();

        let file_name = format!("part-00000{}", self.writer.file_suffix());
        let mut files = Vec::with_capacity(groups.len());
        for (values, indices) in groups {
            let part = take_record_batch(&batch, &UInt32Array::from(indices))?;
            let part = part.project(&data_columns)?;

            let partition: Vec<(&str, Option<&str>)> = columns
                .iter()
                .copied()
                .zip(values.iter().map(Option::as_deref))
                .collect();
            let path = build_partitioned_path(relation.name(), &partition, &file_name);
            files.push((path, encode_parquet(&part, &self.writer)?));
        }

        Ok(files)
    }
}

#[async_trait]
impl Sink for FileStoreSink {
    fn name(&self) -> &str {
        "file_store"
    }

    fn granularity(&self) -> CommitGranularity {
        CommitGranularity::PerRun
    }

    async fn load(&mut self, batch: StarBatch) -> Result<LoadStats> {
        debug!("Buffered {} rows from {}", batch.row_counts().total(), batch.source);
        self.pending.extend(batch);
        Ok(LoadStats::default())
    }

    async fn finish(&mut self) -> Result<LoadStats> {
        let pending = std::mem::replace(&mut self.pending, StarBatch::new("run"));

        Ok(LoadStats {
            songs: self.write_relation(&pending.songs).await?,
            artists: self.write_relation(&pending.artists).await?,
            users: self.write_relation(&pending.users).await?,
            time: self.write_relation(&pending.time).await?,
            songplays: self.write_relation(&pending.songplays).await?,
        })
    }
}
