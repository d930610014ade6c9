//! Arrow schemas for the star schema relations
//!
//! Each record type knows its Arrow schema, how to turn a slice of rows into
//! a RecordBatch, and which Hive partition it belongs to.

use crate::error::Result;
use crate::mapper::{ArtistRecord, SongRecord, SongplayRecord, TimeRecord, UserRecord};
use crate::types::Relation;
use arrow::array::{
    ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;

/// Rows that can be written as Arrow data
pub trait ArrowRows: Sized {
    /// The relation these rows belong to
    const RELATION: Relation;

    /// Arrow schema, including partition columns
    fn schema() -> SchemaRef;

    /// Convert rows to a RecordBatch with [`ArrowRows::schema`]
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;

    /// Values of the relation's partition columns, in
    /// [`Relation::partition_columns`] order
    fn partition_values(&self) -> Vec<Option<String>>;
}

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

fn timestamps<'a>(values: impl Iterator<Item = &'a DateTime<Utc>>) -> ArrayRef {
    let micros: Vec<i64> = values.map(|t| t.timestamp_micros()).collect();
    Arc::new(TimestampMicrosecondArray::from(micros).with_timezone("UTC"))
}

fn strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

fn int32s(values: impl Iterator<Item = i32>) -> ArrayRef {
    Arc::new(Int32Array::from_iter_values(values))
}

fn small(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// ============================================================================
// Songs
// ============================================================================

impl ArrowRows for SongRecord {
    const RELATION: Relation = Relation::Songs;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("duration", DataType::Float64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            strings(rows.iter().map(|r| Some(r.song_id.as_str()))),
            strings(rows.iter().map(|r| Some(r.title.as_str()))),
            strings(rows.iter().map(|r| Some(r.artist_id.as_str()))),
            int32s(rows.iter().map(|r| r.year)),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.duration))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![Some(self.year.to_string()), Some(self.artist_id.clone())]
    }
}

// ============================================================================
// Artists
// ============================================================================

impl ArrowRows for ArtistRecord {
    const RELATION: Relation = Relation::Artists;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("location", DataType::Utf8, true),
            Field::new("latitude", DataType::Float64, true),
            Field::new("longitude", DataType::Float64, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            strings(rows.iter().map(|r| Some(r.artist_id.as_str()))),
            strings(rows.iter().map(|r| Some(r.name.as_str()))),
            strings(rows.iter().map(|r| r.location.as_deref())),
            Arc::new(rows.iter().map(|r| r.latitude).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.longitude).collect::<Float64Array>()),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        Vec::new()
    }
}

// ============================================================================
// Users
// ============================================================================

impl ArrowRows for UserRecord {
    const RELATION: Relation = Relation::Users;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Int64, false),
            Field::new("first_name", DataType::Utf8, true),
            Field::new("last_name", DataType::Utf8, true),
            Field::new("gender", DataType::Utf8, true),
            Field::new("level", DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.user_id))),
            strings(rows.iter().map(|r| r.first_name.as_deref())),
            strings(rows.iter().map(|r| r.last_name.as_deref())),
            strings(rows.iter().map(|r| r.gender.as_deref())),
            strings(rows.iter().map(|r| Some(r.level.as_str()))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        Vec::new()
    }
}

// ============================================================================
// Time
// ============================================================================

impl ArrowRows for TimeRecord {
    const RELATION: Relation = Relation::Time;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("start_time", timestamp_type(), false),
            Field::new("hour", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("week", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("weekday", DataType::Int32, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            timestamps(rows.iter().map(|r| &r.start_time)),
            int32s(rows.iter().map(|r| small(r.hour))),
            int32s(rows.iter().map(|r| small(r.day))),
            int32s(rows.iter().map(|r| small(r.week))),
            int32s(rows.iter().map(|r| small(r.month))),
            int32s(rows.iter().map(|r| r.year)),
            int32s(rows.iter().map(|r| small(r.weekday))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![Some(self.year.to_string()), Some(self.month.to_string())]
    }
}

// ============================================================================
// Songplays
// ============================================================================

impl ArrowRows for SongplayRecord {
    const RELATION: Relation = Relation::Songplays;

    /// Carries `year` and `month` of `start_time` so the fact table can be
    /// partitioned like the time dimension.
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("songplay_id", DataType::Int64, false),
            Field::new("start_time", timestamp_type(), false),
            Field::new("user_id", DataType::Int64, false),
            Field::new("level", DataType::Utf8, false),
            Field::new("song_id", DataType::Utf8, true),
            Field::new("artist_id", DataType::Utf8, true),
            Field::new("session_id", DataType::Int64, false),
            Field::new("location", DataType::Utf8, true),
            Field::new("user_agent", DataType::Utf8, true),
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.songplay_id))),
            timestamps(rows.iter().map(|r| &r.start_time)),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.user_id))),
            strings(rows.iter().map(|r| Some(r.level.as_str()))),
            strings(rows.iter().map(|r| r.song_id.as_deref())),
            strings(rows.iter().map(|r| r.artist_id.as_deref())),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.session_id))),
            strings(rows.iter().map(|r| r.location.as_deref())),
            strings(rows.iter().map(|r| r.user_agent.as_deref())),
            int32s(rows.iter().map(|r| r.start_time.year())),
            int32s(rows.iter().map(|r| small(r.start_time.month()))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.start_time.year().to_string()),
            Some(self.start_time.month().to_string()),
        ]
    }
}
