//! Tests for output module

use super::*;
use crate::config::{FileStoreConfig, ParquetCompression};
use crate::mapper::{ArtistRecord, SongRecord, SongplayRecord, TimeRecord, UserRecord};
use arrow::array::{Array, Int32Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::DataType;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
}

fn songplay(id: i64, ms: i64) -> SongplayRecord {
    SongplayRecord {
        songplay_id: id,
        start_time: at(ms),
        user_id: 15,
        level: "paid".to_string(),
        song_id: None,
        artist_id: None,
        session_id: 818,
        location: Some("Chicago".to_string()),
        user_agent: None,
    }
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_partition_columns_exist_in_schemas() {
    fn check<T: ArrowRows>() {
        let schema = T::schema();
        for column in T::RELATION.partition_columns() {
            assert!(
                schema.field_with_name(column).is_ok(),
                "{} is missing partition column {column}",
                T::RELATION
            );
        }
    }

    check::<SongRecord>();
    check::<ArtistRecord>();
    check::<UserRecord>();
    check::<TimeRecord>();
    check::<SongplayRecord>();
}

#[test]
fn test_song_batch_and_partition() {
    let rows = vec![SongRecord {
        song_id: "SOCIWDW12A8C13D406".to_string(),
        title: "Soul Deep".to_string(),
        artist_id: "ARMJAGH1187FB546F3".to_string(),
        year: 1969,
        duration: 148.03546,
    }];

    let batch = SongRecord::to_batch(&rows).unwrap();
    assert_eq!(batch.num_rows(), 1);
    assert_eq!(batch.num_columns(), 5);
    assert_eq!(
        rows[0].partition_values(),
        vec![
            Some("1969".to_string()),
            Some("ARMJAGH1187FB546F3".to_string())
        ]
    );
}

#[test]
fn test_artist_batch_keeps_nulls() {
    let rows = vec![ArtistRecord {
        artist_id: "AR1".to_string(),
        name: "Casual".to_string(),
        location: None,
        latitude: Some(1.5),
        longitude: None,
    }];

    let batch = ArtistRecord::to_batch(&rows).unwrap();
    let location = batch
        .column_by_name("location")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert!(location.is_null(0));
    assert!(rows[0].partition_values().is_empty());
}

#[test]
fn test_time_batch_uses_utc_timestamps() {
    let rows = vec![TimeRecord::from_start_time(at(1_541_903_636_796))];
    let batch = TimeRecord::to_batch(&rows).unwrap();

    let field = batch.schema().field_with_name("start_time").unwrap().clone();
    assert!(matches!(field.data_type(), DataType::Timestamp(_, Some(tz)) if tz.as_ref() == "UTC"));

    let ts = batch
        .column(0)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .unwrap();
    assert_eq!(ts.value(0), 1_541_903_636_796_000);

    let weekday = batch
        .column_by_name("weekday")
        .unwrap()
        .as_any()
        .downcast_ref::<Int32Array>()
        .unwrap();
    assert_eq!(weekday.value(0), 1);
}

#[test]
fn test_songplay_partition_from_start_time() {
    let row = songplay(0, 1_541_903_636_796);
    assert_eq!(
        row.partition_values(),
        vec![Some("2018".to_string()), Some("11".to_string())]
    );

    let batch = SongplayRecord::to_batch(&[row]).unwrap();
    let month = batch
        .column_by_name("month")
        .unwrap()
        .as_any()
        .downcast_ref::<Int32Array>()
        .unwrap();
    assert_eq!(month.value(0), 11);
    assert!(batch.column_by_name("song_id").unwrap().is_null(0));
}

#[test]
fn test_empty_batches() {
    assert_eq!(UserRecord::to_batch(&[]).unwrap().num_rows(), 0);
    assert_eq!(SongplayRecord::to_batch(&[]).unwrap().num_rows(), 0);
}

// ============================================================================
// Parquet Writer Tests
// ============================================================================

#[test]
fn test_parquet_writer_config() {
    let config = ParquetWriterConfig::default();
    assert_eq!(config.row_group_size(), 1024 * 1024);
    assert_eq!(config.file_suffix(), ".snappy.parquet");

    let config = ParquetWriterConfig::new()
        .with_compression(Compression::UNCOMPRESSED)
        .with_row_group_size(0);
    assert_eq!(config.row_group_size(), 1);
    assert_eq!(config.file_suffix(), ".parquet");

    let mut store = FileStoreConfig::new("/tmp/lake");
    store.compression = ParquetCompression::Zstd;
    store.row_group_size = 500;
    let config = ParquetWriterConfig::from(&store);
    assert_eq!(config.file_suffix(), ".zstd.parquet");
    assert_eq!(config.row_group_size(), 500);
}

#[test]
fn test_parquet_writer_to_file() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("songplays.parquet");
    let rows = vec![songplay(0, 1_000), songplay(1, 2_000)];
    let batch = SongplayRecord::to_batch(&rows).unwrap();

    let file = std::fs::File::create(&path).unwrap();
    let mut writer =
        ParquetWriter::new(file, SongplayRecord::schema(), &ParquetWriterConfig::default())
            .unwrap();
    writer.write(&batch).unwrap();
    assert_eq!(writer.rows_written(), 2);
    assert_eq!(writer.close().unwrap(), 2);

    let file = std::fs::File::open(&path).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let total: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(total, 2);
}

#[test]
fn test_encode_parquet_is_deterministic() {
    let rows = vec![songplay(0, 1_000), songplay(1, 2_000)];
    let batch = SongplayRecord::to_batch(&rows).unwrap();
    let config = ParquetWriterConfig::default();

    let first = encode_parquet(&batch, &config).unwrap();
    let second = encode_parquet(&batch, &config).unwrap();
    assert_eq!(first, second);

    let reader = ParquetRecordBatchReaderBuilder::try_new(first)
        .unwrap()
        .build()
        .unwrap();
    let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
    assert_eq!(batches[0].num_rows(), 2);
    assert_eq!(
        batches[0].schema().fields(),
        SongplayRecord::schema().fields()
    );
}
