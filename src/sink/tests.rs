//! Tests for sink module

use super::*;
use crate::config::{FileStoreConfig, RowStoreConfig};
use crate::mapper::{ArtistRecord, SongRecord, SongplayRecord, TimeRecord, UserRecord};
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
}

fn user(user_id: i64, level: &str) -> UserRecord {
    UserRecord {
        user_id,
        first_name: Some("Lily".to_string()),
        last_name: Some("Koch".to_string()),
        gender: Some("F".to_string()),
        level: level.to_string(),
    }
}

fn songplay(songplay_id: i64, ms: i64, song_id: Option<&str>) -> SongplayRecord {
    SongplayRecord {
        songplay_id,
        start_time: at(ms),
        user_id: 15,
        level: "paid".to_string(),
        song_id: song_id.map(str::to_string),
        artist_id: song_id.map(|_| "ARMJAGH1187FB546F3".to_string()),
        session_id: 818,
        location: Some("Chicago-Naperville-Elgin, IL-IN-WI".to_string()),
        user_agent: None,
    }
}

fn sample_batch() -> StarBatch {
    // 2018-11-11 and 2018-12-01
    let november = 1_541_903_636_796;
    let december = 1_543_622_400_000;

    StarBatch {
        source: "sample".to_string(),
        songs: vec![
            SongRecord {
                song_id: "SOCIWDW12A8C13D406".to_string(),
                title: "Soul Deep".to_string(),
                artist_id: "ARMJAGH1187FB546F3".to_string(),
                year: 1969,
                duration: 148.03546,
            },
            SongRecord {
                song_id: "SOMZWCG12A8C13C480".to_string(),
                title: "I Didn't Mean To".to_string(),
                artist_id: "ARD7TVE1187B99BFB1".to_string(),
                year: 0,
                duration: 218.93179,
            },
        ],
        artists: vec![ArtistRecord {
            artist_id: "ARMJAGH1187FB546F3".to_string(),
            name: "The Box Tops".to_string(),
            location: Some("Memphis, TN".to_string()),
            latitude: Some(35.14968),
            longitude: Some(-90.04892),
        }],
        users: vec![user(15, "free")],
        time: vec![
            TimeRecord::from_start_time(at(november)),
            TimeRecord::from_start_time(at(december)),
        ],
        songplays: vec![
            songplay(0, november, Some("SOCIWDW12A8C13D406")),
            songplay(1, december, None),
        ],
    }
}

// ============================================================================
// Batch and Stats Tests
// ============================================================================

#[test]
fn test_load_stats_arithmetic() {
    let a = LoadStats {
        songs: 1,
        artists: 2,
        users: 3,
        time: 4,
        songplays: 5,
    };
    let mut b = a + a;
    assert_eq!(b.total(), 30);
    b += LoadStats::default();
    assert_eq!(b.get(Relation::Time), 8);

    b.set(Relation::Users, 0);
    assert_eq!(b.users, 0);
}

#[test]
fn test_star_batch_counts_and_extend() {
    let mut batch = StarBatch::new("a.json");
    assert!(batch.is_empty());

    batch.extend(sample_batch());
    let counts = batch.row_counts();
    assert_eq!(counts.songs, 2);
    assert_eq!(counts.songplays, 2);
    assert_eq!(batch.source, "a.json");
    assert!(!batch.is_empty());
}

#[test]
fn test_open_sink_selects_backend() {
    let temp_dir = tempdir().unwrap();

    let mut config = EtlConfig::default();
    config.sink = SinkConfig::RowStore(RowStoreConfig {
        database: temp_dir.path().join("db/sparkify.duckdb").display().to_string(),
        ..RowStoreConfig::default()
    });
    let sink = open_sink(&config).unwrap();
    assert_eq!(sink.name(), "row_store");
    assert_eq!(sink.granularity(), CommitGranularity::PerFile);

    config.sink = SinkConfig::FileStore(FileStoreConfig::new(
        temp_dir.path().join("lake").display().to_string(),
    ));
    let sink = open_sink(&config).unwrap();
    assert_eq!(sink.name(), "file_store");
    assert_eq!(sink.granularity(), CommitGranularity::PerRun);
}

// ============================================================================
// Row Store Tests
// ============================================================================

#[tokio::test]
async fn test_row_store_loads_all_relations() {
    let mut sink = RowStoreSink::in_memory(RetryPolicy::none()).unwrap();
    let stats = sink.load(sample_batch()).await.unwrap();

    assert_eq!(stats, sample_batch().row_counts());
    assert_eq!(sink.count(Relation::Songs).unwrap(), 2);
    assert_eq!(sink.count(Relation::Artists).unwrap(), 1);
    assert_eq!(sink.count(Relation::Users).unwrap(), 1);
    assert_eq!(sink.count(Relation::Time).unwrap(), 2);
    assert_eq!(sink.count(Relation::Songplays).unwrap(), 2);
    assert_eq!(sink.finish().await.unwrap(), LoadStats::default());
}

#[tokio::test]
async fn test_row_store_reload_is_idempotent() {
    let mut sink = RowStoreSink::in_memory(RetryPolicy::none()).unwrap();
    sink.load(sample_batch()).await.unwrap();
    let second = sink.load(sample_batch()).await.unwrap();

    // Dimensions are left alone; songplays are rewritten in place
    assert_eq!(second.songs, 0);
    assert_eq!(second.time, 0);
    assert_eq!(second.songplays, 2);
    for relation in Relation::ALL {
        assert_eq!(
            sink.count(relation).unwrap(),
            i64::try_from(sample_batch().row_counts().get(relation)).unwrap(),
            "{relation}"
        );
    }
}

#[tokio::test]
async fn test_row_store_user_level_last_wins() {
    let mut sink = RowStoreSink::in_memory(RetryPolicy::none()).unwrap();

    let mut first = StarBatch::new("first.json");
    first.users.push(user(15, "free"));
    sink.load(first).await.unwrap();

    let mut second = StarBatch::new("second.json");
    second.users.push(user(15, "paid"));
    sink.load(second).await.unwrap();

    let level: String = sink
        .connection()
        .query_row("SELECT level FROM users WHERE user_id = 15", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(level, "paid");
    assert_eq!(sink.count(Relation::Users).unwrap(), 1);
}

#[tokio::test]
async fn test_row_store_keeps_unmatched_songplays() {
    let mut sink = RowStoreSink::in_memory(RetryPolicy::none()).unwrap();
    sink.load(sample_batch()).await.unwrap();

    let unmatched: i64 = sink
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM songplays WHERE song_id IS NULL AND artist_id IS NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(unmatched, 1);

    let weekday: i32 = sink
        .connection()
        .query_row(
            "SELECT weekday FROM \"time\" WHERE start_time = TIMESTAMP '2018-11-11 02:33:56.796'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(weekday, 1);
}

#[tokio::test]
async fn test_row_store_persists_to_file() {
    let temp_dir = tempdir().unwrap();
    let config = RowStoreConfig {
        database: temp_dir.path().join("sparkify.duckdb").display().to_string(),
        ..RowStoreConfig::default()
    };

    {
        let mut sink = RowStoreSink::open(&config, RetryPolicy::none()).unwrap();
        sink.load(sample_batch()).await.unwrap();
    }

    let sink = RowStoreSink::open(&config, RetryPolicy::none()).unwrap();
    assert_eq!(sink.count(Relation::Songplays).unwrap(), 2);
}

#[tokio::test]
async fn test_row_store_replaces_shifted_songplays() {
    let mut sink = RowStoreSink::in_memory(RetryPolicy::none()).unwrap();

    let mut first = StarBatch::new("a.json");
    first.songplays = vec![songplay(0, 1_000, None)];
    let mut third = StarBatch::new("c.json");
    third.songplays = vec![songplay(1, 3_000, None), songplay(2, 3_500, None)];
    sink.load(first.clone()).await.unwrap();
    sink.load(third.clone()).await.unwrap();

    // b.json now parses, so c.json's plays move up by one
    let mut second = StarBatch::new("b.json");
    second.songplays = vec![songplay(1, 2_000, None)];
    third.songplays = vec![songplay(2, 3_000, None), songplay(3, 3_500, None)];
    for batch in [first, second, third] {
        sink.load(batch).await.unwrap();
    }

    let rows: Vec<(i64, i64, String)> = sink
        .connection()
        .prepare("SELECT songplay_id, epoch_ms(start_time), source_file FROM songplays ORDER BY 1")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(|row| row.unwrap())
        .collect();
    assert_eq!(
        rows,
        vec![
            (0, 1_000, "a.json".to_string()),
            (1, 2_000, "b.json".to_string()),
            (2, 3_000, "c.json".to_string()),
            (3, 3_500, "c.json".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_row_store_empty_batch_clears_source_songplays() {
    let mut sink = RowStoreSink::in_memory(RetryPolicy::none()).unwrap();
    let mut batch = StarBatch::new("a.json");
    batch.songplays = vec![songplay(0, 1_000, None)];
    sink.load(batch).await.unwrap();

    let stats = sink.load(StarBatch::new("a.json")).await.unwrap();
    assert_eq!(stats.total(), 0);
    assert_eq!(sink.count(Relation::Songplays).unwrap(), 0);
}

#[tokio::test]
async fn test_row_store_skips_empty_batch() {
    let mut sink = RowStoreSink::in_memory(RetryPolicy::none()).unwrap();
    let stats = sink.load(StarBatch::new("empty.json")).await.unwrap();
    assert_eq!(stats.total(), 0);
}

// ============================================================================
// File Store Tests
// ============================================================================

async fn list_lake(sink: &FileStoreSink) -> Vec<String> {
    sink.destination().list("").await.unwrap()
}

#[tokio::test]
async fn test_file_store_layout() {
    let temp_dir = tempdir().unwrap();
    let config = FileStoreConfig::new(temp_dir.path().display().to_string());
    let mut sink = FileStoreSink::open(&config, RetryPolicy::none()).unwrap();

    assert_eq!(sink.load(sample_batch()).await.unwrap().total(), 0);
    let stats = sink.finish().await.unwrap();
    assert_eq!(stats, sample_batch().row_counts());

    let files = list_lake(&sink).await;
    assert_eq!(
        files,
        vec![
            "artists/_SUCCESS",
            "artists/part-00000.snappy.parquet",
            "songplays/_SUCCESS",
            "songplays/year=2018/month=11/part-00000.snappy.parquet",
            "songplays/year=2018/month=12/part-00000.snappy.parquet",
            "songs/_SUCCESS",
            "songs/year=0/artist_id=ARD7TVE1187B99BFB1/part-00000.snappy.parquet",
            "songs/year=1969/artist_id=ARMJAGH1187FB546F3/part-00000.snappy.parquet",
            "time/_SUCCESS",
            "time/year=2018/month=11/part-00000.snappy.parquet",
            "time/year=2018/month=12/part-00000.snappy.parquet",
            "users/_SUCCESS",
            "users/part-00000.snappy.parquet",
        ]
    );
}

#[tokio::test]
async fn test_file_store_drops_partition_columns() {
    let temp_dir = tempdir().unwrap();
    let config = FileStoreConfig::new(temp_dir.path().display().to_string());
    let mut sink = FileStoreSink::open(&config, RetryPolicy::none()).unwrap();
    sink.load(sample_batch()).await.unwrap();
    sink.finish().await.unwrap();

    let data = sink
        .destination()
        .read("songs/year=1969/artist_id=ARMJAGH1187FB546F3/part-00000.snappy.parquet")
        .await
        .unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(data).unwrap();
    let names: Vec<String> = reader
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, vec!["song_id", "title", "duration"]);
}

#[tokio::test]
async fn test_file_store_overwrites_on_rerun() {
    let temp_dir = tempdir().unwrap();
    let config = FileStoreConfig::new(temp_dir.path().display().to_string());

    let mut sink = FileStoreSink::open(&config, RetryPolicy::none()).unwrap();
    sink.load(sample_batch()).await.unwrap();
    sink.finish().await.unwrap();
    let path = "users/part-00000.snappy.parquet";
    let first = sink.destination().read(path).await.unwrap();

    // A stale partition left behind by an older run must disappear
    sink.destination()
        .write("time/year=1999/month=1/part-00000.snappy.parquet", bytes::Bytes::from_static(b"x"))
        .await
        .unwrap();

    let mut rerun = FileStoreSink::open(&config, RetryPolicy::none()).unwrap();
    rerun.load(sample_batch()).await.unwrap();
    rerun.finish().await.unwrap();

    assert_eq!(rerun.destination().read(path).await.unwrap(), first);
    let files = list_lake(&rerun).await;
    assert!(!files.iter().any(|f| f.contains("year=1999")));
    assert_eq!(files.len(), 13);
}

#[tokio::test]
async fn test_file_store_empty_relation_gets_marker_only() {
    let temp_dir = tempdir().unwrap();
    let config = FileStoreConfig::new(temp_dir.path().display().to_string());
    let mut sink = FileStoreSink::open(&config, RetryPolicy::none()).unwrap();

    let stats = sink.finish().await.unwrap();
    assert_eq!(stats.total(), 0);
    assert_eq!(
        list_lake(&sink).await,
        vec![
            "artists/_SUCCESS",
            "songplays/_SUCCESS",
            "songs/_SUCCESS",
            "time/_SUCCESS",
            "users/_SUCCESS",
        ]
    );
}
