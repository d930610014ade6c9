//! Tests for extract module

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use std::fs;

const CATALOG_MULTILINE: &str = r#"{
    "num_songs": 1,
    "artist_id": "ARJIE2Y1187B994AB7",
    "artist_latitude": null,
    "artist_longitude": null,
    "artist_location": "",
    "artist_name": "Line Renaud",
    "song_id": "SOUPIRU12A6D4FA1E1",
    "title": "Der Kleine Dompfaff",
    "duration": 152.92036,
    "year": 0
}
"#;

const EVENTS: &str = r#"{"artist":null,"auth":"Logged In","firstName":"Walter","gender":"M","itemInSession":0,"lastName":"Frye","length":null,"level":"free","location":"San Francisco-Oakland-Hayward, CA","method":"GET","page":"Home","registration":1540919166796.0,"sessionId":38,"song":null,"status":200,"ts":1541105830796,"userAgent":"Mozilla/5.0","userId":"39"}

{"artist":"Des'ree","auth":"Logged In","firstName":"Kaylee","gender":"F","itemInSession":1,"lastName":"Summers","length":246.30812,"level":"free","location":"Phoenix-Mesa-Scottsdale, AZ","method":"PUT","page":"NextSong","registration":1540344794796.0,"sessionId":139,"song":"You Gotta Be","status":200,"ts":1541106106796,"userAgent":"Mozilla/5.0","userId":"8"}
{"artist":null,"auth":"Logged Out","firstName":null,"gender":null,"itemInSession":0,"lastName":null,"length":null,"level":"free","location":null,"method":"GET","page":"Home","registration":null,"sessionId":52,"song":null,"status":200,"ts":1541107053796,"userAgent":null,"userId":""}
"#;

// ============================================================================
// Parser Tests
// ============================================================================

#[test]
fn test_parse_catalog_multiline() {
    let entry = parse_catalog("a.json", CATALOG_MULTILINE).unwrap();
    assert_eq!(entry.song_id.as_deref(), Some("SOUPIRU12A6D4FA1E1"));
    assert_eq!(entry.artist_name.as_deref(), Some("Line Renaud"));
    assert_eq!(entry.year, Some(0));
    assert_eq!(entry.artist_latitude, None);
}

#[test]
fn test_parse_catalog_single_line() {
    let line = r#"{"song_id": "SO1", "title": "T", "artist_id": "AR1", "duration": 1.5, "year": 1999}"#;
    let entry = parse_catalog("b.json", line).unwrap();
    assert_eq!(entry.song_id.as_deref(), Some("SO1"));
    assert_eq!(entry.duration, Some(1.5));
}

#[test]
fn test_parse_catalog_rejects_several_objects() {
    let body = "{\"song_id\": \"SO1\"}\n{\"song_id\": \"SO2\"}\n";
    let err = parse_catalog("c.json", body).unwrap_err();
    assert!(matches!(err, Error::Extract { ref path, .. } if path == "c.json"));
}

#[test]
fn test_parse_catalog_rejects_empty_and_malformed() {
    assert!(parse_catalog("d.json", "   \n").is_err());
    assert!(parse_catalog("e.json", "{\"song_id\": ").is_err());
    assert!(parse_catalog("f.json", "{\"song_id\": \"SO1\"} trailing").is_err());
}

#[test]
fn test_parse_events() {
    let events = parse_events("log.json", EVENTS).unwrap();
    assert_eq!(events.len(), 3);

    assert_eq!(events[0].user_id, Some(39));
    assert!(!events[0].is_song_play());

    assert!(events[1].is_song_play());
    assert_eq!(events[1].song.as_deref(), Some("You Gotta Be"));
    assert_eq!(events[1].item_in_session, Some(1));
    assert_eq!(
        events[1].start_time().unwrap().to_rfc3339(),
        "2018-11-01T21:01:46.796+00:00"
    );

    // Logged-out users have an empty user id
    assert_eq!(events[2].user_id, None);
}

#[test]
fn test_parse_events_numeric_user_id() {
    let line = r#"{"page":"NextSong","sessionId":1,"ts":0,"userId":26}"#;
    let events = parse_events("log.json", line).unwrap();
    assert_eq!(events[0].user_id, Some(26));
    assert_eq!(events[0].page, "NextSong");
}

#[test]
fn test_parse_events_bad_line_fails_file() {
    let body = format!("{EVENTS}{{not json}}\n");
    let err = parse_events("bad.json", &body).unwrap_err();
    match err {
        Error::Extract { path, message } => {
            assert_eq!(path, "bad.json");
            assert!(message.starts_with("line 5:"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_parse_events_missing_required_field() {
    let line = r#"{"page":"NextSong","ts":0}"#;
    assert!(parse_events("log.json", line).is_err());
}

// ============================================================================
// InputSource Tests
// ============================================================================

#[tokio::test]
async fn test_input_source_lists_recursively_sorted() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("A/B")).unwrap();
    fs::create_dir_all(root.join("A/.ipynb_checkpoints")).unwrap();
    fs::write(root.join("A/B/TRB.json"), CATALOG_MULTILINE).unwrap();
    fs::write(root.join("A/TRA.json"), CATALOG_MULTILINE).unwrap();
    fs::write(root.join("A/notes.txt"), "ignored").unwrap();
    fs::write(root.join("A/.ipynb_checkpoints/TRC.json"), "{}").unwrap();

    let source = InputSource::open(root.to_str().unwrap()).unwrap();
    let files = source.list("json").await.unwrap();
    assert_eq!(files, vec!["A/B/TRB.json", "A/TRA.json"]);

    let entry = source.read_catalog(&files[0]).await.unwrap();
    assert_eq!(entry.title.as_deref(), Some("Der Kleine Dompfaff"));
}

#[tokio::test]
async fn test_input_source_reads_events() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp_dir.path().join("2018/11")).unwrap();
    fs::write(temp_dir.path().join("2018/11/2018-11-01-events.json"), EVENTS).unwrap();

    let source = InputSource::open(temp_dir.path().to_str().unwrap()).unwrap();
    let files = source.list(".json").await.unwrap();
    assert_eq!(files, vec!["2018/11/2018-11-01-events.json"]);

    let events = source.read_events(&files[0]).await.unwrap();
    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn test_input_source_rejects_non_utf8() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("bin.json"), [0xff, 0xfe, 0x00]).unwrap();

    let source = InputSource::open(temp_dir.path().to_str().unwrap()).unwrap();
    let err = source.read_events("bin.json").await.unwrap_err();
    assert!(matches!(err, Error::Extract { .. }));
}

#[test]
fn test_input_source_missing_root() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("song_data");
    let err = InputSource::open(missing.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}
