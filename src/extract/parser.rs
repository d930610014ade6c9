//! File parsers for catalog and event-log files

use super::types::{CatalogEntry, LogEvent};
use crate::error::{Error, Result};

/// Parse a catalog file holding exactly one JSON object
///
/// The object may span several lines or sit on a single line; anything
/// after it other than whitespace is an error.
pub fn parse_catalog(path: &str, body: &str) -> Result<CatalogEntry> {
    let mut stream = serde_json::Deserializer::from_str(body).into_iter::<CatalogEntry>();

    let entry = match stream.next() {
        Some(Ok(entry)) => entry,
        Some(Err(e)) => return Err(Error::extract(path, format!("invalid catalog JSON: {e}"))),
        None => return Err(Error::extract(path, "empty catalog file")),
    };

    match stream.next() {
        None => Ok(entry),
        Some(Ok(_)) => Err(Error::extract(
            path,
            "expected a single catalog object, found several",
        )),
        Some(Err(e)) => Err(Error::extract(
            path,
            format!("trailing data after catalog object: {e}"),
        )),
    }
}

/// Parse an event log file holding one JSON object per line
///
/// Blank lines are skipped. One bad line fails the whole file.
pub fn parse_events(path: &str, body: &str) -> Result<Vec<LogEvent>> {
    let mut events = Vec::new();

    for (line_num, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: LogEvent = serde_json::from_str(line)
            .map_err(|e| Error::extract(path, format!("line {}: {e}", line_num + 1)))?;
        events.push(event);
    }

    Ok(events)
}
