//! Append-only JSON array log
//!
//! The sensor log is a JSON array written incrementally: `[` when the log is
//! created, one object per reading separated by commas, and `]` on clean
//! shutdown. A reader may look at the file while the simulator is still
//! writing, so a missing closing bracket, a trailing comma, or a half-written
//! final object all mean "more data may arrive" rather than corruption.

use crate::error::TelemetryError;
use crate::model::SensorReading;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Incremental writer for the JSON array framing
pub struct JsonArrayWriter<W: Write> {
    inner: W,
    records: usize,
    finished: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Write the opening bracket
    pub fn new(mut inner: W) -> std::io::Result<Self> {
        inner.write_all(b"[\n")?;
        inner.flush()?;
        Ok(Self {
            inner,
            records: 0,
            finished: false,
        })
    }

    /// Append one record and flush, so readers only ever see whole lines
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), TelemetryError> {
        let json = serde_json::to_string(record)?;
        if self.records > 0 {
            self.inner.write_all(b",\n")?;
        }
        self.inner.write_all(b"  ")?;
        self.inner.write_all(json.as_bytes())?;
        self.inner.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Close the array. Idempotent.
    pub fn finish(&mut self) -> std::io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.inner.write_all(b"\n]\n")?;
        self.inner.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Result of tolerant log parsing
#[derive(Debug)]
pub struct ParsedLog<T> {
    /// Records that parsed, in file order
    pub entries: Vec<T>,
    /// Records that were skipped, for logging
    pub skipped: Vec<TelemetryError>,
    /// Whether the closing bracket was present
    pub complete: bool,
}

impl<T> Default for ParsedLog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            skipped: Vec::new(),
            complete: false,
        }
    }
}

/// Parse a (possibly still growing) JSON array log
///
/// Never fails as a whole: bad records are collected in `skipped` and
/// parsing resumes at the next record boundary.
pub fn parse_log<T: DeserializeOwned>(content: &str) -> ParsedLog<T> {
    let mut parsed = ParsedLog::default();
    let trimmed = content.trim_start();
    let mut rest = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let mut index = 0;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        if rest.starts_with(']') {
            parsed.complete = true;
            break;
        }

        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
        match stream.next() {
            Some(Ok(value)) => {
                rest = &rest[stream.byte_offset()..];
                match serde_json::from_value::<T>(value) {
                    Ok(entry) => parsed.entries.push(entry),
                    Err(e) => parsed.skipped.push(TelemetryError::MalformedLogEntry {
                        index,
                        reason: e.to_string(),
                    }),
                }
            }
            // Half-written tail: the writer has not finished this record yet
            Some(Err(e)) if e.is_eof() => break,
            Some(Err(e)) => {
                parsed.skipped.push(TelemetryError::MalformedLogEntry {
                    index,
                    reason: e.to_string(),
                });
                match next_record_start(rest) {
                    Some(offset) => rest = &rest[offset..],
                    None => break,
                }
            }
            None => break,
        }
        index += 1;
    }

    parsed
}

/// Offset of the next `,` that is followed by an object start
fn next_record_start(s: &str) -> Option<usize> {
    s.char_indices()
        .filter(|(_, c)| *c == ',')
        .map(|(i, _)| i)
        .find(|&i| s[i + 1..].trim_start().starts_with('{'))
}

/// Load sensor readings from a log file on disk
pub fn load_readings(path: &Path) -> Result<ParsedLog<SensorReading>, TelemetryError> {
    let content = std::fs::read_to_string(path)?;
    let parsed = parse_log::<SensorReading>(&content);
    for skipped in &parsed.skipped {
        tracing::warn!(path = %path.display(), "{}", skipped);
    }
    Ok(parsed)
}
