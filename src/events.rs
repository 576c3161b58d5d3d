//! Change event export for external integrations.
//!
//! Events drained from the change feed are emitted as JSON lines to
//! stdout or a configured file, so wrappers and bots can follow what a
//! CLI invocation did without parsing human output.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::feed::ChangeEvent;

pub const EVENT_SCHEMA_VERSION: &str = "sheetsync.event.v1";

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: &'static str,
    #[serde(flatten)]
    event: &'a ChangeEvent,
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Emit events to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &ChangeEvent) -> Result<()> {
        let envelope = Envelope {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
        };
        let serialized = serde_json::to_vec(&envelope)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }

    /// Write a batch of events.
    pub fn emit_all(&mut self, events: &[ChangeEvent]) -> Result<()> {
        for event in events {
            self.emit(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ChangeFeed, ChangeKind};

    #[test]
    fn destination_parse() {
        assert!(EventDestination::parse(None).is_none());
        assert!(EventDestination::parse(Some("  ")).is_none());
        assert!(matches!(
            EventDestination::parse(Some("-")),
            Some(EventDestination::Stdout)
        ));
        assert!(matches!(
            EventDestination::parse(Some("events.jsonl")),
            Some(EventDestination::File(_))
        ));
    }

    #[test]
    fn file_sink_appends_jsonl() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");

        let feed = ChangeFeed::default();
        feed.append(ChangeKind::Created, "/a.csv", None, false);
        feed.append(ChangeKind::RowDeleted, "/a.csv", None, false);
        let batch = feed.find_since(0);

        let mut sink = EventSink::file(&path).unwrap();
        sink.emit_all(&batch.events).unwrap();
        drop(sink);

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["schema_version"], EVENT_SCHEMA_VERSION);
        assert_eq!(first["cursor"], 1);
        assert_eq!(first["kind"], "created");
    }
}
