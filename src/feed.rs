//! Cursor-addressed change feed.
//!
//! An append-only, bounded log of structural change notifications.
//! Mutation operations publish row-level events; the external
//! filesystem watcher feeds disk-level events through the same
//! [`ChangeFeed::append`] entry point. Disconnected or polling clients
//! resynchronize with [`ChangeFeed::find_since`].
//!
//! Cursors are strictly increasing, assigned at append time, and never
//! reused. The buffer is bounded: once capacity is exceeded the oldest
//! event is evicted, so a client that polls too rarely can observe a
//! gap between its cursor and the oldest retained event. That gap means
//! "resync required", not an error.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Default retained-event capacity.
pub const DEFAULT_CAPACITY: usize = 5000;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A file or directory appeared on disk.
    Created,
    /// A file or directory disappeared from disk.
    Deleted,
    /// A file changed on disk outside the engine.
    Updated,
    /// A data row was inserted into a sheet.
    RowInserted,
    /// A data row was removed from a sheet.
    RowDeleted,
    /// A data row changed position inside a sheet.
    RowMoved,
    /// A single cell value changed.
    CellChanged,
}

/// One change notification.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub cursor: u64,
    pub kind: ChangeKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// A not-yet-appended event; the feed assigns cursor and timestamp.
#[derive(Debug, Clone)]
pub struct ChangeDraft {
    kind: ChangeKind,
    path: String,
    new_path: Option<String>,
    is_dir: bool,
    actor: Option<String>,
    data: Option<serde_json::Value>,
}

impl ChangeDraft {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            new_path: None,
            is_dir: false,
            actor: None,
            data: None,
        }
    }

    pub fn dir(mut self, is_dir: bool) -> Self {
        self.is_dir = is_dir;
        self
    }

    pub fn renamed_to(mut self, new_path: impl Into<String>) -> Self {
        self.new_path = Some(new_path.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attach a serializable payload (row indices, new cell value, ...).
    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// Result of a [`ChangeFeed::find_since`] poll: the newer events plus
/// the head cursor to resume from.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeBatch {
    pub events: Vec<ChangeEvent>,
    pub cursor: u64,
}

struct FeedInner {
    events: VecDeque<ChangeEvent>,
    head: u64,
}

/// Bounded, cursor-addressed change log. Safe for concurrent appenders
/// and readers.
pub struct ChangeFeed {
    capacity: usize,
    inner: Mutex<FeedInner>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(FeedInner {
                events: VecDeque::new(),
                head: 0,
            }),
        }
    }

    /// Append a bare event, the shape the filesystem watcher produces.
    pub fn append(
        &self,
        kind: ChangeKind,
        path: &str,
        new_path: Option<&str>,
        is_dir: bool,
    ) -> u64 {
        let mut draft = ChangeDraft::new(kind, path).dir(is_dir);
        if let Some(new_path) = new_path {
            draft = draft.renamed_to(new_path);
        }
        self.publish(draft)
    }

    /// Append a draft with actor/payload attached. Returns the assigned
    /// cursor.
    pub fn publish(&self, draft: ChangeDraft) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        inner.head += 1;
        let cursor = inner.head;

        inner.events.push_back(ChangeEvent {
            cursor,
            kind: draft.kind,
            path: draft.path,
            new_path: draft.new_path,
            is_dir: draft.is_dir,
            actor: draft.actor,
            data: draft.data,
            timestamp: Utc::now(),
        });

        if inner.events.len() > self.capacity {
            inner.events.pop_front();
        }

        cursor
    }

    /// Current head cursor.
    pub fn head(&self) -> u64 {
        self.inner.lock().unwrap().head
    }

    /// All retained events newer than `cursor`, plus the head cursor to
    /// resume polling from. Polling at or past the head returns an
    /// empty batch with the unchanged head.
    pub fn find_since(&self, cursor: u64) -> ChangeBatch {
        let inner = self.inner.lock().unwrap();

        if cursor >= inner.head {
            return ChangeBatch {
                events: Vec::new(),
                cursor: inner.head,
            };
        }

        let events = inner
            .events
            .iter()
            .filter(|event| event.cursor > cursor)
            .cloned()
            .collect();

        ChangeBatch {
            events,
            cursor: inner.head,
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
