//! Bounded, newest-first log of what happened in a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Entries kept before the oldest is dropped.
pub const ACTIVITY_CAPACITY: usize = 20;

/// One timestamped log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// When the entry was recorded.
    pub at: DateTime<Utc>,
    /// Human-readable description.
    pub message: String,
}

/// Ring of recent activity, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    /// Creates a log holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a message at the current time.
    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push_front(ActivityEntry {
            at: Utc::now(),
            message: message.into(),
        });
        self.entries.truncate(self.capacity);
    }

    /// Iterates entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.entries.front()
    }
}
