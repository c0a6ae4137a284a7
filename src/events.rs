//! Bounded, timestamped activity feed.
//!
//! The engine records alerts and lifecycle transitions here so a host UI can
//! show a running log panel without subscribing to anything; `recent()`
//! hands out a snapshot. Oldest entries are dropped past the cap.

use std::collections::VecDeque;

use parking_lot::Mutex;

const DEFAULT_CAPACITY: usize = 200;

/// In-memory ring of formatted activity lines.
pub struct EventLog {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Append a line, stamped with the local wall-clock time.
    pub fn push(&self, message: impl AsRef<str>) {
        let line = format!(
            "{}  {}",
            chrono::Local::now().format("%H:%M:%S"),
            message.as_ref()
        );
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(line);
    }

    /// Snapshot of the current lines, oldest first.
    pub fn recent(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
