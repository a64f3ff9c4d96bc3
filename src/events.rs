use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_MESSAGE_CHARS: usize = 200;

/// Severity of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Request,
    Success,
    Error,
    Info,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventLevel::Request => "request",
            EventLevel::Success => "success",
            EventLevel::Error => "error",
            EventLevel::Info => "info",
        };
        f.write_str(s)
    }
}

/// A single operator-visible diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: EventLevel,
    pub endpoint: String,
    pub message: String,
}

/// Bounded diagnostic log, newest entry first
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn record(&self, level: EventLevel, endpoint: &str, message: impl fmt::Display) {
        let entry = LogEntry {
            time: Utc::now(),
            level,
            endpoint: endpoint.to_string(),
            message: message.to_string().chars().take(MAX_MESSAGE_CHARS).collect(),
        };

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    pub fn request(&self, endpoint: &str, message: impl fmt::Display) {
        self.record(EventLevel::Request, endpoint, message);
    }

    pub fn success(&self, endpoint: &str, message: impl fmt::Display) {
        self.record(EventLevel::Success, endpoint, message);
    }

    pub fn error(&self, endpoint: &str, message: impl fmt::Display) {
        self.record(EventLevel::Error, endpoint, message);
    }

    pub fn info(&self, endpoint: &str, message: impl fmt::Display) {
        self.record(EventLevel::Info, endpoint, message);
    }

    /// Copy of the current entries, newest first
    pub fn snapshot(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(300)
    }
}
