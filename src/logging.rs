//! Deterministic logging and tracing for replay sessions
//!
//! Entries are collected in memory and stamped with event time rather than wall
//! time, so replaying the same log twice yields identical logs and traces.
//! Both buffers can be capped, keeping only the newest records.

use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use crate::types::Fingerprint;
use std::collections::VecDeque;

/// Append to `buffer`, evicting from the front once it holds `capacity` items
fn push_bounded<T>(buffer: &mut VecDeque<T>, capacity: Option<usize>, item: T) -> usize {
    buffer.push_back(item);
    match capacity {
        Some(capacity) if buffer.len() > capacity => {
            let excess = buffer.len() - capacity;
            buffer.drain(..excess);
            excess
        }
        _ => 0,
    }
}

/// Log level for deterministic logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level - detailed information
    Debug,
    /// Info level - general information
    Info,
    /// Warning level - potential issues
    Warn,
    /// Error level - errors that occurred
    Error,
}

/// A deterministic log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Timestamp of the event the entry refers to
    pub timestamp: DateTime<Utc>,
    pub trip_id: Option<String>,
    /// Event log cursor if applicable
    pub event_index: Option<usize>,
    pub message: String,
    /// Additional structured data
    pub metadata: Vec<(String, String)>,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(level: LogLevel, timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp,
            trip_id: None,
            event_index: None,
            message: message.into(),
            metadata: Vec::new(),
        }
    }

    /// Add trip context to the log entry
    pub fn with_trip(mut self, trip_id: impl Into<String>, index: usize) -> Self {
        self.trip_id = Some(trip_id.into());
        self.event_index = Some(index);
        self
    }

    /// Add metadata to the log entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Logger that collects entries without side effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLogger {
    entries: VecDeque<LogEntry>,
    min_level: LogLevel,
    /// Maximum retained entries, unbounded when `None`
    #[serde(default)]
    capacity: Option<usize>,
    /// Entries evicted to stay within `capacity`
    #[serde(default)]
    evicted: usize,
}

impl ReplayLogger {
    /// Create a new logger recording `min_level` and above
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            entries: VecDeque::new(),
            min_level,
            capacity: None,
            evicted: 0,
        }
    }

    /// Keep at most `capacity` of the newest entries
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        if let Some(capacity) = capacity {
            let excess = self.entries.len().saturating_sub(capacity);
            self.entries.drain(..excess);
            self.evicted += excess;
        }
        self
    }

    /// Create a logger that captures all levels
    pub fn all() -> Self {
        Self::new(LogLevel::Trace)
    }

    /// Create a logger that captures info and above
    pub fn with_info_level() -> Self {
        Self::new(LogLevel::Info)
    }

    /// Log an entry if it meets the minimum level
    pub fn log(&mut self, entry: LogEntry) {
        if entry.level >= self.min_level {
            self.evicted += push_bounded(&mut self.entries, self.capacity, entry);
        }
    }

    pub fn debug(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Debug, timestamp, message));
    }

    pub fn info(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, timestamp, message));
    }

    pub fn warn(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, timestamp, message));
    }

    pub fn error(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Error, timestamp, message));
    }

    /// Retained entries, oldest first
    pub fn entries(&self) -> &VecDeque<LogEntry> {
        &self.entries
    }

    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Filter entries by trip ID
    pub fn filter_by_trip(&self, trip_id: &str) -> Vec<&LogEntry> {
        self.entries.iter()
            .filter(|e| e.trip_id.as_deref() == Some(trip_id))
            .collect()
    }
}

impl Default for ReplayLogger {
    fn default() -> Self {
        Self::with_info_level()
    }
}

/// Ordered record of what a replay session did, for audits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayTraceLog {
    pub trip_id: String,
    /// Event time of the first event of the log
    pub start_time: DateTime<Utc>,
    /// Retained events, oldest first
    pub events: VecDeque<TraceEvent>,
    #[serde(default)]
    capacity: Option<usize>,
    #[serde(default)]
    evicted: usize,
}

/// An event in the replay trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: TraceEventType,
    /// Cursor after the event
    pub event_index: usize,
    /// Fingerprint of the event log, when known
    pub log_fingerprint: Option<Fingerprint>,
    /// Additional event data
    pub data: Vec<(String, String)>,
}

impl TraceEvent {
    pub fn new(event_type: TraceEventType, timestamp: DateTime<Utc>, event_index: usize) -> Self {
        Self {
            timestamp,
            event_type,
            event_index,
            log_fingerprint: None,
            data: Vec::new(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.log_fingerprint = Some(fingerprint);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }
}

/// Type of trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEventType {
    /// Session created with a fresh state
    SessionStarted,
    /// Cursor moved forward one event
    Advanced,
    /// Playback reached the last event and stopped
    Halted,
    /// Tracking wrapped back to the first event
    Looped,
    /// Session resumed from a stored state
    Rehydrated,
    /// A stored state was unusable and replaced
    RehydrationFailed,
    /// State written to the store
    Persisted,
}

impl ReplayTraceLog {
    /// Create a new trace for `trip_id`
    pub fn new(trip_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            trip_id: trip_id.into(),
            start_time,
            events: VecDeque::new(),
            capacity: None,
            evicted: 0,
        }
    }

    /// Keep at most `capacity` of the newest events
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        if let Some(capacity) = capacity {
            let excess = self.events.len().saturating_sub(capacity);
            self.events.drain(..excess);
            self.evicted += excess;
        }
        self
    }

    pub fn add_event(&mut self, event: TraceEvent) {
        self.evicted += push_bounded(&mut self.events, self.capacity, event);
    }

    /// Events dropped to stay within capacity
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events of a specific type
    pub fn events_by_type(&self, event_type: TraceEventType) -> Vec<&TraceEvent> {
        self.events.iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Count events of a specific type
    pub fn count(&self, event_type: TraceEventType) -> usize {
        self.events.iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}
