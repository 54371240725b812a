//! Append-only event log

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gitsplits_core::short_hash;

/// Event id: 16 hex chars hashed from the current time and fresh randomness
pub fn create_event_id() -> String {
    let seed = format!(
        "{}-{}-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        uuid::Uuid::new_v4(),
        std::process::id()
    );
    short_hash(seed.as_bytes(), 16)
}

/// A single telemetry record
///
/// Serialized as `{timestamp, type, ...fields}` on one line.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub event_type: String,
    pub fields: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn new(event_type: impl Into<String>, event_id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("eventId".to_string(), Value::String(event_id.to_string()));
        Self {
            event_type: event_type.into(),
            fields,
        }
    }

    /// Attach a field; values that fail to serialize are recorded as null
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn to_line(&self, timestamp: DateTime<Utc>) -> String {
        let mut record = Map::new();
        record.insert(
            "timestamp".to_string(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("type".to_string(), Value::String(self.event_type.clone()));
        for (key, value) in &self.fields {
            record.insert(key.clone(), value.clone());
        }
        Value::Object(record).to_string()
    }
}

/// Destination for serialized event lines
pub trait EventSink: Send + Sync {
    fn append(&self, line: &str) -> io::Result<()>;
}

/// Appends lines to an NDJSON file, creating parent directories on demand
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileSink {
    fn append(&self, line: &str) -> io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "telemetry lock poisoned"))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

/// Keeps lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Parsed records, oldest first
    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Parsed records of a given `type`
    pub fn records_of(&self, event_type: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r.get("type").and_then(Value::as_str) == Some(event_type))
            .collect()
    }
}

impl EventSink for MemorySink {
    fn append(&self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "telemetry lock poisoned"))?;
        lines.push(line.to_string());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn append(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// The telemetry recorder handed to the pipeline
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn EventSink>,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// NDJSON file at `path`
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileSink::new(path)))
    }

    /// In-memory recorder plus a handle for inspecting what was written
    pub fn memory() -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Self::new(sink.clone()), sink)
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Build from a configured path; `None` discards events
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::file(path),
            None => Self::disabled(),
        }
    }

    /// Append an event. Never fails; sink errors are logged and dropped.
    pub fn record(&self, event: TelemetryEvent) {
        let line = event.to_line(Utc::now());
        if let Err(e) = self.sink.append(&line) {
            tracing::warn!(
                event_type = %event.event_type,
                error = %e,
                "Failed to write telemetry event"
            );
        }
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn append(&self, _line: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_event_ids_are_short_hex_and_unique() {
        let a = create_event_id();
        let b = create_event_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_shape() {
        let (telemetry, sink) = Telemetry::memory();
        telemetry.record(
            TelemetryEvent::new("policy_block", "abc123")
                .with("intent", "pay")
                .with("reasons", vec!["Pay amount must be positive."]),
        );
        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record["timestamp"].is_string());
        assert_eq!(record["type"], "policy_block");
        assert_eq!(record["eventId"], "abc123");
        assert_eq!(record["reasons"][0], "Pay amount must be positive.");
        assert_eq!(sink.records_of("policy_block").len(), 1);
        assert!(sink.records_of("plan_created").is_empty());
    }

    #[test]
    fn test_file_sink_appends_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("agent-events.ndjson");
        let telemetry = Telemetry::file(&path);
        telemetry.record(TelemetryEvent::new("message_received", "e1").with("author", "alice"));
        telemetry.record(TelemetryEvent::new("intent_executed", "e1"));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["author"], "alice");
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "intent_executed");
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        let telemetry = Telemetry::new(Arc::new(BrokenSink));
        telemetry.record(TelemetryEvent::new("message_received", "e1"));
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let (telemetry, sink) = Telemetry::memory();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let telemetry = telemetry.clone();
                tokio::spawn(async move {
                    telemetry.record(TelemetryEvent::new("message_received", &format!("e{}", i)));
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(sink.lines().len(), 16);
    }
}
