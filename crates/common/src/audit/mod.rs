//! Append-only audit log of query and response decisions
//!
//! Every user turn produces exactly one `query` event followed by exactly
//! one `response` event. Events are written as one JSON object per line:
//!
//! ```text
//! {"ts":"2026-03-02T10:14:07+0530","host":"kiosk-3","type":"query","query":"...","blocked":false,"reason":"none","details":""}
//! {"ts":"2026-03-02T10:14:09+0530","host":"kiosk-3","type":"response","answer":"...","grounded":true,"docs":[{"source":"doc.pdf","page":2}],"refusal_type":"none"}
//! ```
//!
//! Writes are best effort. A failed write is reported through tracing and
//! metrics and never interrupts the pipeline.

use crate::config::AuditConfig;
use crate::errors::Result;
use crate::metrics;
use crate::models::Citation;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Why a response was replaced by a refusal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalType {
    /// The synthesized answer was returned
    None,
    /// The topic guard blocked the query
    CategoryBlock,
    /// No knowledge base has been ingested
    NoKb,
    /// Nothing relevant was retrieved, or the answer failed verification
    OosOrNotGrounded,
}

impl RefusalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefusalType::None => "none",
            RefusalType::CategoryBlock => "category_block",
            RefusalType::NoKb => "no_kb",
            RefusalType::OosOrNotGrounded => "oos_or_not_grounded",
        }
    }

    pub fn is_refusal(&self) -> bool {
        !matches!(self, RefusalType::None)
    }
}

/// Pipeline stage whose external collaborator failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Retrieval,
    Synthesis,
}

/// Infrastructure failure attached to a response event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: FailureStage,
    pub message: String,
}

/// Payload of a `query` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    pub blocked: bool,
    pub reason: String,
    pub details: String,
}

/// Payload of a `response` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub answer: String,
    pub grounded: bool,
    pub docs: Vec<Citation>,
    pub refusal_type: RefusalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

/// Event payload, tagged by event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditPayload {
    Query(QueryRecord),
    Response(ResponseRecord),
}

impl AuditPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            AuditPayload::Query(_) => "query",
            AuditPayload::Response(_) => "response",
        }
    }
}

/// A single audit log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Local time, e.g. `2026-03-02T10:14:07+0530`
    pub ts: String,

    /// Host that handled the query
    pub host: String,

    #[serde(flatten)]
    pub payload: AuditPayload,
}

impl AuditEvent {
    /// Stamp a payload with the current local time
    pub fn now(host: &str, payload: AuditPayload) -> Self {
        Self {
            ts: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string(),
            host: host.to_string(),
            payload,
        }
    }
}

/// Destination for audit events. Implementations must not panic or block
/// the caller on failure.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Appends events to a JSON-lines file held open for the life of the sink
pub struct JsonlAuditSink {
    path: PathBuf,
    // One write per line under the lock so concurrent sessions never interleave
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Create the sink, making sure the parent directory exists
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &AuditEvent) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(&line)
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.append(event) {
            metrics::record_audit_failure(event.payload.type_name());
            tracing::warn!(
                path = %self.path.display(),
                event_type = event.payload.type_name(),
                error = %e,
                "Failed to write audit event"
            );
        }
    }
}

/// Keeps events in memory, for tests and embedding hosts that ship
/// events elsewhere
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in write order
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

/// Stamps and records the two mandated event shapes
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    host: String,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, host: impl Into<String>) -> Self {
        Self {
            sink,
            host: host.into(),
        }
    }

    /// Build a file-backed logger from configuration
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        let sink = JsonlAuditSink::new(&config.path)?;
        let host = config.host_id.clone().unwrap_or_else(resolve_host_id);
        Ok(Self::new(Arc::new(sink), host))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn record(&self, payload: AuditPayload) {
        let event = AuditEvent::now(&self.host, payload);
        self.sink.record(&event);
    }

    pub fn log_query(&self, record: QueryRecord) {
        self.record(AuditPayload::Query(record));
    }

    pub fn log_response(&self, record: ResponseRecord) {
        self.record(AuditPayload::Response(record));
    }
}

/// Machine hostname, or "unknown" when it cannot be determined
pub fn resolve_host_id() -> String {
    let host = gethostname::gethostname().to_string_lossy().trim().to_string();
    if host.is_empty() {
        "unknown".to_string()
    } else {
        host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("docguard-audit-{}", uuid::Uuid::new_v4()))
            .join("events.jsonl")
    }

    #[test]
    fn test_refusal_type_wire_names() {
        let json = serde_json::to_string(&RefusalType::OosOrNotGrounded).unwrap();
        assert_eq!(json, "\"oos_or_not_grounded\"");
        assert_eq!(RefusalType::NoKb.as_str(), "no_kb");
        assert!(!RefusalType::None.is_refusal());
    }

    #[test]
    fn test_event_is_flat_json() {
        let event = AuditEvent::now(
            "host-a",
            AuditPayload::Query(QueryRecord {
                query: "Who should be the next prime minister?".into(),
                blocked: true,
                reason: "politics".into(),
                details: "prime minister".into(),
            }),
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "query");
        assert_eq!(value["host"], "host-a");
        assert_eq!(value["blocked"], true);
        assert_eq!(value["reason"], "politics");
        assert!(value["ts"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let path = temp_log_path();
        let logger = AuditLogger::new(Arc::new(JsonlAuditSink::new(&path).unwrap()), "host-b");

        logger.log_query(QueryRecord {
            query: "What is vaccine storage temperature?".into(),
            blocked: false,
            reason: "none".into(),
            details: String::new(),
        });
        logger.log_response(ResponseRecord {
            answer: "Between 2 and 8 degrees (source: doc.pdf p.2)".into(),
            grounded: true,
            docs: vec![Citation {
                source: "doc.pdf".into(),
                page: Some(2),
            }],
            refusal_type: RefusalType::None,
            failure: None,
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "query");
        assert_eq!(lines[1]["type"], "response");
        assert_eq!(lines[1]["refusal_type"], "none");
        assert_eq!(lines[1]["docs"][0]["page"], 2);
        assert!(lines[1].get("failure").is_none());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_unopenable_log_rejected_at_startup() {
        let dir = std::env::temp_dir().join(format!("docguard-audit-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        // A directory cannot be opened for appending
        assert!(JsonlAuditSink::new(&dir).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_concurrent_writers_keep_lines_whole() {
        let path = temp_log_path();
        let logger = AuditLogger::new(Arc::new(JsonlAuditSink::new(&path).unwrap()), "host-c");

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for turn in 0..25 {
                        logger.log_query(QueryRecord {
                            query: format!("worker {} turn {} {}", worker, turn, "x".repeat(512)),
                            blocked: false,
                            reason: "none".into(),
                            details: String::new(),
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<AuditEvent> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 200);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_sink_reopened_after_restart_appends() {
        let path = temp_log_path();
        let record = || QueryRecord {
            query: "hello".into(),
            blocked: false,
            reason: "none".into(),
            details: String::new(),
        };

        AuditLogger::new(Arc::new(JsonlAuditSink::new(&path).unwrap()), "host-e").log_query(record());
        AuditLogger::new(Arc::new(JsonlAuditSink::new(&path).unwrap()), "host-e").log_query(record());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_host_id_is_never_empty() {
        let host = resolve_host_id();
        assert!(!host.is_empty());
        assert_eq!(host, host.trim());
    }

    #[test]
    fn test_memory_sink_round_trips_payloads() {
        let sink = Arc::new(MemoryAuditSink::new());
        let logger = AuditLogger::new(sink.clone(), "host-d");
        logger.log_response(ResponseRecord {
            answer: "Please upload and ingest documents first.".into(),
            grounded: false,
            docs: vec![],
            refusal_type: RefusalType::NoKb,
            failure: None,
        });

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let line = serde_json::to_string(&events[0]).unwrap();
        let back: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, events[0]);
    }
}
