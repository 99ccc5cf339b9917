//! Observability sink.
//!
//! The dispatcher emits exactly one [`ExecutionRecord`] per dispatch, whatever
//! the outcome. Sinks are fire-and-forget: a panicking sink is contained by
//! the dispatcher and never affects the caller's result.

use crate::result::ErrorKind;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Terminal status of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Handler returned data.
    Ok,
    /// The dispatch produced an error envelope.
    Error,
    /// The dispatch future was dropped before finishing.
    Cancelled,
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Error => f.write_str("error"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What happened during one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    /// Requested operation name.
    pub operation: String,
    /// Caller id.
    pub caller_id: String,
    /// Wall time from dispatch start to finish.
    pub duration: Duration,
    /// Terminal status.
    pub status: DispatchStatus,
    /// Error kind for failed dispatches.
    pub error_kind: Option<ErrorKind>,
}

/// Receives one record per dispatch.
pub trait ObservabilitySink: Send + Sync {
    /// Record a finished dispatch.
    fn record(&self, record: &ExecutionRecord);
}

/// Writes records through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ObservabilitySink for LogSink {
    fn record(&self, r: &ExecutionRecord) {
        match &r.error_kind {
            Some(kind) => log::info!(
                "dispatch op={} caller={} status={} kind={} duration_ms={}",
                r.operation,
                r.caller_id,
                r.status,
                kind,
                r.duration.as_millis()
            ),
            None => log::info!(
                "dispatch op={} caller={} status={} duration_ms={}",
                r.operation,
                r.caller_id,
                r.status,
                r.duration.as_millis()
            ),
        }
    }
}

/// Discards records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn record(&self, _record: &ExecutionRecord) {}
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().clone()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl ObservabilitySink for MemorySink {
    fn record(&self, record: &ExecutionRecord) {
        self.records.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: DispatchStatus) -> ExecutionRecord {
        ExecutionRecord {
            operation: "pantry.items.list".into(),
            caller_id: "alice".into(),
            duration: Duration::from_millis(12),
            status,
            error_kind: None,
        }
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.record(&record(DispatchStatus::Ok));
        sink.record(&record(DispatchStatus::Error));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[1].status, DispatchStatus::Error);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_log_and_noop_sinks_accept_records() {
        let mut r = record(DispatchStatus::Error);
        r.error_kind = Some(ErrorKind::Timeout);
        LogSink.record(&r);
        NoopSink.record(&r);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DispatchStatus::Ok.to_string(), "ok");
        assert_eq!(DispatchStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_record_serializes() {
        let mut r = record(DispatchStatus::Error);
        r.error_kind = Some(ErrorKind::RateLimited);
        let json = serde_json::to_value(&r).unwrap_or_default();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_kind"], "rate_limited");
        assert_eq!(json["caller_id"], "alice");
    }
}
