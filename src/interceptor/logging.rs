use crate::common::{ErrorPayload, ErrorResponse, RequestContext};
use chrono::{DateTime, Utc};

/// One server error worth recording.
#[derive(Debug, Clone)]
pub struct ServerErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub output: ErrorPayload,
    pub path: String,
    pub method: String,
    pub payload: Option<String>,
    pub stack: Option<String>,
}

impl ServerErrorRecord {
    pub fn new(error: &ErrorResponse, request: &RequestContext) -> Self {
        Self {
            timestamp: Utc::now(),
            output: error.payload.clone(),
            path: request.path.clone(),
            method: request.method.to_string(),
            payload: request.payload_text(),
            stack: error.debug_stack.clone(),
        }
    }
}

/// Sink for server error records.
pub trait ServerErrorLog: Send + Sync + 'static {
    fn record(&self, record: &ServerErrorRecord);
}

/// Emits each record as a single `tracing` error event.
#[derive(Clone, Default)]
pub struct TracingErrorLog;

impl ServerErrorLog for TracingErrorLog {
    fn record(&self, record: &ServerErrorRecord) {
        tracing::error!(
            target: "friendly_errors",
            timestamp = %record.timestamp.to_rfc3339(),
            status_code = record.output.status_code,
            path = %record.path,
            method = %record.method,
            payload = record.payload.as_deref(),
            stack = record.stack.as_deref(),
            output = ?record.output,
            "server error: {}",
            record.output.message
        );
    }
}
