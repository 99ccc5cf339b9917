//! Caller-facing results and the handler error type.
//!
//! Every dispatch ends in a [`ToolResult`]: either a success envelope holding
//! the handler's data, or an error envelope with a stable kind string, a safe
//! message and a retry classification. Internal detail carried by a
//! [`ToolError`] is logged and never serialized.

use larder_resilience::CircuitError;
use rmcp::model::{CallToolResult, Content};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Message shown to callers in place of internal failure detail.
const INTERNAL_MESSAGE: &str = "internal error";

/// Classification of a failed dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorKind {
    /// No operation with the requested name.
    UnknownOperation,
    /// The caller's role may not invoke the operation.
    PermissionDenied,
    /// Admission was denied by a rate limiter.
    RateLimited,
    /// Arguments do not match the operation's schema.
    InvalidArguments,
    /// Configuration defect or unexpected handler failure.
    Internal,
    /// An upstream dependency's circuit breaker is open.
    CircuitOpen,
    /// The handler exceeded its time budget.
    Timeout,
    /// Handler-defined kind such as `not_found` or `conflict`.
    Domain(String),
}

impl ErrorKind {
    /// Wire string for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::UnknownOperation => "unknown_operation",
            Self::PermissionDenied => "permission_denied",
            Self::RateLimited => "rate_limited",
            Self::InvalidArguments => "invalid_arguments",
            Self::Internal => "internal",
            Self::CircuitOpen => "circuit_open",
            Self::Timeout => "timeout",
            Self::Domain(kind) => kind,
        }
    }

    /// Whether a caller may retry the same request later.
    ///
    /// Only admission and breaker denials qualify; everything else needs a
    /// corrected request or an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::CircuitOpen)
    }
}

impl From<String> for ErrorKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "unknown_operation" => Self::UnknownOperation,
            "permission_denied" => Self::PermissionDenied,
            "rate_limited" => Self::RateLimited,
            "invalid_arguments" => Self::InvalidArguments,
            "internal" => Self::Internal,
            "circuit_open" => Self::CircuitOpen,
            "timeout" => Self::Timeout,
            _ => Self::Domain(s),
        }
    }
}

impl From<ErrorKind> for String {
    fn from(kind: ErrorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by handlers and by each dispatch stage.
#[derive(Debug, Clone)]
pub struct ToolError {
    kind: ErrorKind,
    message: String,
    detail: Option<String>,
    retry_after: Option<Duration>,
    fields: Vec<String>,
}

impl ToolError {
    /// A handler-defined error. `message` is shown to the caller as is.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::from(kind.into()), message)
    }

    fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            retry_after: None,
            fields: Vec::new(),
        }
    }

    /// The requested entity does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    /// The request conflicts with current state.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Unknown operation name.
    pub fn unknown_operation(name: &str) -> Self {
        Self::with_kind(
            ErrorKind::UnknownOperation,
            format!("unknown operation '{name}'"),
        )
    }

    /// The caller's role is insufficient.
    pub fn permission_denied(name: &str) -> Self {
        Self::with_kind(
            ErrorKind::PermissionDenied,
            format!("operation '{name}' requires an authenticated caller"),
        )
    }

    /// Rate limit exceeded.
    pub fn rate_limited(retry_after: Duration) -> Self {
        let mut err = Self::with_kind(ErrorKind::RateLimited, "rate limit exceeded");
        err.retry_after = Some(retry_after);
        err
    }

    /// Arguments failed validation. `fields` names every offending field.
    pub fn invalid_arguments(fields: Vec<String>, message: impl Into<String>) -> Self {
        let mut err = Self::with_kind(ErrorKind::InvalidArguments, message);
        err.fields = fields;
        err
    }

    /// An internal failure. `detail` is logged, never shown.
    pub fn internal(detail: impl Into<String>) -> Self {
        let mut err = Self::with_kind(ErrorKind::Internal, INTERNAL_MESSAGE);
        err.detail = Some(detail.into());
        err
    }

    /// An upstream breaker rejected the call.
    pub fn circuit_open(key: &str, retry_after: Duration) -> Self {
        let mut err = Self::with_kind(
            ErrorKind::CircuitOpen,
            format!("dependency '{key}' is temporarily unavailable"),
        );
        err.retry_after = Some(retry_after);
        err
    }

    /// The handler ran out of time.
    pub fn timeout(limit: Duration) -> Self {
        Self::with_kind(
            ErrorKind::Timeout,
            format!("operation timed out after {}ms", limit.as_millis()),
        )
    }

    /// Error kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Caller-safe message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Internal detail, for logs only.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Retry hint for retryable kinds.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Offending argument fields.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether a caller may retry.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(format!("serialization: {e}"))
    }
}

impl<E: Into<ToolError>> From<CircuitError<E>> for ToolError {
    fn from(e: CircuitError<E>) -> Self {
        match e {
            CircuitError::Open { key, retry_after } => Self::circuit_open(&key, retry_after),
            CircuitError::Inner(inner) => inner.into(),
        }
    }
}

/// Caller-visible error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error kind string.
    pub kind: ErrorKind,
    /// Safe, human-readable message.
    pub message: String,
    /// Whether the caller may retry.
    pub retryable: bool,
    /// Retry hint in milliseconds, present for retryable kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// Offending argument fields, for `invalid_arguments`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl From<&ToolError> for ErrorEnvelope {
    fn from(err: &ToolError) -> Self {
        Self {
            kind: err.kind.clone(),
            message: err.message.clone(),
            retryable: err.is_retryable(),
            // Round up so a sub-millisecond hint never reads as "retry now".
            retry_after_ms: err
                .retry_after
                .map(|d| d.as_micros().div_ceil(1000).max(1) as u64),
            fields: err.fields.clone(),
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    /// The handler returned data.
    Success {
        /// Handler output.
        data: Value,
    },
    /// The dispatch failed.
    Error {
        /// Normalized error.
        error: ErrorEnvelope,
    },
}

impl ToolResult {
    /// Wrap handler output.
    pub fn success(data: Value) -> Self {
        Self::Success { data }
    }

    /// Normalize an error.
    pub fn failure(err: &ToolError) -> Self {
        Self::Error {
            error: ErrorEnvelope::from(err),
        }
    }

    /// Returns `true` on success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Handler output, if successful.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => Some(data),
            Self::Error { .. } => None,
        }
    }

    /// Error envelope, if failed.
    pub fn error(&self) -> Option<&ErrorEnvelope> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error } => Some(error),
        }
    }

    /// Error kind, if failed.
    pub fn error_kind(&self) -> Option<&ErrorKind> {
        self.error().map(|e| &e.kind)
    }

    /// Convert to an MCP `CallToolResult`.
    ///
    /// Success carries the data as pretty JSON text; failure carries the
    /// error envelope and sets `is_error`.
    pub fn into_call_tool_result(self) -> CallToolResult {
        match self {
            Self::Success { data } => {
                let text = match data {
                    Value::String(s) => s,
                    other => serde_json::to_string_pretty(&other).unwrap_or_default(),
                };
                CallToolResult::success(vec![Content::text(text)])
            }
            Self::Error { error } => {
                let text = serde_json::to_string(&error).unwrap_or_default();
                CallToolResult::error(vec![Content::text(text)])
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
