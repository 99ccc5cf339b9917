//! Dispatch pipeline.
//!
//! [`Dispatcher::dispatch`] runs one request through a fixed sequence of
//! stages, stopping at the first failure:
//!
//! 1. lookup in the [`Registry`]
//! 2. permission check against the caller's role
//! 3. rate limit admission
//! 4. argument validation against the declared schema
//! 5. dependency resolution
//! 6. handler invocation under a timeout
//! 7. normalization into a [`ToolResult`]
//! 8. one [`ExecutionRecord`] to the observability sink
//!
//! Stage 8 runs from a drop guard so a record is written even when the
//! dispatch future itself is cancelled. The dispatcher never retries.

use crate::catalog::OperationDescriptor;
use crate::declaration::ToolCall;
use crate::deps::{DependencyResolver, ProviderSet, ResolveContext};
use crate::observe::{DispatchStatus, ExecutionRecord, LogSink, ObservabilitySink};
use crate::registry::Registry;
use crate::result::{ErrorKind, ToolError, ToolResult};
use futures::FutureExt;
use larder_core::CallerIdentity;
use larder_resilience::{Admission, RateLimiter};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default ceiling for one handler invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// The dispatch pipeline. Cheap to share behind an `Arc`.
pub struct Dispatcher {
    registry: Arc<Registry>,
    resolver: DependencyResolver,
    limiter: Option<Arc<RateLimiter>>,
    sink: Arc<dyn ObservabilitySink>,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with default providers, no rate limiting, a
    /// [`LogSink`] and [`DEFAULT_TIMEOUT`].
    pub fn new(registry: impl Into<Arc<Registry>>, providers: ProviderSet) -> Self {
        Self {
            registry: registry.into(),
            resolver: DependencyResolver::new(providers),
            limiter: None,
            sink: Arc::new(LogSink),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Enforce `limiter` at stage 3.
    pub fn with_rate_limiter(mut self, limiter: impl Into<Arc<RateLimiter>>) -> Self {
        self.limiter = Some(limiter.into());
        self
    }

    /// Send execution records to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Default handler timeout. Declarations may override it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The protocol rate limiter, if any.
    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    /// Catalog of registered operations in registration order.
    pub fn list_operations(&self) -> Vec<OperationDescriptor> {
        self.registry
            .list()
            .iter()
            .map(|d| OperationDescriptor::from(d.as_ref()))
            .collect()
    }

    /// Dispatch with the default providers.
    pub async fn dispatch(&self, name: &str, args: Value, caller: &CallerIdentity) -> ToolResult {
        self.dispatch_with(name, args, caller, &ResolveContext::default())
            .await
    }

    /// Dispatch, resolving dependencies through `ctx`.
    pub async fn dispatch_with(
        &self,
        name: &str,
        args: Value,
        caller: &CallerIdentity,
        ctx: &ResolveContext,
    ) -> ToolResult {
        let mut guard = RecordGuard::new(self.sink.as_ref(), name, &caller.id);

        let result = match self.run(name, args, caller, ctx).await {
            Ok(data) => ToolResult::success(data),
            Err(err) => {
                report(name, caller, &err);
                ToolResult::failure(&err)
            }
        };

        guard.finish(&result);
        result
    }

    async fn run(
        &self,
        name: &str,
        args: Value,
        caller: &CallerIdentity,
        ctx: &ResolveContext,
    ) -> Result<Value, ToolError> {
        // 1. lookup
        let decl = self
            .registry
            .lookup(name)
            .map_err(|_| ToolError::unknown_operation(name))?;

        // 2. permission
        if !decl.permission().allows(caller.role) {
            return Err(ToolError::permission_denied(name));
        }

        // 3. rate limit
        if let Some(limiter) = &self.limiter
            && let Admission::Denied { retry_after } = limiter.admit(&caller.id, name)
        {
            return Err(ToolError::rate_limited(retry_after));
        }

        // 4. arguments
        let arguments = decl.schema().validate(args)?;

        // 5. dependencies
        let deps = self
            .resolver
            .resolve(decl.dependencies(), ctx)
            .map_err(|e| ToolError::internal(e.to_string()))?;

        // 6. invocation
        let call = ToolCall {
            arguments,
            deps,
            caller: caller.clone(),
        };
        let limit = decl.timeout().unwrap_or(self.timeout);
        let invocation = std::panic::catch_unwind(AssertUnwindSafe(|| decl.invoke(call)))
            .map_err(|panic| ToolError::internal(panic_message(panic.as_ref())))?;

        match tokio::time::timeout(limit, AssertUnwindSafe(invocation).catch_unwind()).await {
            Err(_) => Err(ToolError::timeout(limit)),
            Ok(Err(panic)) => Err(ToolError::internal(panic_message(panic.as_ref()))),
            Ok(Ok(outcome)) => outcome,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.registry.len())
            .field("providers", self.resolver.defaults())
            .field("rate_limited", &self.limiter.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let msg = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("handler panicked: {msg}")
}

fn report(name: &str, caller: &CallerIdentity, err: &ToolError) {
    match err.kind() {
        ErrorKind::Internal => log::error!(
            "tool '{name}' failed for {caller}: {}",
            err.detail().unwrap_or(err.message())
        ),
        ErrorKind::Timeout | ErrorKind::CircuitOpen => {
            log::warn!("tool '{name}' failed for {caller}: {err}")
        }
        _ => log::debug!("tool '{name}' rejected for {caller}: {err}"),
    }
}

/// Emits the execution record exactly once, on finish or on drop.
struct RecordGuard<'a> {
    sink: &'a dyn ObservabilitySink,
    operation: &'a str,
    caller_id: &'a str,
    started: Instant,
    done: bool,
}

impl<'a> RecordGuard<'a> {
    fn new(sink: &'a dyn ObservabilitySink, operation: &'a str, caller_id: &'a str) -> Self {
        Self {
            sink,
            operation,
            caller_id,
            started: Instant::now(),
            done: false,
        }
    }

    fn finish(&mut self, result: &ToolResult) {
        let (status, kind) = match result.error_kind() {
            None => (DispatchStatus::Ok, None),
            Some(kind) => (DispatchStatus::Error, Some(kind.clone())),
        };
        self.emit(status, kind);
    }

    fn emit(&mut self, status: DispatchStatus, error_kind: Option<ErrorKind>) {
        if self.done {
            return;
        }
        self.done = true;
        let record = ExecutionRecord {
            operation: self.operation.to_string(),
            caller_id: self.caller_id.to_string(),
            duration: self.started.elapsed(),
            status,
            error_kind,
        };
        let sink = self.sink;
        if std::panic::catch_unwind(AssertUnwindSafe(|| sink.record(&record))).is_err() {
            log::error!(
                "observability sink panicked while recording '{}'",
                record.operation
            );
        }
    }
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        self.emit(DispatchStatus::Cancelled, None);
    }
}

// ============================================================================
// Tests
// ============================================================================
