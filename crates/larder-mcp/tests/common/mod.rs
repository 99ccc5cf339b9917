//! Common test utilities and harness for Larder integration tests.

use async_trait::async_trait;
use larder_mcp::{
    AiService, ArgKind, ArgumentSchema, Dependency, Dispatcher, InMemoryStore, MemorySink,
    ProviderSet, RegistryBuilder, ToolCall, ToolDeclaration, ToolError,
};
use larder_resilience::{CircuitBreakers, RateLimitConfig, RateLimiter};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// AI service fake whose failures can be toggled.
#[derive(Default)]
pub struct FlakyAi {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyAi {
    /// A healthy fake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls that actually reached the service.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiService for FlakyAi {
    async fn generate(&self, prompt: &str) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ToolError::internal("inference backend returned 503"));
        }
        Ok(format!("summary of {prompt}"))
    }

    async fn analyze(&self, _instruction: &str, input: &Value) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(input.clone())
    }
}

/// Test harness wiring a dispatcher with in-memory collaborators.
pub struct TestHarness {
    /// Shared store.
    pub store: Arc<InMemoryStore>,
    /// AI fake.
    pub ai: Arc<FlakyAi>,
    /// Breakers used by the AI-backed tool.
    pub breakers: Arc<CircuitBreakers>,
    /// Captured execution records.
    pub sink: Arc<MemorySink>,
    /// Times the write handler ran.
    pub writes: Arc<AtomicUsize>,
}

impl TestHarness {
    /// Creates a harness whose `ai` breaker trips after 3 consecutive failures
    /// and cools down for 30 seconds.
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            ai: Arc::new(FlakyAi::new()),
            breakers: Arc::new(CircuitBreakers::new(
                larder_resilience::BreakerConfig::consecutive(
                    3,
                    std::time::Duration::from_secs(30),
                ),
            )),
            sink: Arc::new(MemorySink::new()),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Registry with:
    /// - `a`: read, no dependencies
    /// - `b`: write, depends on `store`
    /// - `x`: read, no dependencies
    /// - `nutrition.ai.summarize`: read, depends on `ai-service`, calls it
    ///   through the `ai` breaker
    pub fn registry(&self) -> RegistryBuilder {
        let mut builder = RegistryBuilder::new();

        builder
            .register(
                ToolDeclaration::builder("a")
                    .description("read-only tool")
                    .handler(|_| async { Ok(json!("a-ok")) })
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let writes = Arc::clone(&self.writes);
        builder
            .register(
                ToolDeclaration::builder("b")
                    .description("writes an item")
                    .schema(ArgumentSchema::new().required("name", ArgKind::String, "Item name"))
                    .write()
                    .depends_on(Dependency::Store)
                    .handler(move |call: ToolCall| {
                        let writes = Arc::clone(&writes);
                        async move {
                            writes.fetch_add(1, Ordering::SeqCst);
                            let name: String = call.required_arg("name")?;
                            call.deps
                                .store()?
                                .put("items", &name, json!({"owner": call.caller.id.clone()}))
                                .await?;
                            Ok(json!({"stored": name}))
                        }
                    })
                    .build()
                    .unwrap(),
            )
            .unwrap();

        builder
            .register(
                ToolDeclaration::builder("x")
                    .handler(|_| async { Ok(Value::Null) })
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let breakers = Arc::clone(&self.breakers);
        builder
            .register(
                ToolDeclaration::builder("nutrition.ai.summarize")
                    .schema(ArgumentSchema::new().required("text", ArgKind::String, ""))
                    .depends_on(Dependency::AiService)
                    .handler(move |call: ToolCall| {
                        let breakers = Arc::clone(&breakers);
                        async move {
                            let text: String = call.required_arg("text")?;
                            let ai = call.deps.ai_service()?;
                            let summary = breakers.call("ai", || ai.generate(&text)).await?;
                            Ok(json!(summary))
                        }
                    })
                    .build()
                    .unwrap(),
            )
            .unwrap();

        builder
    }

    /// Default providers: the shared store and the AI fake.
    pub fn providers(&self) -> ProviderSet {
        ProviderSet::new()
            .with_store_instance(self.store.clone())
            .with_ai_service_instance(self.ai.clone())
    }

    /// Dispatcher without rate limiting.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.registry().build(), self.providers()).with_sink(self.sink.clone())
    }

    /// Dispatcher with a protocol-level limiter.
    pub fn dispatcher_with_limit(&self, config: RateLimitConfig) -> Dispatcher {
        self.dispatcher()
            .with_rate_limiter(RateLimiter::new(config))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
