//! Collaborator capabilities and dependency resolution.
//!
//! Handlers never construct their collaborators. They declare roles
//! ([`Dependency`]) and receive live instances through [`Dependencies`],
//! produced per call by the [`DependencyResolver`] from a [`ProviderSet`].
//!
//! Providers that hand out a process-wide singleton (a pooled HTTP client,
//! a shared store) do their own caching; the resolver simply calls the
//! provider on every resolution.

use crate::declaration::Dependency;
use crate::result::ToolError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Capability interfaces
// ============================================================================

/// Key-value document storage grouped into collections.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a document.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, ToolError>;

    /// Insert or replace a document.
    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), ToolError>;

    /// Documents whose top-level fields equal every entry of `filter`.
    /// An empty or non-object filter matches everything.
    async fn query(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, ToolError>;
}

/// AI inference service.
#[async_trait]
pub trait AiService: Send + Sync {
    /// Generate text for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ToolError>;

    /// Produce structured analysis of `input` following `instruction`.
    async fn analyze(&self, instruction: &str, input: &Value) -> Result<Value, ToolError>;
}

/// Outbound JSON-over-HTTP client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and decode the JSON body.
    async fn get_json(&self, url: &str) -> Result<Value, ToolError>;

    /// POST `body` as JSON to `url` and decode the JSON response.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ToolError>;
}

/// In-memory [`Store`]. Collections keep keys in sorted order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

fn matches_filter(doc: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(filter) => filter.iter().all(|(k, v)| doc.get(k) == Some(v)),
        None => true,
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, ToolError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), ToolError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn query(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, ToolError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|doc| matches_filter(doc, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Produces an instance of a capability, or a failure message.
pub type Provider<T> = Arc<dyn Fn() -> Result<Arc<T>, String> + Send + Sync>;

/// Role-keyed providers.
///
/// Used both as the resolver's defaults and as a per-call override set.
#[derive(Clone, Default)]
pub struct ProviderSet {
    store: Option<Provider<dyn Store>>,
    ai_service: Option<Provider<dyn AiService>>,
    http_client: Option<Provider<dyn HttpClient>>,
}

impl ProviderSet {
    /// No providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `store` provider.
    pub fn with_store<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Store>, String> + Send + Sync + 'static,
    {
        self.store = Some(Arc::new(provider));
        self
    }

    /// Register one shared `store` instance.
    pub fn with_store_instance(self, store: Arc<dyn Store>) -> Self {
        self.with_store(move || Ok(Arc::clone(&store)))
    }

    /// Register the `ai-service` provider.
    pub fn with_ai_service<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn AiService>, String> + Send + Sync + 'static,
    {
        self.ai_service = Some(Arc::new(provider));
        self
    }

    /// Register one shared `ai-service` instance.
    pub fn with_ai_service_instance(self, service: Arc<dyn AiService>) -> Self {
        self.with_ai_service(move || Ok(Arc::clone(&service)))
    }

    /// Register the `http-client` provider.
    pub fn with_http_client<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn HttpClient>, String> + Send + Sync + 'static,
    {
        self.http_client = Some(Arc::new(provider));
        self
    }

    /// Register one shared `http-client` instance.
    pub fn with_http_client_instance(self, client: Arc<dyn HttpClient>) -> Self {
        self.with_http_client(move || Ok(Arc::clone(&client)))
    }

    /// Whether a provider is registered for `role`.
    pub fn provides(&self, role: Dependency) -> bool {
        match role {
            Dependency::Store => self.store.is_some(),
            Dependency::AiService => self.ai_service.is_some(),
            Dependency::HttpClient => self.http_client.is_some(),
        }
    }

    /// Roles with a registered provider.
    pub fn roles(&self) -> Vec<Dependency> {
        Dependency::ALL
            .into_iter()
            .filter(|r| self.provides(*r))
            .collect()
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet")
            .field("roles", &self.roles())
            .finish()
    }
}

/// Per-resolution context.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    overrides: ProviderSet,
}

impl ResolveContext {
    /// Context with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Providers here supersede the defaults, role by role, for resolutions
    /// using this context only.
    pub fn with_overrides(overrides: ProviderSet) -> Self {
        Self { overrides }
    }
}

/// Dependency resolution failures. Both are configuration defects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No provider is registered for the role.
    #[error("unresolved dependency '{0}'")]
    Unresolved(Dependency),

    /// The provider failed to produce an instance.
    #[error("provider for '{role}' failed: {message}")]
    Provider {
        /// Role being resolved.
        role: Dependency,
        /// Provider's failure message.
        message: String,
    },
}

fn pick<T: ?Sized>(
    role: Dependency,
    over: &Option<Provider<T>>,
    default: &Option<Provider<T>>,
) -> Result<Arc<T>, ResolveError> {
    let provider = over
        .as_ref()
        .or(default.as_ref())
        .ok_or(ResolveError::Unresolved(role))?;
    provider().map_err(|message| ResolveError::Provider { role, message })
}

/// Resolves declared roles to live instances.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    defaults: ProviderSet,
}

impl DependencyResolver {
    /// Create a resolver with default providers.
    pub fn new(defaults: ProviderSet) -> Self {
        Self { defaults }
    }

    /// Default providers.
    pub fn defaults(&self) -> &ProviderSet {
        &self.defaults
    }

    /// Resolve every role in `roles`.
    ///
    /// Fails on the first role with no provider or a failing provider. Roles
    /// not listed are left empty even when a provider exists.
    pub fn resolve(
        &self,
        roles: &[Dependency],
        ctx: &ResolveContext,
    ) -> Result<Dependencies, ResolveError> {
        let mut deps = Dependencies::default();
        for &role in roles {
            match role {
                Dependency::Store => {
                    deps.store = Some(pick(role, &ctx.overrides.store, &self.defaults.store)?);
                }
                Dependency::AiService => {
                    deps.ai_service = Some(pick(
                        role,
                        &ctx.overrides.ai_service,
                        &self.defaults.ai_service,
                    )?);
                }
                Dependency::HttpClient => {
                    deps.http_client = Some(pick(
                        role,
                        &ctx.overrides.http_client,
                        &self.defaults.http_client,
                    )?);
                }
            }
        }
        Ok(deps)
    }
}

/// Collaborators resolved for one call.
#[derive(Clone, Default)]
pub struct Dependencies {
    store: Option<Arc<dyn Store>>,
    ai_service: Option<Arc<dyn AiService>>,
    http_client: Option<Arc<dyn HttpClient>>,
}

fn undeclared(role: Dependency) -> ToolError {
    ToolError::internal(format!(
        "handler used dependency '{role}' without declaring it"
    ))
}

impl Dependencies {
    /// The `store` collaborator.
    pub fn store(&self) -> Result<Arc<dyn Store>, ToolError> {
        self.store
            .clone()
            .ok_or_else(|| undeclared(Dependency::Store))
    }

    /// The `ai-service` collaborator.
    pub fn ai_service(&self) -> Result<Arc<dyn AiService>, ToolError> {
        self.ai_service
            .clone()
            .ok_or_else(|| undeclared(Dependency::AiService))
    }

    /// The `http-client` collaborator.
    pub fn http_client(&self) -> Result<Arc<dyn HttpClient>, ToolError> {
        self.http_client
            .clone()
            .ok_or_else(|| undeclared(Dependency::HttpClient))
    }

    /// Whether `role` was resolved.
    pub fn has(&self, role: Dependency) -> bool {
        match role {
            Dependency::Store => self.store.is_some(),
            Dependency::AiService => self.ai_service.is_some(),
            Dependency::HttpClient => self.http_client.is_some(),
        }
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved: Vec<_> = Dependency::ALL
            .into_iter()
            .filter(|r| self.has(*r))
            .collect();
        f.debug_struct("Dependencies")
            .field("resolved", &resolved)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::result::ErrorKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoAi(&'static str);

    #[async_trait]
    impl AiService for EchoAi {
        async fn generate(&self, prompt: &str) -> Result<String, ToolError> {
            Ok(format!("{}:{prompt}", self.0))
        }

        async fn analyze(&self, _instruction: &str, input: &Value) -> Result<Value, ToolError> {
            Ok(input.clone())
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_round_trip() {
        let store = InMemoryStore::new();
        store.put("items", "rice", json!({"kind": "grain"})).await.unwrap();
        store.put("items", "milk", json!({"kind": "dairy"})).await.unwrap();
        store.put("items", "oats", json!({"kind": "grain"})).await.unwrap();

        assert_eq!(
            store.get("items", "rice").await.unwrap(),
            Some(json!({"kind": "grain"}))
        );
        assert_eq!(store.get("items", "bread").await.unwrap(), None);
        assert_eq!(store.get("other", "rice").await.unwrap(), None);

        let grains = store.query("items", &json!({"kind": "grain"})).await.unwrap();
        assert_eq!(grains.len(), 2);
        assert_eq!(store.query("items", &json!({})).await.unwrap().len(), 3);
        assert!(store.query("nothing", &Value::Null).await.unwrap().is_empty());
        assert_eq!(store.len("items"), 3);
    }

    #[test]
    fn test_resolve_declared_roles_only() {
        let resolver = DependencyResolver::new(
            ProviderSet::new()
                .with_store_instance(Arc::new(InMemoryStore::new()))
                .with_ai_service_instance(Arc::new(EchoAi("default"))),
        );
        let deps = resolver
            .resolve(&[Dependency::Store], &ResolveContext::new())
            .unwrap();
        assert!(deps.has(Dependency::Store));
        assert!(!deps.has(Dependency::AiService));
        assert_eq!(
            deps.ai_service().err().unwrap().kind(),
            &ErrorKind::Internal
        );
    }

    #[test]
    fn test_missing_provider_is_unresolved() {
        let resolver = DependencyResolver::new(ProviderSet::new());
        let err = resolver
            .resolve(&[Dependency::HttpClient], &ResolveContext::new())
            .unwrap_err();
        assert_eq!(err, ResolveError::Unresolved(Dependency::HttpClient));
        assert_eq!(err.to_string(), "unresolved dependency 'http-client'");
    }

    #[test]
    fn test_failing_provider() {
        let resolver = DependencyResolver::new(
            ProviderSet::new().with_store(|| Err("pool exhausted".to_string())),
        );
        let err = resolver
            .resolve(&[Dependency::Store], &ResolveContext::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Provider { role: Dependency::Store, ref message } if message == "pool exhausted"
        ));
    }

    #[tokio::test]
    async fn test_override_supersedes_without_mutating_defaults() {
        let resolver = DependencyResolver::new(
            ProviderSet::new().with_ai_service_instance(Arc::new(EchoAi("default"))),
        );
        let ctx = ResolveContext::with_overrides(
            ProviderSet::new().with_ai_service_instance(Arc::new(EchoAi("fake"))),
        );

        let overridden = resolver.resolve(&[Dependency::AiService], &ctx).unwrap();
        assert_eq!(
            overridden.ai_service().unwrap().generate("hi").await.unwrap(),
            "fake:hi"
        );

        let plain = resolver
            .resolve(&[Dependency::AiService], &ResolveContext::new())
            .unwrap();
        assert_eq!(
            plain.ai_service().unwrap().generate("hi").await.unwrap(),
            "default:hi"
        );
    }

    #[test]
    fn test_override_can_supply_missing_role() {
        let resolver = DependencyResolver::new(ProviderSet::new());
        let ctx = ResolveContext::with_overrides(
            ProviderSet::new().with_store_instance(Arc::new(InMemoryStore::new())),
        );
        assert!(resolver.resolve(&[Dependency::Store], &ctx).is_ok());
    }

    #[test]
    fn test_provider_called_per_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let resolver = DependencyResolver::new(ProviderSet::new().with_store(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(InMemoryStore::new()) as Arc<dyn Store>)
        }));
        for _ in 0..3 {
            resolver
                .resolve(&[Dependency::Store], &ResolveContext::new())
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_singleton_instance_is_shared() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let resolver =
            DependencyResolver::new(ProviderSet::new().with_store_instance(Arc::clone(&store)));
        let a = resolver
            .resolve(&[Dependency::Store], &ResolveContext::new())
            .unwrap();
        let b = resolver
            .resolve(&[Dependency::Store], &ResolveContext::new())
            .unwrap();
        assert!(Arc::ptr_eq(&a.store().unwrap(), &b.store().unwrap()));
        assert!(Arc::ptr_eq(&a.store().unwrap(), &store));
    }

    #[test]
    fn test_provider_set_roles() {
        let set = ProviderSet::new().with_ai_service_instance(Arc::new(EchoAi("x")));
        assert_eq!(set.roles(), vec![Dependency::AiService]);
        assert!(format!("{set:?}").contains("AiService"));
    }
}
