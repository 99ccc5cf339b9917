//! Transport-facing entry point.
//!
//! A [`Gateway`] sits between an outer transport (stdio, HTTP) and the
//! [`Dispatcher`]. Per request it resolves the caller from raw credentials,
//! applies the transport-level rate limit and then dispatches.
//!
//! The transport and protocol limiters are independent. The transport
//! limiter counts every authenticated request once, in a single per-caller
//! bucket, before the protocol limiter is consulted. A transport denial
//! never reaches the dispatcher, so it never touches protocol counters; a
//! protocol denial never charges the transport limiter a second time.

use crate::dispatch::Dispatcher;
use crate::error::McpErrorExt;
use crate::result::{ToolError, ToolResult};
use larder_auth::{AuthError, Credentials, IdentityResolver};
use larder_resilience::{Admission, BucketScope, GLOBAL_BUCKET, RateLimitConfig, RateLimiter};
use rmcp::model::{CallToolResult, ErrorData};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Credentials → identity → transport limit → dispatch.
pub struct Gateway {
    identities: Arc<dyn IdentityResolver>,
    dispatcher: Arc<Dispatcher>,
    transport_limiter: Option<RateLimiter>,
}

impl Gateway {
    /// Create a gateway without a transport-level limit.
    pub fn new(identities: Arc<dyn IdentityResolver>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            identities,
            dispatcher,
            transport_limiter: None,
        }
    }

    /// Limit each caller across all operations. Any per-operation overrides
    /// in `config` still get their own buckets.
    pub fn with_transport_limit(mut self, config: RateLimitConfig) -> Self {
        self.transport_limiter = Some(RateLimiter::new(config.with_scope(BucketScope::Global)));
        self
    }

    /// The dispatcher behind this gateway.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Calls counted against `caller_id` by the transport limiter in the
    /// current window.
    pub fn transport_count(&self, caller_id: &str) -> u32 {
        self.transport_limiter
            .as_ref()
            .map_or(0, |l| l.current_count(caller_id, GLOBAL_BUCKET))
    }

    /// Handle one request.
    ///
    /// Credential failures are returned as `Err`; everything after identity
    /// resolution ends in a [`ToolResult`].
    pub async fn handle(
        &self,
        credentials: &Credentials,
        name: &str,
        args: Value,
    ) -> Result<ToolResult, AuthError> {
        let caller = self.identities.resolve(credentials).await?;

        if let Some(limiter) = &self.transport_limiter
            && let Admission::Denied { retry_after } = limiter.admit(&caller.id, name)
        {
            log::debug!("transport limit hit for {caller} calling '{name}'");
            return Ok(ToolResult::failure(&ToolError::rate_limited(retry_after)));
        }

        Ok(self.dispatcher.dispatch(name, args, &caller).await)
    }

    /// Handle an MCP `tools/call` request.
    ///
    /// Credential failures become protocol errors; tool failures become
    /// `CallToolResult`s with `is_error` set.
    pub async fn call_tool(
        &self,
        credentials: &Credentials,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, ErrorData> {
        let args = arguments.map_or(Value::Null, Value::Object);
        self.handle(credentials, name, args)
            .await
            .map(ToolResult::into_call_tool_result)
            .map_err(|e| e.to_mcp_error())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("dispatcher", &self.dispatcher)
            .field("transport_limiter", &self.transport_limiter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::declaration::ToolDeclaration;
    use crate::deps::ProviderSet;
    use crate::registry::RegistryBuilder;
    use crate::result::ErrorKind;
    use larder_auth::{AuthConfig, StaticTokenResolver, TokenGrant};
    use larder_resilience::Limit;
    use std::time::Duration;

    fn gateway(protocol: Option<RateLimitConfig>) -> Gateway {
        let mut builder = RegistryBuilder::new();
        for name in ["a", "b"] {
            builder
                .register(
                    ToolDeclaration::builder(name)
                        .handler(|_| async { Ok(Value::Null) })
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }
        let mut dispatcher = Dispatcher::new(builder.build(), ProviderSet::new());
        if let Some(config) = protocol {
            dispatcher = dispatcher.with_rate_limiter(RateLimiter::new(config));
        }
        let resolver = StaticTokenResolver::new(&AuthConfig {
            allow_anonymous: false,
            demo_user: "demo".into(),
            tokens: vec![TokenGrant {
                token: "tok".into(),
                user: "alice".into(),
                email: None,
            }],
        });
        Gateway::new(Arc::new(resolver), Arc::new(dispatcher))
    }

    #[tokio::test]
    async fn test_resolves_identity_before_dispatch() {
        let gw = gateway(None);
        let ok = gw
            .handle(&Credentials::bearer("tok"), "a", Value::Null)
            .await
            .unwrap();
        assert!(ok.is_success());

        let err = gw
            .handle(&Credentials::anonymous(), "a", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_transport_limit_is_per_caller_across_operations() {
        let gw = gateway(None).with_transport_limit(RateLimitConfig::new(2, Duration::from_secs(60)));
        let creds = Credentials::bearer("tok");
        assert!(gw.handle(&creds, "a", Value::Null).await.unwrap().is_success());
        assert!(gw.handle(&creds, "b", Value::Null).await.unwrap().is_success());
        let denied = gw.handle(&creds, "a", Value::Null).await.unwrap();
        assert_eq!(denied.error_kind(), Some(&ErrorKind::RateLimited));
        assert_eq!(gw.transport_count("alice"), 2);
    }

    #[tokio::test]
    async fn test_transport_denial_does_not_charge_protocol_limiter() {
        let protocol = RateLimitConfig::new(10, Duration::from_secs(60));
        let gw = gateway(Some(protocol))
            .with_transport_limit(RateLimitConfig::new(1, Duration::from_secs(60)));
        let creds = Credentials::bearer("tok");
        gw.handle(&creds, "a", Value::Null).await.unwrap();
        gw.handle(&creds, "a", Value::Null).await.unwrap();

        let protocol = gw.dispatcher().rate_limiter().unwrap();
        assert_eq!(protocol.current_count("alice", "a"), 1);
    }

    #[tokio::test]
    async fn test_protocol_denial_charges_transport_once() {
        let protocol = RateLimitConfig::new(100, Duration::from_secs(60))
            .with_override("a", Limit::new(1, Duration::from_secs(60)));
        let gw = gateway(Some(protocol))
            .with_transport_limit(RateLimitConfig::new(10, Duration::from_secs(60)));
        let creds = Credentials::bearer("tok");
        assert!(gw.handle(&creds, "a", Value::Null).await.unwrap().is_success());
        let denied = gw.handle(&creds, "a", Value::Null).await.unwrap();
        assert_eq!(denied.error_kind(), Some(&ErrorKind::RateLimited));
        assert_eq!(gw.transport_count("alice"), 2);
    }

    #[tokio::test]
    async fn test_call_tool_maps_errors() {
        let gw = gateway(None);
        let result = gw
            .call_tool(&Credentials::bearer("tok"), "missing", None)
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));

        assert!(
            gw.call_tool(&Credentials::bearer("forged"), "a", None)
                .await
                .is_err()
        );
    }
}
