//! Wiring: configuration in, gateway out.

use crate::config::LarderConfig;
use crate::providers::ReqwestHttpClient;
use crate::tools::PantryTools;
use anyhow::Result;
use larder_auth::StaticTokenResolver;
use larder_mcp::{
    Dispatcher, Gateway, HealthTools, InMemoryStore, LogSink, ProviderSet, RegistryBuilder,
};
use larder_resilience::{CircuitBreakers, RateLimiter};
use std::sync::Arc;

/// Server name reported by the health tool.
pub const SERVER_NAME: &str = "larder";

/// Build the gateway described by `config`.
pub fn build_gateway(config: &LarderConfig) -> Result<Gateway> {
    let breakers = Arc::new(CircuitBreakers::new(config.breaker.to_breaker_config()?));

    let http = ReqwestHttpClient::new(&config.http, Arc::clone(&breakers))?;
    let providers = ProviderSet::new()
        .with_store_instance(Arc::new(InMemoryStore::new()))
        .with_http_client_instance(Arc::new(http));

    let mut registry = RegistryBuilder::new();
    registry.add_set(&PantryTools)?;
    let health = HealthTools::new(SERVER_NAME, env!("CARGO_PKG_VERSION"), registry.len() + 1);
    registry.add_set(&health)?;

    let dispatcher = Dispatcher::new(registry.build(), providers)
        .with_rate_limiter(RateLimiter::new(
            config.rate_limit.protocol.to_rate_limit_config()?,
        ))
        .with_sink(Arc::new(LogSink))
        .with_timeout(config.dispatch.timeout()?);

    let resolver = StaticTokenResolver::new(&config.auth);
    Ok(Gateway::new(Arc::new(resolver), Arc::new(dispatcher))
        .with_transport_limit(config.rate_limit.transport.to_rate_limit_config()?))
}
