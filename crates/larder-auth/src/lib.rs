//! Caller identity resolution for Larder.
//!
//! Provides:
//! - [`Credentials`]: what a transport extracted from the request
//! - [`IdentityResolver`]: trait for async credential checks (implement per provider)
//! - [`StaticTokenResolver`]: resolver backed by a configured token table
//! - [`AuthConfig`]: configuration for anonymous access and static tokens
//! - [`AuthError`]: auth-specific error types

mod credentials;
mod error;
mod resolver;

pub use credentials::Credentials;
pub use error::AuthError;
pub use resolver::StaticTokenResolver;

use larder_core::CallerIdentity;
use serde::{Deserialize, Serialize};

/// A bearer token granted to a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// The opaque token value.
    pub token: String,
    /// User id the token resolves to.
    pub user: String,
    /// Optional email, carried into logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Configuration for identity resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Whether callers without credentials get the demo identity.
    /// When false they are rejected with [`AuthError::MissingToken`].
    pub allow_anonymous: bool,
    /// Id given to anonymous callers.
    pub demo_user: String,
    /// Static token table.
    pub tokens: Vec<TokenGrant>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_anonymous: true,
            demo_user: "demo".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// Trait for turning credentials into a caller identity.
///
/// Implement this for each identity provider. The gateway calls `resolve()`
/// once per request, before anything else runs.
pub trait IdentityResolver: Send + Sync + 'static {
    /// Resolve `credentials` to the calling identity.
    fn resolve<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<CallerIdentity, AuthError>> + Send + 'a>,
    >;
}
