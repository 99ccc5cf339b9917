//! Resolver backed by a static token table.

use crate::{AuthConfig, AuthError, Credentials, IdentityResolver, TokenGrant};
use larder_core::CallerIdentity;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Resolves bearer tokens against a table loaded from configuration.
///
/// Known tokens yield an authenticated identity. Missing credentials yield the
/// demo identity when anonymous access is allowed.
#[derive(Debug, Clone)]
pub struct StaticTokenResolver {
    allow_anonymous: bool,
    demo_user: String,
    grants: HashMap<String, TokenGrant>,
}

impl StaticTokenResolver {
    /// Build a resolver from configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let grants = config
            .tokens
            .iter()
            .map(|g| (g.token.clone(), g.clone()))
            .collect::<HashMap<_, _>>();
        log::debug!("static token resolver loaded {} grant(s)", grants.len());
        Self {
            allow_anonymous: config.allow_anonymous,
            demo_user: config.demo_user.clone(),
            grants,
        }
    }

    /// Resolve without the async wrapper.
    pub fn resolve_now(&self, credentials: &Credentials) -> Result<CallerIdentity, AuthError> {
        match credentials.token() {
            None if self.allow_anonymous => Ok(CallerIdentity::demo(self.demo_user.clone())),
            None => Err(AuthError::MissingToken),
            Some(token) => {
                let grant = self.grants.get(token).ok_or_else(|| {
                    log::warn!("rejected unknown bearer token");
                    AuthError::UnknownToken
                })?;
                let identity = CallerIdentity::authenticated(grant.user.clone());
                Ok(match &grant.email {
                    Some(email) => identity.with_email(email.clone()),
                    None => identity,
                })
            }
        }
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<CallerIdentity, AuthError>> + Send + 'a>> {
        Box::pin(async move { self.resolve_now(credentials) })
    }
}
