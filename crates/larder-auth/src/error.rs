//! Auth-specific error types.

/// Errors that can occur while resolving a caller.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credentials presented and anonymous access is disabled.
    #[error("missing authentication token")]
    MissingToken,

    /// The authorization value is not a bearer token.
    #[error("invalid credential format: {0}")]
    InvalidFormat(String),

    /// The token is not known to the resolver.
    #[error("unknown token")]
    UnknownToken,

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Whether the caller is at fault (vs. the provider).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken | AuthError::InvalidFormat(_) | AuthError::UnknownToken
        )
    }
}
