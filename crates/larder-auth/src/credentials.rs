//! Credentials presented by a caller.

use crate::AuthError;

/// Credentials extracted by a transport.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    bearer: Option<String>,
}

impl Credentials {
    /// No credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    /// Parse an `Authorization` header value. `None` means no header.
    pub fn from_authorization(value: Option<&str>) -> Result<Self, AuthError> {
        match value {
            None => Ok(Self::anonymous()),
            Some(v) => v
                .strip_prefix("Bearer ")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(Self::bearer)
                .ok_or_else(|| {
                    let scheme = v.split_whitespace().next().unwrap_or_default();
                    AuthError::InvalidFormat(scheme.to_string())
                }),
        }
    }

    /// The bearer token, if any.
    pub fn token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// True when no credentials were presented.
    pub fn is_anonymous(&self) -> bool {
        self.bearer.is_none()
    }
}

// Never print the token.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
