//! Caller identity and roles.
//!
//! A [`CallerIdentity`] is produced once per request by an identity resolver
//! (see `larder-auth`) and read by the dispatcher for permission checks, rate
//! limiting, and observability. It is never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Anonymous or demo caller. May only invoke read operations.
    Demo,
    /// Caller whose credentials were verified.
    Authenticated,
}

impl Role {
    /// Returns `true` for [`Role::Authenticated`].
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved principal on whose behalf a dispatch executes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Opaque caller identifier. Used as the rate-limit key.
    pub id: String,
    /// Caller role.
    pub role: Role,
    /// Email address, when the identity provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CallerIdentity {
    /// Create a demo (anonymous) identity.
    pub fn demo(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Demo,
            email: None,
        }
    }

    /// Create an authenticated identity.
    pub fn authenticated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Authenticated,
            email: None,
        }
    }

    /// Attach an email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Returns `true` if the caller is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.role.is_authenticated()
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.role)
    }
}
