//! Error types for larder-mcp.
//!
//! [`Error`] covers startup-time failures: malformed declarations, duplicate
//! names, bad configuration. Failures during a dispatch never use this type;
//! they travel as [`crate::ToolError`] and reach the caller as an
//! [`crate::ErrorEnvelope`].

use rmcp::model::ErrorData;
use thiserror::Error;

/// Result type alias for larder-mcp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling a registry or dispatcher.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A declaration is malformed.
    #[error("invalid declaration '{name}': {reason}")]
    InvalidDeclaration {
        /// Declared tool name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A tool with this name is already registered.
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    /// No tool with this name is registered.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Error from larder-core.
    #[error(transparent)]
    Core(#[from] larder_core::Error),
}

impl Error {
    /// Create an invalid declaration error.
    pub fn invalid_declaration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for registration-time errors.
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::InvalidDeclaration { .. } | Self::DuplicateName(_)
        )
    }
}

/// Convert larder errors to rmcp `ErrorData`.
pub trait McpErrorExt {
    /// Map to the closest MCP protocol error.
    fn to_mcp_error(&self) -> ErrorData;
}

impl McpErrorExt for Error {
    fn to_mcp_error(&self) -> ErrorData {
        match self {
            Error::UnknownOperation(_) => ErrorData::invalid_params(self.to_string(), None),
            _ => ErrorData::internal_error(self.to_string(), None),
        }
    }
}

impl McpErrorExt for larder_auth::AuthError {
    fn to_mcp_error(&self) -> ErrorData {
        if self.is_client_error() {
            ErrorData::invalid_request(self.to_string(), None)
        } else {
            ErrorData::internal_error(self.to_string(), None)
        }
    }
}
