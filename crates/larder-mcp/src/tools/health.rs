//! Health check tool.
//!
//! Provides `larder.system.health`, which reports server status, tool count
//! and version information. Readable by any caller and needs no
//! collaborators.

use crate::declaration::ToolDeclaration;
use crate::error::Result;
use crate::registry::ToolSet;
use serde::{Deserialize, Serialize};

/// Name of the health tool.
pub const HEALTH_TOOL: &str = "larder.system.health";

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status ("healthy").
    pub status: String,
    /// Server name.
    pub server_name: String,
    /// Server version.
    pub version: String,
    /// Number of registered tools.
    pub tool_count: usize,
}

/// A tool set that provides the health tool.
///
/// Captures server metadata at construction time and reports it when the
/// tool is called.
pub struct HealthTools {
    server_name: String,
    version: String,
    total_tool_count: usize,
}

impl HealthTools {
    /// Create health tools with server metadata.
    ///
    /// `total_tool_count` should include the health tool itself.
    pub fn new(
        server_name: impl Into<String>,
        version: impl Into<String>,
        total_tool_count: usize,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            version: version.into(),
            total_tool_count,
        }
    }

    fn response(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            server_name: self.server_name.clone(),
            version: self.version.clone(),
            tool_count: self.total_tool_count,
        }
    }
}

impl ToolSet for HealthTools {
    fn declarations(&self) -> Result<Vec<ToolDeclaration>> {
        let response = self.response();
        let health = ToolDeclaration::builder(HEALTH_TOOL)
            .description("Check server health and status")
            .handler(move |_call| {
                let response = response.clone();
                async move { Ok(serde_json::to_value(response)?) }
            })
            .build()?;
        Ok(vec![health])
    }
}

// ============================================================================
// Tests
// ============================================================================
