//! Catalog export.
//!
//! The caller-facing view of the registry, as plain descriptors and as rmcp
//! [`Tool`] definitions for MCP `tools/list`.

use crate::declaration::ToolDeclaration;
use crate::dispatch::Dispatcher;
use larder_core::Permission;
use rmcp::model::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// One advertised operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Operation name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Arguments as JSON Schema.
    pub argument_schema: Value,
    /// Required permission.
    pub permission: Permission,
}

impl From<&ToolDeclaration> for OperationDescriptor {
    fn from(decl: &ToolDeclaration) -> Self {
        Self {
            name: decl.name().to_string(),
            description: decl.description().to_string(),
            argument_schema: decl.schema().to_json_schema(),
            permission: decl.permission(),
        }
    }
}

fn json_schema(value: Value) -> Arc<Map<String, Value>> {
    match value {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(Map::new()),
    }
}

impl OperationDescriptor {
    /// Convert to an MCP tool definition.
    pub fn to_tool(&self) -> Tool {
        Tool::new(
            self.name.clone(),
            self.description.clone(),
            json_schema(self.argument_schema.clone()),
        )
    }
}

impl Dispatcher {
    /// MCP tool definitions for every registered operation.
    pub fn tools(&self) -> Vec<Tool> {
        self.list_operations()
            .iter()
            .map(OperationDescriptor::to_tool)
            .collect()
    }
}
