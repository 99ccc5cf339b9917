//! Tool registry and dispatch pipeline for Larder MCP servers.
//!
//! This crate turns a wire-level "call tool X with args Y as caller Z" request
//! into a checked, bounded and observed invocation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       larder-mcp                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ToolDeclaration - name, schema, permission, deps, handler  │
//! │  RegistryBuilder / Registry - startup vs. serving phase     │
//! │  DependencyResolver - role → provider, per-call overrides   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Dispatcher - lookup → permission → rate → validate →       │
//! │               resolve → invoke (timeout) → normalize →      │
//! │               observe                                       │
//! │  Gateway - credentials → identity → transport limit         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ToolResult / ErrorEnvelope - uniform caller-facing shape   │
//! │  ObservabilitySink - one ExecutionRecord per dispatch       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Built-in tools:                                            │
//! │  └── larder.system.health - server status and tool count    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use larder_mcp::{Dispatcher, ProviderSet, RegistryBuilder, ToolDeclaration};
//! use larder_core::CallerIdentity;
//!
//! let mut builder = RegistryBuilder::new();
//! builder.register(
//!     ToolDeclaration::builder("pantry.items.list")
//!         .description("List pantry items")
//!         .handler(|_call| async { Ok(serde_json::json!([])) })
//!         .build()?,
//! )?;
//!
//! let dispatcher = Dispatcher::new(builder.build(), ProviderSet::new());
//! let result = dispatcher
//!     .dispatch("pantry.items.list", serde_json::Value::Null, &CallerIdentity::demo("guest"))
//!     .await;
//! assert!(result.is_success());
//! ```

pub mod catalog;
pub mod declaration;
pub mod deps;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod observe;
pub mod registry;
pub mod result;
pub mod schema;
pub mod tools;

// Re-export the rmcp model so domain crates need not depend on rmcp directly
pub use rmcp::model;

// Re-exports - declarations and registry
pub use declaration::{Dependency, ToolCall, ToolDeclaration, ToolDeclarationBuilder};
pub use registry::{Registry, RegistryBuilder, ToolSet};
pub use schema::{ArgField, ArgKind, ArgumentSchema};

// Re-exports - dependency resolution
pub use deps::{
    AiService, Dependencies, DependencyResolver, HttpClient, InMemoryStore, ProviderSet,
    ResolveContext, ResolveError, Store,
};

// Re-exports - dispatch
pub use catalog::OperationDescriptor;
pub use dispatch::{DEFAULT_TIMEOUT, Dispatcher};
pub use gateway::Gateway;
pub use observe::{DispatchStatus, ExecutionRecord, LogSink, MemorySink, NoopSink, ObservabilitySink};
pub use result::{ErrorEnvelope, ErrorKind, ToolError, ToolResult};

// Re-exports - error
pub use error::{Error, McpErrorExt, Result};

// Re-exports - built-in tools
pub use tools::{HEALTH_TOOL, HealthResponse, HealthTools};
