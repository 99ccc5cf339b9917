//! Built-in tools.
//!
//! Tools provided by `larder-mcp` itself, available to every Larder server.

pub mod health;

pub use health::{HEALTH_TOOL, HealthResponse, HealthTools};
