//! Larder Core: shared identity, permission, and error types.
//!
//! This crate provides the foundational types used across all Larder crates.
//! It has no internal Larder dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`identity`]: Caller identity and roles
//! - [`permission`]: Operation permission levels

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod error;
pub mod identity;
pub mod permission;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use identity::{CallerIdentity, Role};
pub use permission::Permission;
