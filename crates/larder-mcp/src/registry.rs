//! Tool registry.
//!
//! Registration happens in two phases. During startup a [`RegistryBuilder`]
//! collects declarations, rejecting duplicates. [`RegistryBuilder::build`]
//! then freezes it into a [`Registry`] that only supports lookups and is
//! shared behind an `Arc` for the rest of the process.
//!
//! Domains contribute tools by implementing [`ToolSet`], so separate tool
//! sources (pantry, recipes, health) compose into one registry.

use crate::declaration::ToolDeclaration;
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A batch of declarations contributed by one domain.
///
/// # Example
///
/// ```rust,ignore
/// struct PantryTools { /* ... */ }
///
/// impl ToolSet for PantryTools {
///     fn declarations(&self) -> larder_mcp::Result<Vec<ToolDeclaration>> {
///         Ok(vec![self.list_items()?, self.add_item()?])
///     }
/// }
/// ```
pub trait ToolSet {
    /// Build the declarations in this set.
    fn declarations(&self) -> Result<Vec<ToolDeclaration>>;
}

/// Mutable, startup-only registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<Arc<ToolDeclaration>>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one declaration.
    ///
    /// Fails with [`Error::DuplicateName`] if the name is taken; the builder
    /// is left unchanged.
    pub fn register(&mut self, declaration: ToolDeclaration) -> Result<()> {
        if self.index.contains_key(declaration.name()) {
            return Err(Error::DuplicateName(declaration.name().to_string()));
        }
        log::debug!("registered tool '{}'", declaration.name());
        self.index
            .insert(declaration.name().to_string(), self.entries.len());
        self.entries.push(Arc::new(declaration));
        Ok(())
    }

    /// Add every declaration of `set`, all or nothing.
    pub fn add_set<S: ToolSet + ?Sized>(&mut self, set: &S) -> Result<()> {
        let declarations = set.declarations()?;
        let mut seen = HashSet::new();
        for decl in &declarations {
            if self.index.contains_key(decl.name()) || !seen.insert(decl.name()) {
                return Err(Error::DuplicateName(decl.name().to_string()));
            }
        }
        for decl in declarations {
            self.register(decl)?;
        }
        Ok(())
    }

    /// Number of declarations so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `name` is taken.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Freeze into a read-only [`Registry`].
    pub fn build(self) -> Registry {
        log::info!("tool registry ready with {} tool(s)", self.entries.len());
        Registry {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Read-only registry used while serving.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Arc<ToolDeclaration>>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Look up a declaration by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<ToolDeclaration>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.entries[i]))
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    /// Declarations in registration order.
    pub fn list(&self) -> &[Arc<ToolDeclaration>] {
        &self.entries
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|d| d.name())
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if a tool exists by name.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

// ============================================================================
// Tests
// ============================================================================
