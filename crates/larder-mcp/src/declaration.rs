//! Tool declarations.
//!
//! A [`ToolDeclaration`] is the static description of one operation plus the
//! handler that runs it. Declarations are built once at startup with
//! [`ToolDeclaration::builder`] and never change afterwards.

use crate::deps::Dependencies;
use crate::error::{Error, Result};
use crate::result::ToolError;
use crate::schema::ArgumentSchema;
use larder_core::{CallerIdentity, Permission};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Collaborator roles a handler may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependency {
    /// Persistent storage.
    Store,
    /// AI inference service.
    AiService,
    /// Outbound HTTP client.
    HttpClient,
}

impl Dependency {
    /// Every role.
    pub const ALL: [Dependency; 3] = [Self::Store, Self::AiService, Self::HttpClient];

    /// Role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::AiService => "ai-service",
            Self::HttpClient => "http-client",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dependency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                larder_core::Error::invalid_data(format!("unknown dependency role '{s}'")).into()
            })
    }
}

/// Everything a handler receives for one invocation.
pub struct ToolCall {
    /// Validated arguments.
    pub arguments: Map<String, Value>,
    /// Resolved collaborators.
    pub deps: Dependencies,
    /// Who is calling.
    pub caller: CallerIdentity,
}

impl ToolCall {
    /// Deserialize all arguments into `T`.
    pub fn args<T: DeserializeOwned>(&self) -> std::result::Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.arguments.clone()))
            .map_err(|e| ToolError::invalid_arguments(Vec::new(), e.to_string()))
    }

    /// Deserialize one optional argument.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> std::result::Result<Option<T>, ToolError> {
        self.arguments
            .get(name)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    ToolError::invalid_arguments(vec![name.to_string()], format!("{name}: {e}"))
                })
            })
            .transpose()
    }

    /// Deserialize one required argument.
    pub fn required_arg<T: DeserializeOwned>(&self, name: &str) -> std::result::Result<T, ToolError> {
        self.arg(name)?.ok_or_else(|| {
            ToolError::invalid_arguments(
                vec![name.to_string()],
                format!("missing required field '{name}'"),
            )
        })
    }
}

impl fmt::Debug for ToolCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCall")
            .field("arguments", &self.arguments)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

/// Boxed future returned by handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, ToolError>> + Send>>;

/// Type-erased handler.
pub type Handler = Arc<dyn Fn(ToolCall) -> HandlerFuture + Send + Sync>;

/// Static metadata and handler for one operation.
#[derive(Clone)]
pub struct ToolDeclaration {
    name: String,
    description: String,
    schema: ArgumentSchema,
    permission: Permission,
    dependencies: Vec<Dependency>,
    timeout: Option<Duration>,
    handler: Handler,
}

impl ToolDeclaration {
    /// Start building a declaration named `name`.
    pub fn builder(name: impl Into<String>) -> ToolDeclarationBuilder {
        ToolDeclarationBuilder {
            name: name.into(),
            description: String::new(),
            schema: ArgumentSchema::new(),
            permission: Permission::Read,
            dependencies: Vec::new(),
            timeout: None,
            handler: None,
        }
    }

    /// Unique operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Argument schema.
    pub fn schema(&self) -> &ArgumentSchema {
        &self.schema
    }

    /// Required permission.
    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Declared collaborator roles, without duplicates.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Per-operation timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start the handler.
    pub fn invoke(&self, call: ToolCall) -> HandlerFuture {
        (self.handler)(call)
    }
}

impl fmt::Debug for ToolDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDeclaration")
            .field("name", &self.name)
            .field("permission", &self.permission)
            .field("dependencies", &self.dependencies)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ToolDeclaration`].
pub struct ToolDeclarationBuilder {
    name: String,
    description: String,
    schema: ArgumentSchema,
    permission: Permission,
    dependencies: Vec<Dependency>,
    timeout: Option<Duration>,
    handler: Option<Handler>,
}

impl ToolDeclarationBuilder {
    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the argument schema.
    pub fn schema(mut self, schema: ArgumentSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the required permission.
    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    /// Shorthand for `permission(Permission::Write)`.
    pub fn write(self) -> Self {
        self.permission(Permission::Write)
    }

    /// Declare a collaborator role.
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Override the dispatcher's default timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the handler.
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ToolCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, ToolError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |call: ToolCall| -> HandlerFuture {
            Box::pin(handler(call))
        }));
        self
    }

    /// Finish the declaration.
    ///
    /// Fails if the name is empty or contains whitespace, if the timeout is
    /// zero, or if no handler was set.
    pub fn build(self) -> Result<ToolDeclaration> {
        if self.name.is_empty() {
            return Err(Error::invalid_declaration(&self.name, "name is empty"));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(Error::invalid_declaration(
                &self.name,
                "name contains whitespace",
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_declaration(&self.name, "timeout is zero"));
        }
        let handler = self
            .handler
            .ok_or_else(|| Error::invalid_declaration(&self.name, "no handler"))?;

        Ok(ToolDeclaration {
            name: self.name,
            description: self.description,
            schema: self.schema,
            permission: self.permission,
            dependencies: self.dependencies,
            timeout: self.timeout,
            handler,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
