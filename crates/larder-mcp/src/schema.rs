//! Argument schemas.
//!
//! An [`ArgumentSchema`] is an ordered list of named fields. It validates a
//! raw JSON payload before a handler runs and exports itself as a JSON Schema
//! object for the catalog.

use crate::result::ToolError;
use serde_json::{Map, Value, json};
use std::fmt;

/// Type of an argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    /// JSON string.
    String,
    /// JSON number without a fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array whose elements all have the given kind.
    Array(Box<ArgKind>),
    /// JSON object, contents unchecked.
    Object,
    /// Any JSON value.
    Any,
}

impl ArgKind {
    /// Array of `item`.
    pub fn array_of(item: ArgKind) -> Self {
        Self::Array(Box::new(item))
    }

    /// Returns `true` if `value` has this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array(item) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| item.matches(v))),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Array(item) => json!({"type": "array", "items": item.json_schema()}),
            Self::Object => json!({"type": "object"}),
            Self::Any => json!({}),
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Array(item) => write!(f, "array<{item}>"),
            Self::Object => f.write_str("object"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// One named argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgField {
    /// Field name.
    pub name: String,
    /// Expected kind.
    pub kind: ArgKind,
    /// Whether the field must be present.
    pub required: bool,
    /// Description exported in the catalog.
    pub description: Option<String>,
}

/// Ordered set of argument fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentSchema {
    fields: Vec<ArgField>,
}

impl ArgumentSchema {
    /// Schema with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    pub fn required(self, name: impl Into<String>, kind: ArgKind, description: &str) -> Self {
        self.field(name, kind, true, description)
    }

    /// Add an optional field.
    pub fn optional(self, name: impl Into<String>, kind: ArgKind, description: &str) -> Self {
        self.field(name, kind, false, description)
    }

    fn field(
        mut self,
        name: impl Into<String>,
        kind: ArgKind,
        required: bool,
        description: &str,
    ) -> Self {
        let name = name.into();
        let description = (!description.is_empty()).then(|| description.to_string());
        let field = ArgField {
            name,
            kind,
            required,
            description,
        };
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[ArgField] {
        &self.fields
    }

    /// Returns `true` if the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a raw payload and return the argument map.
    ///
    /// `null` is treated as an empty object. A `null` value for an optional
    /// field counts as absent. Every problem is collected so the error names
    /// all offending fields at once; a non-object payload is reported as `$`.
    pub fn validate(&self, raw: Value) -> Result<Map<String, Value>, ToolError> {
        let mut args = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::invalid_arguments(
                    vec!["$".to_string()],
                    format!("arguments must be an object, got {}", json_type(&other)),
                ));
            }
        };

        let mut fields = Vec::new();
        let mut problems = Vec::new();

        for field in &self.fields {
            match args.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    problems.push(format!("missing required field '{}'", field.name));
                    fields.push(field.name.clone());
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.kind.matches(value) => {
                    problems.push(format!(
                        "field '{}' expected {}, got {}",
                        field.name,
                        field.kind,
                        json_type(value)
                    ));
                    fields.push(field.name.clone());
                }
                Some(_) => {}
            }
        }

        for key in args.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                problems.push(format!("unknown field '{key}'"));
                fields.push(key.clone());
            }
        }

        if !problems.is_empty() {
            return Err(ToolError::invalid_arguments(
                fields,
                format!("invalid arguments: {}", problems.join("; ")),
            ));
        }

        args.retain(|_, v| !v.is_null());
        Ok(args)
    }

    /// Export as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut schema = field.kind.json_schema();
            if let (Some(desc), Some(obj)) = (&field.description, schema.as_object_mut()) {
                obj.insert("description".to_string(), Value::String(desc.clone()));
            }
            properties.insert(field.name.clone(), schema);
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
