//! Response-shape schemas for schema-constrained generation.
//!
//! A [`SchemaDescriptor`] declares the object shape the oracle must reply
//! with. It serves two purposes: it serializes into the wire-level
//! `responseSchema` sent with the request, and it conforms the parsed
//! payload on the way back, so that a malformed reply becomes a typed
//! error instead of a silently defaulted value.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// How to treat payloads that do not parse or conform.
///
/// The upstream service historically substituted an empty object for any
/// unparsable payload. That behavior is preserved here as an explicit,
/// opt-in policy rather than an implicit fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Unparsable payload or missing required field is a
    /// [`Error::SchemaViolation`].
    #[default]
    Strict,
    /// Unparsable payload becomes an empty object and missing *optional*
    /// fields are filled with type defaults. Missing required fields are
    /// still violations.
    LenientDefaults,
}

/// A node in a response schema: a string, boolean, array, or nested object.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// A string field, optionally restricted to an enumerated set.
    String { enum_values: Option<Vec<String>> },
    /// A boolean field.
    Boolean,
    /// An array whose items all match the given node.
    Array(Box<SchemaNode>),
    /// A nested object.
    Object(SchemaDescriptor),
}

impl SchemaNode {
    /// An unconstrained string field.
    pub fn string() -> Self {
        Self::String { enum_values: None }
    }

    /// A string field restricted to the given values.
    pub fn string_enum(values: &[&str]) -> Self {
        Self::String {
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    /// A boolean field.
    pub fn boolean() -> Self {
        Self::Boolean
    }

    /// An array of the given item node.
    pub fn array(item: SchemaNode) -> Self {
        Self::Array(Box::new(item))
    }

    /// A nested object.
    pub fn object(descriptor: SchemaDescriptor) -> Self {
        Self::Object(descriptor)
    }

    /// The type default used when `LenientDefaults` fills a missing
    /// optional field.
    fn default_value(&self) -> Value {
        match self {
            Self::String { .. } => Value::String(String::new()),
            Self::Boolean => Value::Bool(false),
            Self::Array(_) => Value::Array(Vec::new()),
            Self::Object(descriptor) => {
                let mut map = Map::new();
                for (name, node) in &descriptor.properties {
                    map.insert(name.clone(), node.default_value());
                }
                Value::Object(map)
            }
        }
    }

    /// Wire-level schema JSON for this node.
    fn to_value(&self) -> Value {
        match self {
            Self::String { enum_values: None } => json!({ "type": "STRING" }),
            Self::String {
                enum_values: Some(values),
            } => json!({ "type": "STRING", "enum": values }),
            Self::Boolean => json!({ "type": "BOOLEAN" }),
            Self::Array(item) => json!({ "type": "ARRAY", "items": item.to_value() }),
            Self::Object(descriptor) => descriptor.to_value(),
        }
    }

    /// Validate a present value against this node.
    fn conform(&self, path: &str, value: &mut Value, policy: ParsePolicy) -> Result<()> {
        match (self, &mut *value) {
            (Self::String { enum_values }, Value::String(s)) => {
                if let Some(allowed) = enum_values {
                    if !allowed.iter().any(|v| v == s) {
                        return Err(Error::schema_violation(format!(
                            "field `{path}` has value `{s}` outside enum {allowed:?}"
                        )));
                    }
                }
                Ok(())
            }
            (Self::Boolean, Value::Bool(_)) => Ok(()),
            (Self::Array(item), Value::Array(elements)) => {
                for (i, element) in elements.iter_mut().enumerate() {
                    item.conform(&format!("{path}[{i}]"), element, policy)?;
                }
                Ok(())
            }
            (Self::Object(descriptor), Value::Object(_)) => {
                descriptor.conform_object(path, value, policy)
            }
            (expected, actual) => Err(Error::schema_violation(format!(
                "field `{path}` expected {} but got {}",
                expected.type_name(),
                value_type_name(actual)
            ))),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Boolean => "boolean",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declarative description of an object-shaped oracle response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaDescriptor {
    properties: Vec<(String, SchemaNode)>,
    required: Vec<String>,
}

impl SchemaDescriptor {
    /// Create an empty object schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an optional field.
    pub fn field(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.properties.push((name.into(), node));
        self
    }

    /// Add a required field.
    pub fn required_field(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.push((name, node));
        self
    }

    /// Add a required unconstrained string field.
    pub fn required_string(self, name: impl Into<String>) -> Self {
        self.required_field(name, SchemaNode::string())
    }

    /// Add an optional unconstrained string field.
    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, SchemaNode::string())
    }

    /// Field names declared on this schema, in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.properties.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Wire-level `responseSchema` JSON for this object.
    pub fn to_value(&self) -> Value {
        let mut properties = Map::new();
        for (name, node) in &self.properties {
            properties.insert(name.clone(), node.to_value());
        }
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String("OBJECT".into()));
        schema.insert("properties".into(), Value::Object(properties));
        if !self.required.is_empty() {
            schema.insert("required".into(), json!(self.required));
        }
        Value::Object(schema)
    }

    /// Parse a raw payload and conform it to this schema under the given
    /// policy, returning the (possibly defaulted) JSON value.
    pub fn conform(&self, payload: &str, policy: ParsePolicy) -> Result<Value> {
        let mut value = match serde_json::from_str::<Value>(payload.trim()) {
            Ok(value) => value,
            Err(e) => match policy {
                ParsePolicy::Strict => {
                    return Err(Error::schema_violation(format!(
                        "payload is not valid JSON: {e}"
                    )))
                }
                ParsePolicy::LenientDefaults => Value::Object(Map::new()),
            },
        };
        self.conform_object("$", &mut value, policy)?;
        Ok(value)
    }

    fn conform_object(&self, path: &str, value: &mut Value, policy: ParsePolicy) -> Result<()> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::schema_violation(format!(
                    "field `{path}` expected object but got {}",
                    value_type_name(other)
                )))
            }
        };

        for name in &self.required {
            if !map.contains_key(name) {
                return Err(Error::schema_violation(format!(
                    "missing required field `{path}.{name}`"
                )));
            }
        }

        for (name, node) in &self.properties {
            let child_path = format!("{path}.{name}");
            match map.get_mut(name) {
                Some(child) if child.is_null() => {
                    if self.required.contains(name) {
                        return Err(Error::schema_violation(format!(
                            "missing required field `{child_path}`"
                        )));
                    }
                    // Explicit nulls count as absent.
                    if policy == ParsePolicy::LenientDefaults {
                        *child = node.default_value();
                    }
                }
                Some(child) => node.conform(&child_path, child, policy)?,
                None => {
                    if policy == ParsePolicy::LenientDefaults {
                        map.insert(name.clone(), node.default_value());
                    }
                }
            }
        }

        // Undeclared fields are passed through untouched.
        Ok(())
    }
}
