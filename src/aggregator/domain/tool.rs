//! Tool metadata, descriptors, and call payloads.

use super::{BackendName, namespaced_identifier, sanitize};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool metadata as reported by a backend's `tools/list`.
///
/// Fields the aggregator does not interpret are kept in `extra` so they
/// reach the upstream caller unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTool {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the call arguments.
    #[serde(default)]
    pub input_schema: Value,
    /// Remaining metadata (annotations, output schema, and so on).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteTool {
    /// Creates tool metadata with no additional fields.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        let description_text = description.into();
        Self {
            name: name.into(),
            description: (!description_text.is_empty()).then_some(description_text),
            input_schema,
            extra: Map::new(),
        }
    }
}

/// Guarantees a schema has a `type` (defaulting to `"object"`) and a
/// `properties` mapping (defaulting to empty).
///
/// A schema that is not a JSON object is replaced by the empty object schema.
#[must_use]
pub fn normalize_input_schema(schema: Value) -> Value {
    let mut object = match schema {
        Value::Object(object) => object,
        _ => Map::new(),
    };

    let has_type = match object.get("type") {
        None | Some(Value::Null) => false,
        Some(Value::String(kind)) => !kind.is_empty(),
        Some(_) => true,
    };
    if !has_type {
        object.insert("type".to_owned(), Value::String("object".to_owned()));
    }

    if matches!(object.get("properties"), None | Some(Value::Null)) {
        object.insert("properties".to_owned(), Value::Object(Map::new()));
    }

    Value::Object(object)
}

/// A discovered tool registered under its namespaced identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    backend: BackendName,
    sanitized_name: String,
    namespaced_name: String,
    tool: RemoteTool,
}

impl ToolDescriptor {
    /// Derives the descriptor of `tool` discovered on `backend`.
    #[must_use]
    pub fn new(backend: BackendName, tool: RemoteTool) -> Self {
        let sanitized_name = sanitize(&tool.name);
        let namespaced_name = namespaced_identifier(&backend, &tool.name);
        Self {
            backend,
            sanitized_name,
            namespaced_name,
            tool,
        }
    }

    /// Returns the owning backend.
    #[must_use]
    pub const fn backend(&self) -> &BackendName {
        &self.backend
    }

    /// Returns the name the backend reported.
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.tool.name
    }

    /// Returns the original name with separators normalised.
    #[must_use]
    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    /// Returns the public identifier.
    #[must_use]
    pub fn namespaced_name(&self) -> &str {
        &self.namespaced_name
    }

    /// Returns the metadata exactly as the backend reported it.
    #[must_use]
    pub const fn tool(&self) -> &RemoteTool {
        &self.tool
    }

    /// Produces the metadata shown to the upstream caller.
    ///
    /// The name becomes the namespaced identifier, a non-empty description is
    /// prefixed with `[backend] `, and the input schema is normalised.
    #[must_use]
    pub fn exposed(&self) -> RemoteTool {
        let description = self
            .tool
            .description
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(|text| format!("[{}] {text}", self.backend));

        RemoteTool {
            name: self.namespaced_name.clone(),
            description,
            input_schema: normalize_input_schema(self.tool.input_schema.clone()),
            extra: self.tool.extra.clone(),
        }
    }
}

/// Invocation request for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name; namespaced upstream, original downstream.
    pub name: String,
    /// Call arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    /// Request metadata forwarded untouched.
    #[serde(default, rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ToolCallRequest {
    /// Creates a call request with arguments and no metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments: Some(arguments),
            meta: None,
        }
    }

    /// Returns the same request addressed to `name`.
    #[must_use]
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }
}

/// Result of a tool invocation, passed through without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content blocks returned by the tool.
    #[serde(default)]
    pub content: Vec<Value>,
    /// Whether the tool reported a failure of its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Remaining result fields (structured content, metadata).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolCallResult {
    /// Creates a successful result with the given content blocks.
    #[must_use]
    pub fn with_content(content: Vec<Value>) -> Self {
        Self {
            content,
            is_error: None,
            extra: Map::new(),
        }
    }
}
