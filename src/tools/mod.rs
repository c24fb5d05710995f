pub mod capture;
pub mod files;
pub mod launch;
pub mod messaging;
pub mod power;
pub mod registry;
pub mod system;
pub mod voice;

use crate::context::ToolContext;
use crate::error::{ErrorKind, ToolError};
use futures::future::BoxFuture;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

pub use registry::{ToolDefinition, ToolRegistry, ToolRegistryBuilder};

/// Tool-specific success data.
pub type Payload = Map<String, Value>;

/// What every handler returns before the registry wraps it.
pub type HandlerResult = Result<Payload, ToolError>;

/// Type-erased async handler.
pub type Handler =
    Arc<dyn Fn(Arc<ToolContext>, ToolArgs) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wraps an async fn into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<ToolContext>, ToolArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

/// Builds a payload from a `json!` object. The reserved `ok` key is dropped.
pub fn payload(value: Value) -> Payload {
    let mut map = match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    map.remove("ok");
    map
}

/// The envelope handed back to the voice runtime.
///
/// Serializes flat: `{"ok": true, ...payload}` or
/// `{"ok": false, "error": "...", "kind": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Payload),
    Failure {
        error: String,
        kind: Option<ErrorKind>,
    },
}

impl ToolResult {
    pub fn success(payload: Payload) -> Self {
        Self::Success(payload)
    }

    pub fn failure(error: impl Into<String>, kind: Option<ErrorKind>) -> Self {
        Self::Failure {
            error: error.into(),
            kind,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// Shorthand for a payload field; `None` on failure or missing key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload().and_then(|p| p.get(key))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => *kind,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| json!({"ok": false, "error": e.to_string()}))
    }
}

impl From<HandlerResult> for ToolResult {
    fn from(result: HandlerResult) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(err) => Self::Failure {
                error: err.to_string(),
                kind: Some(err.kind()),
            },
        }
    }
}

impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(payload) => {
                let mut map = serializer.serialize_map(Some(payload.len() + 1))?;
                map.serialize_entry("ok", &true)?;
                for (key, value) in payload {
                    if key != "ok" {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.end()
            }
            Self::Failure { error, kind } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", error)?;
                if let Some(kind) = kind {
                    map.serialize_entry("kind", kind)?;
                }
                map.end()
            }
        }
    }
}

/// Parameter types the function-calling schema can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Boolean,
    Integer,
}

impl ParamType {
    pub fn json_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub optional: bool,
    pub default: Option<Value>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            optional: false,
            default: None,
            description,
        }
    }

    pub fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            optional: true,
            ..Self::required(name, ty, description)
        }
    }

    /// Sets the value used when the caller omits this parameter.
    ///
    /// # Panics
    ///
    /// Panics if the default does not match the declared type.
    pub fn with_default(mut self, default: Value) -> Self {
        assert!(
            self.ty.accepts(&default),
            "default for '{}' must be a {}",
            self.name,
            self.ty.json_name()
        );
        self.optional = true;
        self.default = Some(default);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.ty.json_name(),
            "description": self.description,
        });
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

/// Name, ordered schema, description and handler of one tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub handler: Handler,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl ToolDescriptor {
    pub fn new(name: &'static str, description: &'static str, handler: Handler) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
            handler,
        }
    }

    /// Appends a parameter. Order of calls is the schema order.
    ///
    /// # Panics
    ///
    /// Panics if the parameter name is already declared.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        assert!(
            self.params.iter().all(|p| p.name != spec.name),
            "tool '{}' declares parameter '{}' twice",
            self.name,
            spec.name
        );
        self.params.push(spec);
        self
    }

    /// JSON Schema object describing the parameters.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| !p.optional)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Checks `raw` against the schema and fills in defaults.
    pub fn validate(&self, raw: Value) -> Result<ToolArgs, ToolError> {
        let mut given = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(ToolError::invalid_input("Arguments must be a JSON object")),
        };

        if let Some(unknown) = given
            .keys()
            .find(|key| self.params.iter().all(|p| p.name != key.as_str()))
        {
            return Err(ToolError::invalid_input(format!(
                "Unexpected argument '{}' for {}",
                unknown, self.name
            )));
        }

        let mut values = Map::new();
        for spec in &self.params {
            match given.remove(spec.name).filter(|v| !v.is_null()) {
                Some(value) if spec.ty.accepts(&value) => {
                    values.insert(spec.name.to_string(), value);
                }
                Some(_) => {
                    return Err(ToolError::invalid_input(format!(
                        "Argument '{}' must be a {}",
                        spec.name,
                        spec.ty.json_name()
                    )))
                }
                None if !spec.optional => {
                    return Err(ToolError::invalid_input(format!(
                        "Missing required argument '{}'",
                        spec.name
                    )))
                }
                None => {
                    if let Some(default) = &spec.default {
                        values.insert(spec.name.to_string(), default.clone());
                    }
                }
            }
        }

        Ok(ToolArgs { values })
    }
}

/// Arguments that already passed schema validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    /// Trimmed string argument. Blank strings count as absent.
    pub fn string(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn require_string(&self, name: &str) -> Result<String, ToolError> {
        self.string(name)
            .ok_or_else(|| ToolError::invalid_input(format!("'{}' must not be empty", name)))
    }

    pub fn bool(&self, name: &str) -> bool {
        self.values.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }
}

/// Registry with every built-in tool.
pub fn default_registry() -> ToolRegistry {
    let mut builder = ToolRegistryBuilder::new();
    power::register(&mut builder);
    files::register(&mut builder);
    launch::register(&mut builder);
    system::register(&mut builder);
    capture::register(&mut builder);
    voice::register(&mut builder);
    messaging::register(&mut builder);
    builder.build()
}
