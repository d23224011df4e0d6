use serde_json::{json, Value};

use crate::WRAP_RESULT_MARKER;

/// The shape a single parameter takes in a derived schema. Stands in for
/// introspecting a live function signature (spec §4.1): the builder API is
/// the real call site that supplies these, one per declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ParamType>),
    Object(Value),
    /// An already-built JSON Schema fragment, used when a caller wants full
    /// control (enums, formats, `$ref`s into a shared definitions map).
    Raw(Value),
    /// A context-injected parameter (`Context`, `CurrentServer`, ...). Never
    /// appears in the derived schema — spec §4.1: "recognizes context
    /// parameters by a sentinel type and drops them".
    Context,
}

impl ParamType {
    fn to_schema(&self) -> Value {
        match self {
            ParamType::String => json!({ "type": "string" }),
            ParamType::Integer => json!({ "type": "integer" }),
            ParamType::Number => json!({ "type": "number" }),
            ParamType::Boolean => json!({ "type": "boolean" }),
            ParamType::Array(inner) => json!({ "type": "array", "items": inner.to_schema() }),
            ParamType::Object(schema) => schema.clone(),
            ParamType::Raw(schema) => schema.clone(),
            ParamType::Context => Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self { name: name.into(), param_type, required: true, default: None, description: None }
    }

    pub fn optional(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn is_context(&self) -> bool {
        matches!(self.param_type, ParamType::Context)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionDescriptor {
    pub params: Vec<ParamDescriptor>,
    pub return_type: Option<ParamType>,
}

impl FunctionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn returning(mut self, return_type: ParamType) -> Self {
        self.return_type = Some(return_type);
        self
    }
}

/// Derive an object-typed input schema whose properties mirror the
/// descriptor's parameters, dropping context parameters and anything in
/// `exclude_args` (spec §4.1).
pub fn derive_input_schema(descriptor: &FunctionDescriptor, exclude_args: &[&str]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for param in &descriptor.params {
        if param.is_context() || exclude_args.contains(&param.name.as_str()) {
            continue;
        }
        let mut prop = param.param_type.to_schema();
        if let Some(description) = &param.description {
            if let Value::Object(map) = &mut prop {
                map.insert("description".to_string(), json!(description));
            }
        }
        if let Some(default) = &param.default {
            if let Value::Object(map) = &mut prop {
                map.insert("default".to_string(), default.clone());
            }
        }
        properties.insert(param.name.clone(), prop);
        if param.required {
            required.push(param.name.clone());
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": Value::Object(properties),
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Derive an output schema from a return descriptor, wrapping primitives,
/// sequences, and mappings that are not already object-typed with a single
/// `result` property and the `x-fastmcp-wrap-result` marker (spec §4.1).
/// Returns `(schema, wrapped)`.
pub fn derive_output_schema(return_type: &ParamType) -> (Value, bool) {
    let schema = return_type.to_schema();
    let already_object = schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.get("$ref").is_some()
        || schema.get("anyOf").is_some()
        || schema.get("oneOf").is_some()
        || schema.get("allOf").is_some();

    if already_object {
        (schema, false)
    } else {
        let wrapped = json!({
            "type": "object",
            "properties": { "result": schema },
            "required": ["result"],
            WRAP_RESULT_MARKER: true,
        });
        (wrapped, true)
    }
}
