use serde_json::{Map, Value};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CoerceError {
    #[error("missing required argument '{0}'")]
    MissingRequired(String),
    #[error("argument '{field}' could not be coerced to {expected}: {value}")]
    TypeMismatch { field: String, expected: &'static str, value: String },
    #[error("unexpected argument shape: expected an object")]
    NotAnObject,
}

/// Coerce and validate `args` against `schema` (spec §4.1: "arguments are
/// coerced... by default; failed coercion raises a validation error"). When
/// `strict` is true, coercion is disabled entirely and only already-typed
/// values are accepted — this is the server-level `strict_input_validation`
/// flag.
pub fn validate_and_coerce(schema: &Value, args: Value, strict: bool) -> Result<Value, CoerceError> {
    let Value::Object(mut args_map) = args else {
        return Err(CoerceError::NotAnObject);
    };

    let properties = schema.get("properties").and_then(Value::as_object);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for field in &required {
        if !args_map.contains_key(*field) {
            return Err(CoerceError::MissingRequired(field.to_string()));
        }
    }

    if let Some(properties) = properties {
        let mut coerced = Map::new();
        for (key, value) in std::mem::take(&mut args_map) {
            let coerced_value = match properties.get(&key) {
                Some(prop_schema) if !strict => coerce_value(&key, value, prop_schema)?,
                _ => value,
            };
            coerced.insert(key, coerced_value);
        }
        args_map = coerced;
    }

    Ok(Value::Object(args_map))
}

fn coerce_value(field: &str, value: Value, prop_schema: &Value) -> Result<Value, CoerceError> {
    let Some(value_type) = prop_schema.get("type").and_then(Value::as_str) else {
        return Ok(value);
    };
    let format = prop_schema.get("format").and_then(Value::as_str);

    match (value_type, &value) {
        ("integer", Value::String(s)) => s
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| type_mismatch(field, "integer", &value)),
        ("number", Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| type_mismatch(field, "number", &value)),
        ("boolean", Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(type_mismatch(field, "boolean", &value)),
        },
        ("string", Value::String(s)) => match format {
            Some("date") => {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|_| value.clone())
                    .map_err(|_| type_mismatch(field, "date", &value))
            }
            Some("date-time") => chrono::DateTime::parse_from_rfc3339(s)
                .map(|_| value.clone())
                .map_err(|_| type_mismatch(field, "date-time", &value)),
            Some("uuid") => uuid::Uuid::parse_str(s)
                .map(|_| value.clone())
                .map_err(|_| type_mismatch(field, "uuid", &value)),
            Some("path") => {
                if s.is_empty() {
                    Err(type_mismatch(field, "path", &value))
                } else {
                    Ok(value.clone())
                }
            }
            _ => Ok(value),
        },
        ("array", Value::Array(items)) => {
            let item_schema = prop_schema.get("items");
            let coerced: Result<Vec<Value>, CoerceError> = items
                .into_iter()
                .map(|item| match item_schema {
                    Some(item_schema) => coerce_value(field, item.clone(), item_schema),
                    None => Ok(item.clone()),
                })
                .collect();
            Ok(Value::Array(coerced?))
        }
        _ => Ok(value),
    }
}

fn type_mismatch(field: &str, expected: &'static str, value: &Value) -> CoerceError {
    CoerceError::TypeMismatch { field: field.to_string(), expected, value: value.to_string() }
}
