use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::descriptor::{Described, RecordDescriptor, TemporalKind, TypeDescriptor};

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unsupported type '{type_name}' at '{path}'")]
    UnsupportedType { type_name: String, path: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Field '{path}': {reason}")]
    Field { path: String, reason: String },

    #[error("Failed to deserialize: {0}")]
    Deserialize(String),
}

impl SchemaError {
    fn field(path: &str, reason: impl Into<String>) -> Self {
        Self::Field {
            path: display_path(path),
            reason: reason.into(),
        }
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

/// A JSON Schema document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JsonSchema(Value);

impl JsonSchema {
    /// Wrap an existing schema; it must be a JSON object
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        if !value.is_object() {
            return Err(SchemaError::field("", "schema must be a JSON object"));
        }
        Ok(Self(value))
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(Value::Object(map))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn is_object_schema(&self) -> bool {
        is_object_type(&self.0)
    }

    /// Same schema with `additionalProperties: false` on every object subschema
    /// that does not already declare it.
    pub fn strict(&self) -> JsonSchema {
        JsonSchema(strict_value(&self.0))
    }
}

fn is_object_type(node: &Value) -> bool {
    match node.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => node.get("properties").is_some(),
    }
}

fn strict_value(node: &Value) -> Value {
    match node {
        Value::Object(map) => {
            let mut result = Map::with_capacity(map.len() + 1);
            for (key, value) in map {
                let transformed = match key.as_str() {
                    // Map of subschemas keyed by property or definition name
                    "properties" | "$defs" | "definitions" | "patternProperties" => match value {
                        Value::Object(children) => Value::Object(
                            children
                                .iter()
                                .map(|(name, child)| (name.clone(), strict_value(child)))
                                .collect(),
                        ),
                        other => other.clone(),
                    },
                    "items" | "additionalProperties" | "not" => strict_value(value),
                    "anyOf" | "oneOf" | "allOf" | "prefixItems" => match value {
                        Value::Array(children) => {
                            Value::Array(children.iter().map(strict_value).collect())
                        }
                        other => other.clone(),
                    },
                    _ => value.clone(),
                };
                result.insert(key.clone(), transformed);
            }
            if is_object_type(node) && !result.contains_key("additionalProperties") {
                result.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}

/// Build the schema describing `T`
pub fn build_schema<T: Described>() -> Result<JsonSchema, SchemaError> {
    build_schema_for(&T::descriptor())
}

pub fn build_schema_for(descriptor: &TypeDescriptor) -> Result<JsonSchema, SchemaError> {
    let mut expanding = Vec::new();
    Ok(JsonSchema(render_descriptor(descriptor, "", &mut expanding)?))
}

fn render_descriptor(
    descriptor: &TypeDescriptor,
    path: &str,
    expanding: &mut Vec<&'static str>,
) -> Result<Value, SchemaError> {
    Ok(match descriptor {
        TypeDescriptor::Boolean => json!({"type": "boolean"}),
        TypeDescriptor::Integer { .. } => json!({"type": "integer"}),
        TypeDescriptor::Number => json!({"type": "number"}),
        TypeDescriptor::String | TypeDescriptor::Char => json!({"type": "string"}),
        TypeDescriptor::Enum { variants, .. } => json!({"type": "string", "enum": variants}),
        TypeDescriptor::Temporal(kind) => json!({"type": "string", "format": kind.format()}),
        TypeDescriptor::Array(items) => json!({
            "type": "array",
            "items": render_descriptor(items, &format!("{}[]", path), expanding)?,
        }),
        TypeDescriptor::Map(values) => json!({
            "type": "object",
            "additionalProperties": render_descriptor(values, &format!("{}{{}}", path), expanding)?,
        }),
        TypeDescriptor::Optional(inner) => render_descriptor(inner, path, expanding)?,
        TypeDescriptor::Record(record) => render_record(record, path, expanding)?,
        TypeDescriptor::Unsupported(name) => {
            return Err(SchemaError::UnsupportedType {
                type_name: (*name).to_string(),
                path: display_path(path),
            });
        }
    })
}

fn render_record(
    record: &RecordDescriptor,
    path: &str,
    expanding: &mut Vec<&'static str>,
) -> Result<Value, SchemaError> {
    // Already being expanded further up: self-referential structure
    if expanding.contains(&record.name) {
        return Ok(json!({"type": "object"}));
    }

    expanding.push(record.name);
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in (record.fields)() {
        let field_path = join(path, field.name);
        let mut schema = render_descriptor(&field.descriptor, &field_path, expanding)?;
        if let (Some(description), Value::Object(map)) = (field.description, &mut schema) {
            map.insert("description".to_string(), Value::String(description.to_string()));
        }
        if !field.descriptor.is_optional() {
            required.push(Value::String(field.name.to_string()));
        }
        properties.insert(field.name.to_string(), schema);
    }
    expanding.pop();

    Ok(json!({
        "type": "object",
        "properties": properties,
        "required": required,
    }))
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn found(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `value` against `descriptor` and return a normalized copy.
///
/// Absent optional record fields become explicit `null`, integral floats
/// become integers. Shape mismatches fail with the offending field path.
pub fn parse_value(value: &Value, descriptor: &TypeDescriptor) -> Result<Value, SchemaError> {
    conform(value, descriptor, "")
}

fn conform(value: &Value, descriptor: &TypeDescriptor, path: &str) -> Result<Value, SchemaError> {
    let mismatch = |expected: &str| {
        SchemaError::field(path, format!("expected {}, found {}", expected, found(value)))
    };

    match descriptor {
        TypeDescriptor::Optional(inner) => match value {
            Value::Null => Ok(Value::Null),
            _ => conform(value, inner, path),
        },
        TypeDescriptor::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(mismatch("boolean")),
        },
        TypeDescriptor::Integer { min, max } => {
            let Value::Number(n) = value else {
                return Err(mismatch("integer"));
            };
            let (integer, normalized) = if let Some(i) = n.as_i64() {
                (i128::from(i), value.clone())
            } else if let Some(u) = n.as_u64() {
                (i128::from(u), value.clone())
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i128, json!(f as i64)),
                    _ => return Err(SchemaError::field(path, format!("expected integer, found {}", n))),
                }
            };
            if integer < *min || integer > *max {
                return Err(SchemaError::field(
                    path,
                    format!("{} is outside the range {}..={}", integer, min, max),
                ));
            }
            Ok(normalized)
        }
        TypeDescriptor::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            _ => Err(mismatch("number")),
        },
        TypeDescriptor::String => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(mismatch("string")),
        },
        TypeDescriptor::Char => match value {
            Value::String(s) if s.chars().count() == 1 => Ok(value.clone()),
            Value::String(s) => Err(SchemaError::field(
                path,
                format!("expected a single character, found {} characters", s.chars().count()),
            )),
            _ => Err(mismatch("character")),
        },
        TypeDescriptor::Enum { name, variants } => match value {
            Value::String(s) if variants.contains(&s.as_str()) => Ok(value.clone()),
            Value::String(s) => Err(SchemaError::field(
                path,
                format!("'{}' is not a variant of {} (expected one of {:?})", s, name, variants),
            )),
            _ => Err(mismatch(&format!("enum {}", name))),
        },
        TypeDescriptor::Temporal(kind) => match value {
            Value::String(s) if temporal_matches(*kind, s) => Ok(value.clone()),
            Value::String(s) => Err(SchemaError::field(
                path,
                format!("'{}' is not a valid {}", s, kind.format()),
            )),
            _ => Err(mismatch(kind.format())),
        },
        TypeDescriptor::Array(items) => match value {
            Value::Array(elements) => elements
                .iter()
                .enumerate()
                .map(|(i, element)| conform(element, items, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Err(mismatch("array")),
        },
        TypeDescriptor::Map(values) => match value {
            Value::Object(entries) => entries
                .iter()
                .map(|(key, entry)| -> Result<(String, Value), SchemaError> {
                    Ok((key.clone(), conform(entry, values, &join(path, key))?))
                })
                .collect::<Result<Map<_, _>, _>>()
                .map(Value::Object),
            _ => Err(mismatch("object")),
        },
        TypeDescriptor::Record(record) => match value {
            Value::Object(entries) => {
                let mut normalized = Map::new();
                for field in (record.fields)() {
                    let field_path = join(path, field.name);
                    match entries.get(field.name) {
                        Some(entry) => {
                            normalized.insert(
                                field.name.to_string(),
                                conform(entry, &field.descriptor, &field_path)?,
                            );
                        }
                        None if field.descriptor.is_optional() => {
                            normalized.insert(field.name.to_string(), Value::Null);
                        }
                        None => {
                            return Err(SchemaError::field(&field_path, "missing required field"));
                        }
                    }
                }
                Ok(Value::Object(normalized))
            }
            _ => Err(mismatch(&format!("object {}", record.name))),
        },
        TypeDescriptor::Unsupported(name) => Err(SchemaError::UnsupportedType {
            type_name: (*name).to_string(),
            path: display_path(path),
        }),
    }
}

fn temporal_matches(kind: TemporalKind, s: &str) -> bool {
    match kind {
        TemporalKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        TemporalKind::Time => NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok(),
        TemporalKind::DateTime => DateTime::parse_from_rfc3339(s).is_ok(),
        TemporalKind::LocalDateTime => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok(),
    }
}

/// Parse a JSON payload into `T`, checking its shape field by field first
pub fn parse<T: Described + DeserializeOwned>(json: &str) -> Result<T, SchemaError> {
    let value: Value =
        serde_json::from_str(json.trim()).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
    parse_from_value(&value)
}

pub fn parse_from_value<T: Described + DeserializeOwned>(value: &Value) -> Result<T, SchemaError> {
    let normalized = parse_value(value, &T::descriptor())?;
    serde_json::from_value(normalized).map_err(|e| SchemaError::Deserialize(e.to_string()))
}

/// Render an instance as the JSON its schema describes
pub fn render<T: Serialize>(instance: &T) -> Result<String, SchemaError> {
    serde_json::to_string(instance).map_err(|e| SchemaError::Deserialize(e.to_string()))
}
