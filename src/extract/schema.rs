//! Tool schemas: declaration, JSON-Schema rendering, and validation.
//!
//! The schema language is deliberately small (objects of named fields with
//! string/number/boolean/enum/array/object kinds) because that is the entire
//! surface the workflows' tool calls need. The validator collects *every*
//! violated field path rather than stopping at the first, so a failed
//! extraction can report exactly what the model got wrong.

use serde_json::{Value, json};

/// A complete tool declaration: name, description, and argument schema.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ToolSchema,
}

impl ToolSpec {
    pub fn new(name: &'static str, description: &'static str, schema: ToolSchema) -> Self {
        Self {
            name,
            description,
            schema,
        }
    }

    /// Render as an OpenAI-style function-tool declaration.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.schema.to_json_schema(),
            }
        })
    }
}

/// An object schema: a set of named fields.
#[derive(Clone, Debug, Default)]
pub struct ToolSchema {
    fields: Vec<FieldSpec>,
}

/// One field of an object schema.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

/// The accepted shape of a field value.
#[derive(Clone, Debug)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Closed set of string discriminants.
    Enum(&'static [&'static str]),
    Object(Vec<FieldSpec>),
    Array(Box<FieldKind>),
}

impl ToolSchema {
    #[must_use]
    pub fn object(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Required field shorthand.
    #[must_use]
    pub fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name,
            required: true,
            kind,
        }
    }

    /// Optional field shorthand.
    #[must_use]
    pub fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name,
            required: false,
            kind,
        }
    }

    /// Render as JSON Schema for the wire.
    pub fn to_json_schema(&self) -> Value {
        fields_to_json_schema(&self.fields)
    }

    /// Validate a payload, collecting every violated field path.
    ///
    /// Returns `Ok(())` or the full list of violations (e.g.
    /// `"concern.topic: missing required field"`).
    pub fn validate(&self, payload: &Value) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        validate_object(&self.fields, payload, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn fields_to_json_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.to_string(), kind_to_json_schema(&field.kind));
        if field.required {
            required.push(Value::String(field.name.to_string()));
        }
    }
    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": Value::Array(required),
        "additionalProperties": false,
    })
}

fn kind_to_json_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String => json!({"type": "string"}),
        FieldKind::Integer => json!({"type": "integer"}),
        FieldKind::Number => json!({"type": "number"}),
        FieldKind::Boolean => json!({"type": "boolean"}),
        FieldKind::Enum(variants) => json!({"type": "string", "enum": variants}),
        FieldKind::Object(fields) => fields_to_json_schema(fields),
        FieldKind::Array(inner) => json!({"type": "array", "items": kind_to_json_schema(inner)}),
    }
}

fn path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_object(fields: &[FieldSpec], payload: &Value, prefix: &str, out: &mut Vec<String>) {
    let Some(map) = payload.as_object() else {
        out.push(format!(
            "{}: expected object",
            if prefix.is_empty() { "$" } else { prefix }
        ));
        return;
    };
    for field in fields {
        let field_path = path(prefix, field.name);
        match map.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    out.push(format!("{field_path}: missing required field"));
                }
            }
            Some(value) => validate_kind(&field.kind, value, &field_path, out),
        }
    }
}

fn validate_kind(kind: &FieldKind, value: &Value, field_path: &str, out: &mut Vec<String>) {
    match kind {
        FieldKind::String => {
            if !value.is_string() {
                out.push(format!("{field_path}: expected string"));
            }
        }
        FieldKind::Integer => {
            if !value.is_i64() && !value.is_u64() {
                out.push(format!("{field_path}: expected integer"));
            }
        }
        FieldKind::Number => {
            if !value.is_number() {
                out.push(format!("{field_path}: expected number"));
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                out.push(format!("{field_path}: expected boolean"));
            }
        }
        FieldKind::Enum(variants) => match value.as_str() {
            Some(s) if variants.contains(&s) => {}
            Some(s) => out.push(format!(
                "{field_path}: `{s}` is not one of {variants:?}"
            )),
            None => out.push(format!("{field_path}: expected string enum")),
        },
        FieldKind::Object(fields) => validate_object(fields, value, field_path, out),
        FieldKind::Array(inner) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_kind(inner, item, &format!("{field_path}[{i}]"), out);
                }
            }
            None => out.push(format!("{field_path}: expected array")),
        },
    }
}
