//! # JSON Schema
//!
//! A compiled subset of JSON Schema. Compilation checks keyword shapes once
//! so validation never has to fail on the schema itself.
//!
//! Supported keywords: `type`, `required`, `properties`,
//! `additionalProperties`, `items`, `enum`, `const`, `minimum`, `maximum`,
//! `exclusiveMinimum`, `exclusiveMaximum`, `minLength`, `maxLength`,
//! `pattern`, `minItems`, `maxItems`. Anything else (`$schema`, `title`,
//! `description`, ...) is ignored.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult, ValidationDetails, ROOT_PATH};

// ==================
// Types
// ==================

/// JSON type names as they appear in `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => JsonType::Null,
            "boolean" => JsonType::Boolean,
            "integer" => JsonType::Integer,
            "number" => JsonType::Number,
            "string" => JsonType::String,
            "array" => JsonType::Array,
            "object" => JsonType::Object,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// `integer` also accepts numbers with no fractional part, and
    /// `number` accepts integers.
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (JsonType::Null, Value::Null) => true,
            (JsonType::Boolean, Value::Bool(_)) => true,
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            (JsonType::String, Value::String(_)) => true,
            (JsonType::Array, Value::Array(_)) => true,
            (JsonType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
enum Additional {
    Allow,
    Deny,
    Schema(Box<Node>),
}

#[derive(Debug, Clone)]
struct Bound {
    limit: f64,
    exclusive: bool,
}

/// One compiled (sub)schema
#[derive(Debug, Clone)]
struct Node {
    /// `false` schema rejects everything
    reject_all: bool,
    types: Option<Vec<JsonType>>,
    required: Vec<String>,
    properties: BTreeMap<String, Node>,
    additional: Additional,
    items: Option<Box<Node>>,
    enum_values: Option<Vec<Value>>,
    const_value: Option<Value>,
    lower: Option<Bound>,
    upper: Option<Bound>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    pattern: Option<(String, Regex)>,
    min_items: Option<u64>,
    max_items: Option<u64>,
}

impl Node {
    fn permissive() -> Self {
        Self {
            reject_all: false,
            types: None,
            required: Vec::new(),
            properties: BTreeMap::new(),
            additional: Additional::Allow,
            items: None,
            enum_values: None,
            const_value: None,
            lower: None,
            upper: None,
            min_length: None,
            max_length: None,
            pattern: None,
            min_items: None,
            max_items: None,
        }
    }
}

/// A schema ready to validate documents
#[derive(Debug, Clone)]
pub struct JsonSchema {
    root: Node,
}

// ==================
// Compilation
// ==================

impl JsonSchema {
    /// Compile a schema document
    pub fn compile(schema: &Value) -> SchemaResult<Self> {
        Ok(Self {
            root: compile_node(schema, ROOT_PATH)?,
        })
    }

    /// Parse and compile raw schema bytes
    pub fn from_slice(bytes: &[u8]) -> SchemaResult<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| SchemaError::MalformedJson(e.to_string()))?;
        Self::compile(&value)
    }

    /// Validate `document`, returning the first violation found
    pub fn validate(&self, document: &Value) -> Result<(), ValidationDetails> {
        validate_node(&self.root, document, ROOT_PATH)
    }
}

fn compile_node(schema: &Value, at: &str) -> SchemaResult<Node> {
    let obj = match schema {
        Value::Bool(true) => return Ok(Node::permissive()),
        Value::Bool(false) => {
            return Ok(Node {
                reject_all: true,
                ..Node::permissive()
            })
        }
        Value::Object(obj) => obj,
        other => {
            return Err(SchemaError::invalid_schema(format!(
                "{}: schema must be an object or boolean, got {}",
                at,
                type_of(other)
            )))
        }
    };

    let mut node = Node::permissive();

    if let Some(t) = obj.get("type") {
        node.types = Some(compile_types(t, at)?);
    }

    if let Some(required) = obj.get("required") {
        let list = required
            .as_array()
            .ok_or_else(|| keyword_error(at, "required", "an array of strings"))?;
        for name in list {
            let name = name
                .as_str()
                .ok_or_else(|| keyword_error(at, "required", "an array of strings"))?;
            node.required.push(name.to_string());
        }
    }

    if let Some(props) = obj.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| keyword_error(at, "properties", "an object"))?;
        for (name, sub) in props {
            node.properties
                .insert(name.clone(), compile_node(sub, &child_path(at, name))?);
        }
    }

    if let Some(additional) = obj.get("additionalProperties") {
        node.additional = match additional {
            Value::Bool(true) => Additional::Allow,
            Value::Bool(false) => Additional::Deny,
            other => Additional::Schema(Box::new(compile_node(other, at)?)),
        };
    }

    if let Some(items) = obj.get("items") {
        node.items = Some(Box::new(compile_node(items, at)?));
    }

    if let Some(values) = obj.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| keyword_error(at, "enum", "an array"))?;
        node.enum_values = Some(values.clone());
    }

    node.const_value = obj.get("const").cloned();

    node.lower = compile_bound(obj, at, "minimum", "exclusiveMinimum")?;
    node.upper = compile_bound(obj, at, "maximum", "exclusiveMaximum")?;

    node.min_length = compile_count(obj, at, "minLength")?;
    node.max_length = compile_count(obj, at, "maxLength")?;
    node.min_items = compile_count(obj, at, "minItems")?;
    node.max_items = compile_count(obj, at, "maxItems")?;

    if let Some(pattern) = obj.get("pattern") {
        let source = pattern
            .as_str()
            .ok_or_else(|| keyword_error(at, "pattern", "a string"))?;
        let regex = Regex::new(source).map_err(|e| {
            SchemaError::invalid_schema(format!("{}: bad pattern '{}': {}", at, source, e))
        })?;
        node.pattern = Some((source.to_string(), regex));
    }

    Ok(node)
}

fn compile_types(t: &Value, at: &str) -> SchemaResult<Vec<JsonType>> {
    let names: Vec<&Value> = match t {
        Value::String(_) => vec![t],
        Value::Array(list) if !list.is_empty() => list.iter().collect(),
        _ => return Err(keyword_error(at, "type", "a type name or a list of them")),
    };
    names
        .into_iter()
        .map(|name| {
            name.as_str()
                .and_then(JsonType::parse)
                .ok_or_else(|| {
                    SchemaError::invalid_schema(format!("{}: unknown type {}", at, name))
                })
        })
        .collect()
}

/// Handles both the numeric (draft 6+) and boolean (draft 4) forms of
/// `exclusiveMinimum`/`exclusiveMaximum`.
fn compile_bound(
    obj: &Map<String, Value>,
    at: &str,
    inclusive_key: &str,
    exclusive_key: &str,
) -> SchemaResult<Option<Bound>> {
    let inclusive = match obj.get(inclusive_key) {
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| keyword_error(at, inclusive_key, "a number"))?,
        ),
        None => None,
    };

    match obj.get(exclusive_key) {
        None => Ok(inclusive.map(|limit| Bound {
            limit,
            exclusive: false,
        })),
        Some(Value::Bool(flag)) => Ok(inclusive.map(|limit| Bound {
            limit,
            exclusive: *flag,
        })),
        Some(Value::Number(n)) => {
            let exclusive = n.as_f64().unwrap_or_default();
            // Both present: keep whichever is stricter
            let bound = match inclusive {
                Some(limit) if inclusive_key == "minimum" && limit > exclusive => Bound {
                    limit,
                    exclusive: false,
                },
                Some(limit) if inclusive_key == "maximum" && limit < exclusive => Bound {
                    limit,
                    exclusive: false,
                },
                _ => Bound {
                    limit: exclusive,
                    exclusive: true,
                },
            };
            Ok(Some(bound))
        }
        Some(_) => Err(keyword_error(at, exclusive_key, "a number")),
    }
}

fn compile_count(obj: &Map<String, Value>, at: &str, key: &str) -> SchemaResult<Option<u64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| keyword_error(at, key, "a non-negative integer")),
    }
}

fn keyword_error(at: &str, keyword: &str, expected: &str) -> SchemaError {
    SchemaError::invalid_schema(format!("{}: '{}' must be {}", at, keyword, expected))
}

fn child_path(parent: &str, child: &str) -> String {
    if parent == ROOT_PATH {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

// ==================
// Validation
// ==================

fn validate_node(node: &Node, value: &Value, path: &str) -> Result<(), ValidationDetails> {
    if node.reject_all {
        return Err(ValidationDetails::new(path, "False always fails validation"));
    }

    if let Some(types) = &node.types {
        if !types.iter().any(|t| t.matches(value)) {
            let expected = types
                .iter()
                .map(JsonType::as_str)
                .collect::<Vec<_>>()
                .join("/");
            return Err(ValidationDetails::type_mismatch(path, &expected, type_of(value)));
        }
    }

    if let Some(values) = &node.enum_values {
        if !values.iter().any(|v| json_equal(v, value)) {
            let allowed = values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ValidationDetails::new(
                path,
                format!("{} must be one of the following: {}", leaf(path), allowed),
            ));
        }
    }

    if let Some(expected) = &node.const_value {
        if !json_equal(expected, value) {
            return Err(ValidationDetails::new(
                path,
                format!("{} does not match: {}", leaf(path), expected),
            ));
        }
    }

    match value {
        Value::Number(n) => validate_number(node, n.as_f64().unwrap_or_default(), path),
        Value::String(s) => validate_string(node, s, path),
        Value::Array(items) => validate_array(node, items, path),
        Value::Object(obj) => validate_object(node, obj, path),
        _ => Ok(()),
    }
}

fn validate_number(node: &Node, n: f64, path: &str) -> Result<(), ValidationDetails> {
    if let Some(bound) = &node.lower {
        let ok = if bound.exclusive { n > bound.limit } else { n >= bound.limit };
        if !ok {
            let relation = if bound.exclusive { "greater than" } else { "greater than or equal to" };
            return Err(ValidationDetails::new(
                path,
                format!("Must be {} {}", relation, format_number(bound.limit)),
            ));
        }
    }
    if let Some(bound) = &node.upper {
        let ok = if bound.exclusive { n < bound.limit } else { n <= bound.limit };
        if !ok {
            let relation = if bound.exclusive { "less than" } else { "less than or equal to" };
            return Err(ValidationDetails::new(
                path,
                format!("Must be {} {}", relation, format_number(bound.limit)),
            ));
        }
    }
    Ok(())
}

fn validate_string(node: &Node, s: &str, path: &str) -> Result<(), ValidationDetails> {
    let length = s.chars().count() as u64;
    if let Some(min) = node.min_length {
        if length < min {
            return Err(ValidationDetails::new(
                path,
                format!("String length must be greater than or equal to {}", min),
            ));
        }
    }
    if let Some(max) = node.max_length {
        if length > max {
            return Err(ValidationDetails::new(
                path,
                format!("String length must be less than or equal to {}", max),
            ));
        }
    }
    if let Some((source, regex)) = &node.pattern {
        if !regex.is_match(s) {
            return Err(ValidationDetails::new(
                path,
                format!("Does not match pattern '{}'", source),
            ));
        }
    }
    Ok(())
}

fn validate_array(node: &Node, items: &[Value], path: &str) -> Result<(), ValidationDetails> {
    let count = items.len() as u64;
    if let Some(min) = node.min_items {
        if count < min {
            return Err(ValidationDetails::new(
                path,
                format!("Array must have at least {} items", min),
            ));
        }
    }
    if let Some(max) = node.max_items {
        if count > max {
            return Err(ValidationDetails::new(
                path,
                format!("Array must have at most {} items", max),
            ));
        }
    }
    if let Some(item_schema) = &node.items {
        for (i, item) in items.iter().enumerate() {
            validate_node(item_schema, item, &child_path(path, &i.to_string()))?;
        }
    }
    Ok(())
}

fn validate_object(
    node: &Node,
    obj: &Map<String, Value>,
    path: &str,
) -> Result<(), ValidationDetails> {
    for name in &node.required {
        if !obj.contains_key(name) {
            return Err(ValidationDetails::missing_field(path, name));
        }
    }

    for (name, value) in obj {
        let child = child_path(path, name);
        match node.properties.get(name) {
            Some(sub) => validate_node(sub, value, &child)?,
            None => match &node.additional {
                Additional::Allow => {}
                Additional::Deny => {
                    return Err(ValidationDetails::additional_property(path, name));
                }
                Additional::Schema(sub) => validate_node(sub, value, &child)?,
            },
        }
    }
    Ok(())
}

/// Numeric equality ignores representation (`1` equals `1.0`)
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |other| json_equal(v, other)))
        }
        _ => a == b,
    }
}

fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
