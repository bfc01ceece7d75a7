use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PayloadError;

/// JSON object returned by the metadata service, with typed accessors that
/// fail explicitly instead of yielding null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a payload from an arbitrary JSON body.
    /// Objects are kept as-is, arrays are wrapped under `items`.
    /// Returns `None` for scalars and null.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Array(items) => {
                let mut map = Map::new();
                map.insert("items".to_string(), Value::Array(items));
                Some(Self(map))
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Result<&Value, PayloadError> {
        self.0
            .get(field)
            .ok_or_else(|| PayloadError::FieldMissing(field.to_string()))
    }

    pub fn get_str(&self, field: &str) -> Result<&str, PayloadError> {
        self.get(field)?
            .as_str()
            .ok_or_else(|| mismatch(field, "string"))
    }

    pub fn get_bool(&self, field: &str) -> Result<bool, PayloadError> {
        self.get(field)?
            .as_bool()
            .ok_or_else(|| mismatch(field, "boolean"))
    }

    pub fn get_u64(&self, field: &str) -> Result<u64, PayloadError> {
        self.get(field)?
            .as_u64()
            .ok_or_else(|| mismatch(field, "unsigned integer"))
    }

    pub fn get_array(&self, field: &str) -> Result<&Vec<Value>, PayloadError> {
        self.get(field)?
            .as_array()
            .ok_or_else(|| mismatch(field, "array"))
    }

    pub fn get_object(&self, field: &str) -> Result<&Map<String, Value>, PayloadError> {
        self.get(field)?
            .as_object()
            .ok_or_else(|| mismatch(field, "object"))
    }

    /// Leaf values keyed by dot-joined paths. Array elements use their index
    /// as the path segment: `{"a": {"b": [1]}}` -> `("a.b.0", 1)`.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            flatten_into(key.clone(), value, &mut out);
        }
        out
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

fn mismatch(field: &str, expected: &'static str) -> PayloadError {
    PayloadError::TypeMismatch {
        field: field.to_string(),
        expected,
    }
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(format!("{}.{}", prefix, key), nested, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, nested) in items.iter().enumerate() {
                flatten_into(format!("{}.{}", prefix, idx), nested, out);
            }
        }
        _ => out.push((prefix, value.clone())),
    }
}
