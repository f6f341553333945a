//! Dynamic Thrift values.
//!
//! Stands in for generated argument/result containers: a struct is an ordered
//! list of `(field id, value)` pairs, exactly as it appeared on the wire.

use bytes::Bytes;

use crate::protocol::types::TType;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    /// Thrift `string` and `binary` share one wire type.
    Binary(Bytes),
    Struct(Struct),
    Map(MapValue),
    Set(ListValue),
    List(ListValue),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Binary(Bytes::from(s.into()))
    }

    pub fn ttype(&self) -> TType {
        match self {
            Value::Bool(_) => TType::Bool,
            Value::Byte(_) => TType::Byte,
            Value::I16(_) => TType::I16,
            Value::I32(_) => TType::I32,
            Value::I64(_) => TType::I64,
            Value::Double(_) => TType::Double,
            Value::Binary(_) => TType::String,
            Value::Struct(_) => TType::Struct,
            Value::Map(_) => TType::Map,
            Value::Set(_) => TType::Set,
            Value::List(_) => TType::List,
        }
    }

    /// The value as UTF-8 text, if it is a binary holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Binary(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::I16(v) => Some(i64::from(*v)),
            Value::I32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Lossy JSON rendering for logs and the CLI.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Bool(v) => Json::from(*v),
            Value::Byte(v) => Json::from(*v),
            Value::I16(v) => Json::from(*v),
            Value::I32(v) => Json::from(*v),
            Value::I64(v) => Json::from(*v),
            Value::Double(v) => Json::from(*v),
            Value::Binary(b) => match std::str::from_utf8(b) {
                Ok(s) => Json::from(s),
                Err(_) => Json::from(b.to_vec()),
            },
            Value::Struct(s) => s.to_json(),
            Value::Set(l) | Value::List(l) => {
                Json::Array(l.items.iter().map(Value::to_json).collect())
            }
            Value::Map(m) => Json::Array(
                m.entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Value::Struct(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: i16,
    pub value: Value,
}

/// A struct payload in wire order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    fields: Vec<Field>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, id: i16, value: impl Into<Value>) -> Self {
        self.push(id, value);
        self
    }

    pub fn push(&mut self, id: i16, value: impl Into<Value>) {
        self.fields.push(Field {
            id,
            value: value.into(),
        });
    }

    pub fn field(&self, id: i16) -> Option<&Value> {
        self.fields.iter().find(|f| f.id == id).map(|f| &f.value)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|f| (f.id.to_string(), f.value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// List or set payload. The element type survives even when empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ListValue {
    pub elem_type: TType,
    pub items: Vec<Value>,
}

impl ListValue {
    pub fn new(elem_type: TType, items: Vec<Value>) -> Self {
        Self { elem_type, items }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapValue {
    pub key_type: TType,
    pub value_type: TType,
    pub entries: Vec<(Value, Value)>,
}

impl MapValue {
    pub fn new(key_type: TType, value_type: TType, entries: Vec<(Value, Value)>) -> Self {
        Self {
            key_type,
            value_type,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_field_lookup_and_json() {
        let s = Struct::new()
            .with(1, "Trustin")
            .with(2, Value::I32(3))
            .with(3, Value::Binary(Bytes::from_static(&[0xff, 0x00])));
        assert_eq!(s.field(1).and_then(Value::as_str), Some("Trustin"));
        assert_eq!(s.field(2).and_then(Value::as_i64), Some(3));
        assert!(s.field(9).is_none());

        let json = s.to_json();
        assert_eq!(json["1"], "Trustin");
        assert_eq!(json["2"], 3);
        assert_eq!(json["3"], serde_json::json!([255, 0]));
    }
}
