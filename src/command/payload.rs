use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Text(String),
    Undecodable(Vec<u8>),
}

pub fn decode_text(raw: &[u8]) -> Decoded {
    match std::str::from_utf8(raw) {
        Ok(text) => Decoded::Text(text.to_string()),
        Err(_) => Decoded::Undecodable(raw.to_vec()),
    }
}

impl Decoded {
    pub fn to_lossy(&self) -> String {
        match self {
            Decoded::Text(text) => text.clone(),
            Decoded::Undecodable(raw) => String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoded::Text(text) => f.write_str(text),
            Decoded::Undecodable(raw) => write!(f, "<{} undecodable bytes>", raw.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(Value),
    Text(String),
    Undecodable(Vec<u8>),
}

pub fn decode_payload(raw: &[u8]) -> Payload {
    match decode_text(raw) {
        Decoded::Text(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Text(text),
        },
        Decoded::Undecodable(raw) => Payload::Undecodable(raw),
    }
}

impl Payload {
    fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Payload::Structured(Value::Object(map)) => map.get(key),
            _ => None,
        }
    }

    /// Integer field; numeric strings such as `"7"` are accepted too.
    pub fn int_field(&self, key: &str) -> Option<i64> {
        match self.field(key)? {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// List of strings; `Some(vec![])` when absent or null.
    pub fn string_list_field(&self, key: &str) -> Option<Vec<String>> {
        match self.field(key) {
            None | Some(Value::Null) => Some(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Structured(value) => write!(f, "{value}"),
            Payload::Text(text) => f.write_str(text),
            Payload::Undecodable(raw) => write!(f, "<{} undecodable bytes>", raw.len()),
        }
    }
}
