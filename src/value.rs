use serde_json::{Number, Value as JsonValue};
use std::cmp::Ordering;
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Float(v) => exact_i64(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    // Equality used when matching join keys.
    pub fn key_eq(&self, other: &AttributeValue) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => false,
            (Bool(a), Bool(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => exact_i64(*b) == Some(*a),
            _ => false,
        }
    }

    // Hashable form of the value for key lookups, consistent with `key_eq`.
    pub(crate) fn join_key(&self) -> Option<JoinKey> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(v) => Some(JoinKey::Bool(*v)),
            AttributeValue::String(v) => Some(JoinKey::String(v.clone())),
            AttributeValue::Int(v) => Some(JoinKey::Int(*v)),
            AttributeValue::Float(v) if v.is_nan() => None,
            AttributeValue::Float(v) => Some(match exact_i64(*v) {
                Some(i) => JoinKey::Int(i),
                None => JoinKey::Number(v.to_bits()),
            }),
        }
    }

    // Order used to sort outer merges: booleans, then numbers by value,
    // then strings, then nulls and NaN.
    pub(crate) fn key_cmp(&self, other: &AttributeValue) -> Ordering {
        use AttributeValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ if self.sort_rank() == 1 && other.sort_rank() == 1 => {
                match (exact_i64_of(self), exact_i64_of(other)) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => self
                        .as_f64()
                        .partial_cmp(&other.as_f64())
                        .unwrap_or(Ordering::Equal),
                }
            }
            _ => self.sort_rank().cmp(&other.sort_rank()),
        }
    }

    fn sort_rank(&self) -> u8 {
        match self {
            AttributeValue::Bool(_) => 0,
            AttributeValue::Int(_) => 1,
            AttributeValue::Float(v) if !v.is_nan() => 1,
            AttributeValue::String(_) => 2,
            _ => 3,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::Null => JsonValue::Null,
            AttributeValue::Bool(v) => JsonValue::Bool(*v),
            AttributeValue::Int(v) => JsonValue::Number((*v).into()),
            AttributeValue::Float(v) => Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            AttributeValue::String(v) => JsonValue::String(v.clone()),
        }
    }
}

// Integral floats share the Int variant so that 2 and 2.0 hash alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum JoinKey {
    Bool(bool),
    Int(i64),
    Number(u64),
    String(String),
}

fn exact_i64_of(value: &AttributeValue) -> Option<i64> {
    match value {
        AttributeValue::Int(v) => Some(*v),
        AttributeValue::Float(v) => exact_i64(*v),
        _ => None,
    }
}

// The integer a float represents exactly, if it lies in i64 range.
fn exact_i64(v: f64) -> Option<i64> {
    // -2^63 and 2^63 as f64
    const MIN: f64 = -9_223_372_036_854_775_808.0;
    const MAX: f64 = 9_223_372_036_854_775_808.0;
    (v.fract() == 0.0 && (MIN..MAX).contains(&v)).then(|| v as i64)
}

impl From<&JsonValue> for AttributeValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => AttributeValue::Null,
            JsonValue::Bool(v) => AttributeValue::Bool(*v),
            JsonValue::Number(n) => match n.as_i64() {
                Some(v) => AttributeValue::Int(v),
                None => n
                    .as_f64()
                    .map(AttributeValue::Float)
                    .unwrap_or(AttributeValue::Null),
            },
            JsonValue::String(v) => AttributeValue::String(v.clone()),
            // nested values are kept as their compact JSON text
            JsonValue::Array(_) | JsonValue::Object(_) => AttributeValue::String(value.to_string()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::String(v) => write!(f, "{v}"),
        }
    }
}
