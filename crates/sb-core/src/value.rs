use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Top-level bindings produced by one script run.
pub type Bindings = BTreeMap<String, SbValue>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SbValue {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<SbValue>),
    Map(BTreeMap<String, SbValue>),
    Record(Record),
    /// An interpreter value with no host representation; holds its type name.
    Opaque(String),
}

impl SbValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Record(record) => record.type_name.as_str(),
            Self::Opaque(type_name) => type_name.as_str(),
        }
    }

    /// Converts into JSON, naming record fields by `tag`. Non-finite floats become `null`.
    pub fn to_json(&self, tag: &str) -> serde_json::Value {
        match self {
            Self::Unit | Self::Opaque(_) => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Int(value) => serde_json::Value::from(*value),
            Self::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(value) => serde_json::Value::String(value.clone()),
            Self::Array(values) => {
                serde_json::Value::Array(values.iter().map(|value| value.to_json(tag)).collect())
            }
            Self::Map(values) => serde_json::Value::Object(
                values
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json(tag)))
                    .collect(),
            ),
            Self::Record(record) => serde_json::Value::Object(
                record
                    .to_map(tag)
                    .into_iter()
                    .map(|(key, value)| (key, value.to_json(tag)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for SbValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Unit,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Int(value),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Self::String(value),
            serde_json::Value::Array(values) => {
                Self::Array(values.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(values) => Self::Map(
                values
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<()> for SbValue {
    fn from(_: ()) -> Self {
        Self::Unit
    }
}

impl From<bool> for SbValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SbValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SbValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SbValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SbValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SbValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<SbValue>> for SbValue {
    fn from(values: Vec<SbValue>) -> Self {
        Self::Array(values)
    }
}

impl From<BTreeMap<String, SbValue>> for SbValue {
    fn from(values: BTreeMap<String, SbValue>) -> Self {
        Self::Map(values)
    }
}

impl From<Record> for SbValue {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}
