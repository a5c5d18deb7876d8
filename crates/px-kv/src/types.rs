//! KV store data types
//!
//! Keys are validated UTF-8 strings. Values are JSON scalars and serialize
//! untagged, so a snapshot on disk is a plain `{"key": value}` object.

use crate::error::KvError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum key length in bytes
pub const MAX_KEY_LEN: usize = 256;

/// Key type for KV store (non-empty, max 256 bytes, case-sensitive)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KvKey(String);

impl KvKey {
    /// Create a new key, validating length constraints
    pub fn new(key: impl Into<String>) -> Result<Self, KvError> {
        let key = key.into();
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        if key.len() > MAX_KEY_LEN {
            return Err(KvError::KeyTooLong(key.len()));
        }
        Ok(Self(key))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for KvKey {
    type Error = KvError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KvKey> for String {
    fn from(key: KvKey) -> Self {
        key.0
    }
}

impl AsRef<str> for KvKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value types supported by the KV store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KvValue {
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// Unsigned integer above `i64::MAX`
    UInt(u64),
    /// 64-bit floating point (always finite)
    Float(f64),
    /// UTF-8 string
    String(String),
}

impl KvValue {
    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            KvValue::Bool(_) => "bool",
            KvValue::Int(_) | KvValue::UInt(_) => "int",
            KvValue::Float(_) => "float",
            KvValue::String(_) => "string",
        }
    }
}

impl TryFrom<serde_json::Value> for KvValue {
    type Error = KvError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Ok(KvValue::Bool(b)),
            Value::String(s) => Ok(KvValue::String(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(KvValue::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(KvValue::UInt(u))
                } else {
                    n.as_f64()
                        .map(KvValue::Float)
                        .ok_or_else(|| KvValue::invalid("number out of range"))
                }
            }
            Value::Null => Err(KvValue::invalid("null is not a storable value")),
            Value::Array(_) => Err(KvValue::invalid("arrays are not storable values")),
            Value::Object(_) => Err(KvValue::invalid("objects are not storable values")),
        }
    }
}

impl KvValue {
    fn invalid(reason: &str) -> KvError {
        KvError::InvalidValue(reason.to_string())
    }
}

impl From<KvValue> for serde_json::Value {
    fn from(value: KvValue) -> Self {
        match value {
            KvValue::Bool(b) => serde_json::Value::Bool(b),
            KvValue::Int(i) => serde_json::Value::from(i),
            KvValue::UInt(u) => serde_json::Value::from(u),
            KvValue::Float(f) => serde_json::Value::from(f),
            KvValue::String(s) => serde_json::Value::String(s),
        }
    }
}

impl From<String> for KvValue {
    fn from(value: String) -> Self {
        KvValue::String(value)
    }
}

impl From<&str> for KvValue {
    fn from(value: &str) -> Self {
        KvValue::String(value.to_string())
    }
}

impl From<i64> for KvValue {
    fn from(value: i64) -> Self {
        KvValue::Int(value)
    }
}

impl From<bool> for KvValue {
    fn from(value: bool) -> Self {
        KvValue::Bool(value)
    }
}
