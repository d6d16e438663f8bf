//! Dynamically typed property values and the typed view over them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single property value as stored in a settings bag.
///
/// The enum is externally tagged when serialized, so every value carries its
/// own type marker (`{"int": 5}`, `{"text": "a"}`). That keeps mixed lists and
/// maps lossless through the JSON format as well as the binary one.
///
/// Floats compare as numbers, except that NaN equals NaN. JSON has no
/// spelling for NaN or infinity, so schemas refuse them (see
/// [`Value::is_finite`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    #[serde(rename = "uint")]
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// False when a NaN or infinite float appears anywhere inside.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            Value::Map(entries) => entries.values().all(Value::is_finite),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// Conversion between a Rust type and [`Value`].
///
/// `Default` doubles as the zero value returned for absent properties.
pub trait PropertyType: Sized + Clone + Default + Send + Sync + 'static {
    /// Name used in type mismatch errors.
    const KIND: &'static str;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;

    /// Whether `value` may be stored under a property of this type.
    /// `Null` is always accepted and reads back as the zero value.
    fn accepts(value: &Value) -> bool {
        value.is_null() || Self::from_value(value).is_some()
    }
}

impl PropertyType for Value {
    const KIND: &'static str = "value";

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl PropertyType for bool {
    const KIND: &'static str = "bool";

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

macro_rules! signed_property {
    ($($ty:ty),*) => {$(
        impl PropertyType for $ty {
            const KIND: &'static str = "int";

            fn into_value(self) -> Value {
                Value::Int(self as i64)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Int(n) => <$ty>::try_from(*n).ok(),
                    Value::UInt(n) => <$ty>::try_from(*n).ok(),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                v.into_value()
            }
        }
    )*};
}

macro_rules! unsigned_property {
    ($($ty:ty),*) => {$(
        impl PropertyType for $ty {
            const KIND: &'static str = "uint";

            fn into_value(self) -> Value {
                Value::UInt(self as u64)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::UInt(n) => <$ty>::try_from(*n).ok(),
                    Value::Int(n) => <$ty>::try_from(*n).ok(),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                v.into_value()
            }
        }
    )*};
}

signed_property!(i8, i16, i32, i64);
unsigned_property!(u8, u16, u32, u64, usize);

impl PropertyType for f64 {
    const KIND: &'static str = "float";

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PropertyType for String {
    const KIND: &'static str = "text";

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl<T: PropertyType> PropertyType for Vec<T> {
    const KIND: &'static str = "list";

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(PropertyType::into_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: PropertyType> PropertyType for BTreeMap<String, T> {
    const KIND: &'static str = "map";

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k.clone(), v)))
                .collect(),
            _ => None,
        }
    }
}

impl<T: PropertyType> PropertyType for Option<T> {
    const KIND: &'static str = "optional";

    fn into_value(self) -> Value {
        self.map(PropertyType::into_value).unwrap_or(Value::Null)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}
