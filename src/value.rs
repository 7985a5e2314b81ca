use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::builder::Builder;
use crate::encode::Encode;
use crate::tags::Tagged;

/// Dynamic CBOR value type for building untyped CBOR data
///
/// Maps keep their entries in insertion order; the builder applies the
/// configured key ordering when the value is encoded.
///
/// # Example
/// ```
/// use cbor_builder::{Value, encode};
///
/// let value = Value::Map(vec![
///     (Value::from("name"), Value::from("Alice")),
///     (Value::from("age"), Value::from(30)),
/// ]);
///
/// let bytes = encode(&value).unwrap();
/// // "age" is shorter than "name" once encoded, so it comes first
/// assert_eq!(&bytes[..5], &[0xa2, 0x63, b'a', b'g', b'e']);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value; anything outside the 64-bit range is written as a bignum
    Integer(i128),
    /// Floating point value
    Float(f64),
    /// Single precision float, kept apart so it is never widened
    Float32(f32),
    /// Byte string
    Bytes(Vec<u8>),
    /// Text string
    Text(String),
    /// Array of values
    Array(Vec<Value>),
    /// Map entries in insertion order
    Map(Vec<(Value, Value)>),
    /// Tagged value (tag number, boxed content)
    Tag(u64, Box<Value>),
}

impl Encode for Value {
    fn encode(&self, b: &mut Builder) {
        match self {
            Value::Null => b.add_nil(),
            Value::Bool(v) => b.add_bool(*v),
            Value::Integer(v) => b.add_i128(*v),
            Value::Float(v) => b.add_f64(*v),
            Value::Float32(v) => b.add_f32(*v),
            Value::Bytes(v) => b.add_bytes(v),
            Value::Text(v) => b.add_str(v),
            Value::Array(items) => b.add_array(items.len() as u64, |b| {
                for item in items {
                    item.encode(b);
                }
            }),
            Value::Map(entries) => b.add_map(entries.len(), |m| {
                for (k, v) in entries {
                    m.pair(k, v);
                }
            }),
            Value::Tag(tag, content) => {
                b.add_tag(*tag);
                content.encode(b);
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => {
                if let Ok(v) = i64::try_from(*i) {
                    serializer.serialize_i64(v)
                } else if let Ok(v) = u64::try_from(*i) {
                    serializer.serialize_u64(v)
                } else {
                    serializer.serialize_i128(*i)
                }
            }
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Float32(f) => serializer.serialize_f32(*f),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Array(a) => a.serialize(serializer),
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Tag(tag, content) => Tagged::new(Some(*tag), content).serialize(serializer),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    /// True for both float widths.
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_) | Value::Float32(_))
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Value::Bytes(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Value::Tag(..))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// `None` when the value is not an integer or does not fit.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|i| i64::try_from(i).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Float32(f) => Some(*f as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m.as_slice()),
            _ => None,
        }
    }

    /// Looks up a text key in a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn as_tag(&self) -> Option<(u64, &Value)> {
        match self {
            Value::Tag(tag, value) => Some((*tag, value.as_ref())),
            _ => None,
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty)*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(v as i128)
                }
            }
        )*
    };
}

value_from_int!(u8 u16 u32 u64 usize i8 i16 i32 i64 isize i128);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
