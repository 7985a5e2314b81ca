//! CBOR tags and pre-encoded content.

use serde::ser::SerializeTupleStruct;
use serde::{Serialize, Serializer};
use serde_bytes::Bytes;

use crate::builder::Builder;
use crate::encode::Encode;

// Standard tag numbers (RFC 8949 section 3.4)
pub const TAG_DATETIME_STRING: u64 = 0;
pub const TAG_EPOCH_DATETIME: u64 = 1;
pub const TAG_POSITIVE_BIGNUM: u64 = 2;
pub const TAG_NEGATIVE_BIGNUM: u64 = 3;
pub const TAG_DECIMAL_FRACTION: u64 = 4;
pub const TAG_BIGFLOAT: u64 = 5;
pub const TAG_ENCODED_CBOR: u64 = 24;
pub const TAG_URI: u64 = 32;
pub const TAG_BASE64URL: u64 = 33;
pub const TAG_BASE64: u64 = 34;
pub const TAG_MIME: u64 = 36;
pub const TAG_SELF_DESCRIBED: u64 = 55799;

// Names the serializer looks for to recognise tags and raw CBOR.
pub(crate) const TAGGED_NEWTYPE_NAME: &str = "\0cbor_builder::Tagged";
pub(crate) const RAW_NEWTYPE_NAME: &str = "\0cbor_builder::RawBytes";

/// A tagged CBOR value
///
/// Serialized through this crate the tag becomes a real CBOR tag header.
/// Other serializers see a two element tuple `(tag, value)`, or just the
/// value when `tag` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    /// The CBOR tag number (optional for compatibility)
    pub tag: Option<u64>,
    /// The tagged value
    pub value: T,
}

impl<T> Tagged<T> {
    /// Create a new tagged value
    pub fn new(tag: Option<u64>, value: T) -> Self {
        Tagged { tag, value }
    }
}

impl<T: Serialize> Serialize for Tagged<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.tag {
            Some(tag) => {
                let mut ts = serializer.serialize_tuple_struct(TAGGED_NEWTYPE_NAME, 2)?;
                ts.serialize_field(&tag)?;
                ts.serialize_field(&self.value)?;
                ts.end()
            }
            None => self.value.serialize(serializer),
        }
    }
}

impl<T: Encode> Encode for Tagged<T> {
    fn encode(&self, b: &mut Builder) {
        if let Some(tag) = self.tag {
            b.add_tag(tag);
        }
        self.value.encode(b);
    }
}

/// A tag number followed by content that is already CBOR encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    pub number: u64,
    pub content: Vec<u8>,
}

impl RawTag {
    pub fn new(number: u64, content: impl Into<Vec<u8>>) -> Self {
        RawTag {
            number,
            content: content.into(),
        }
    }
}

impl Serialize for RawTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ts = serializer.serialize_tuple_struct(TAGGED_NEWTYPE_NAME, 2)?;
        ts.serialize_field(&self.number)?;
        ts.serialize_field(&RawBytes::borrowed(&self.content))?;
        ts.end()
    }
}

impl Encode for RawTag {
    fn encode(&self, b: &mut Builder) {
        b.add_tag(self.number);
        b.add_raw_bytes(&self.content);
    }
}

/// Pre-encoded CBOR that is copied into the output unchanged.
///
/// The bytes must hold exactly one complete CBOR item; they are not checked.
/// Other serializers see a plain byte string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBytes(pub Vec<u8>);

impl RawBytes {
    fn borrowed(bytes: &[u8]) -> RawRef<'_> {
        RawRef(bytes)
    }
}

impl From<Vec<u8>> for RawBytes {
    fn from(bytes: Vec<u8>) -> Self {
        RawBytes(bytes)
    }
}

impl Serialize for RawBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        RawBytes::borrowed(&self.0).serialize(serializer)
    }
}

impl Encode for RawBytes {
    fn encode(&self, b: &mut Builder) {
        b.add_raw_bytes(&self.0);
    }
}

struct RawRef<'a>(&'a [u8]);

impl Serialize for RawRef<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(RAW_NEWTYPE_NAME, Bytes::new(self.0))
    }
}
