//! # CBOR Builder
//!
//! An append-only CBOR (Concise Binary Object Representation, RFC 7049 / RFC 8949)
//! encoder that writes every item into one contiguous buffer.
//!
//! ## Features
//! - Shortest-form integer arguments for all major types
//! - Shortest lossless float width (f16, f32 or f64), with configurable NaN
//!   and Infinity handling
//! - Canonical map ordering (length-first or bytewise lexicographic) done in
//!   place on the output buffer, without staging each entry separately
//! - Deferred-length byte strings, text strings and arrays whose header is
//!   patched once the payload has been written
//! - A sticky error channel: after the first failure every write is ignored
//!   and only the error comes back out
//! - Two front ends: the [`Encode`] trait and a `serde::Serializer`
//!
//! Only definite-length items are ever produced.
//!
//! ## Example
//! ```rust
//! use cbor_builder::{Builder, EncodeOptions, SortMode};
//!
//! let mut b = Builder::with_options(EncodeOptions::new().sort(SortMode::BytewiseLexical));
//! b.add_map(2, |m| {
//!     m.entry(|b| b.add_u8(3), |b| b.add_u8(4));
//!     m.entry(|b| b.add_u8(1), |b| b.add_u8(2));
//! });
//! assert_eq!(b.into_bytes().unwrap(), [0xa2, 0x01, 0x02, 0x03, 0x04]);
//! ```
//!
//! Serde types go through [`to_vec`]:
//! ```rust
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Point {
//!     y: f64,
//!     x: f64,
//! }
//!
//! let bytes = cbor_builder::to_vec(&Point { y: 1.5, x: 100000.0 }).unwrap();
//! // {"x": 100000.0, "y": 1.5}: keys sorted, floats shortened
//! assert_eq!(
//!     bytes,
//!     [0xa2, 0x61, b'x', 0xfa, 0x47, 0xc3, 0x50, 0x00, 0x61, b'y', 0xf9, 0x3e, 0x00]
//! );
//! ```

use serde::Serialize;

mod builder;
mod encode;
mod float;
mod map;
mod options;
mod ser;
pub mod tags;
pub mod value;

pub use builder::Builder;
pub use encode::Encode;
pub use float::{Precision, precision_from_f32};
pub use map::MapBuilder;
pub use options::{EncodeOptions, FloatMode, InfMode, NanMode, SortMode};
pub use ser::Compound;
pub use tags::{RawBytes, RawTag, Tagged};
pub use value::Value;

// CBOR major types
const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

// Additional info values
const INFO_UINT8: u8 = 24;
const INFO_UINT16: u8 = 25;
const INFO_UINT32: u8 = 26;
const INFO_UINT64: u8 = 27;
const FALSE: u8 = 20;
const TRUE: u8 = 21;
const NULL: u8 = 22;

/// Errors surfaced by [`Builder::into_bytes`] and the convenience functions.
///
/// Every variant is sticky: once a builder holds one, no further bytes are written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CborError {
    /// The output would grow past `EncodeOptions::max_len` or wrap `usize`.
    #[error("cbor: length overflow")]
    LengthOverflow,
    #[error("cbor: unsupported type: {0}")]
    UnsupportedType(String),
    #[error("cbor: invalid tag: {0}")]
    InvalidTag(String),
    #[error("cbor: invalid value: {0}")]
    InvalidValue(String),
    /// Raised by a caller through [`Builder::set_error`] or by a `Serialize` impl.
    #[error("cbor: {0}")]
    Message(String),
}

impl CborError {
    pub fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CborError::Message(msg.to_string())
    }
}

impl serde::ser::Error for CborError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CborError::Message(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CborError>;

pub mod error {
    pub use super::CborError as Error;
}

/// Encodes a value through its [`Encode`] impl with the default (canonical) options.
pub fn encode<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>> {
    encode_with_options(value, EncodeOptions::default())
}

pub fn encode_with_options<T: Encode + ?Sized>(
    value: &T,
    options: EncodeOptions,
) -> Result<Vec<u8>> {
    let mut builder = Builder::with_options(options);
    value.encode(&mut builder);
    builder.into_bytes()
}

/// Serializes a serde value with the default (canonical) options.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    to_vec_with_options(value, EncodeOptions::default())
}

pub fn to_vec_with_options<T: Serialize + ?Sized>(
    value: &T,
    options: EncodeOptions,
) -> Result<Vec<u8>> {
    let mut builder = Builder::with_options(options);
    builder.add_serialize(value);
    builder.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_bytes::ByteBuf;
    use std::collections::HashMap;

    #[derive(Debug, Serialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
        emails: Vec<String>,
    }

    #[test]
    fn test_basic_types() {
        assert_eq!(to_vec(&42u32).unwrap(), [0x18, 0x2a]);
        assert_eq!(to_vec(&-42i32).unwrap(), [0x38, 0x29]);
        assert_eq!(to_vec(&true).unwrap(), [0xf5]);
        assert_eq!(to_vec("hello").unwrap(), [0x65, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(encode(&42u32).unwrap(), to_vec(&42u32).unwrap());
    }

    #[test]
    fn test_struct_fields_are_sorted() {
        let person = Person {
            name: "Alice".to_string(),
            age: 30,
            emails: vec!["a@b.c".to_string()],
        };
        let encoded = to_vec(&person).unwrap();

        let mut expected = vec![0xa3];
        // "age" (4 bytes encoded) < "name" (5) < "emails" (7)
        expected.extend_from_slice(&[0x63, b'a', b'g', b'e', 0x18, 30]);
        expected.extend_from_slice(&[0x64, b'n', b'a', b'm', b'e', 0x65]);
        expected.extend_from_slice(b"Alice");
        expected.extend_from_slice(&[0x66, b'e', b'm', b'a', b'i', b'l', b's', 0x81, 0x65]);
        expected.extend_from_slice(b"a@b.c");
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_hashmap_is_deterministic() {
        let mut map = HashMap::new();
        for i in 0..32u32 {
            map.insert(format!("key{i}"), i);
        }
        let first = to_vec(&map).unwrap();

        let mut rebuilt = HashMap::new();
        for i in (0..32u32).rev() {
            rebuilt.insert(format!("key{i}"), i);
        }
        assert_eq!(first, to_vec(&rebuilt).unwrap());
        assert_eq!(first, encode(&rebuilt).unwrap());
    }

    #[test]
    fn test_tagged_datetime_string() {
        let tagged = Tagged::new(Some(tags::TAG_DATETIME_STRING), "2013-03-21T20:04:00Z");
        let buf = to_vec(&tagged).unwrap();

        // Tag 0 with small value is encoded as 0xC0 (major type 6, value 0)
        assert_eq!(buf[0], 0xC0);
        assert_eq!(buf[1], 0x74);
        assert_eq!(&buf[2..], b"2013-03-21T20:04:00Z");
        assert_eq!(buf, encode(&tagged).unwrap());
    }

    #[test]
    fn test_manual_tag_encoding() {
        let mut builder = Builder::new();
        builder.add_tag(100);
        builder.add_str("custom tagged value");
        let buf = builder.into_bytes().unwrap();

        // Tag 100 is encoded as 0xD8 0x64
        assert_eq!(buf[0], 0xD8);
        assert_eq!(buf[1], 100);
        assert_eq!(buf[2], (MAJOR_TEXT << 5) | 19);
    }

    #[test]
    fn test_large_byte_array_overhead() {
        // 1KB array: 1 byte major type + 2 bytes for length (1024 = 0x400)
        let data: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();
        let encoded = to_vec(&ByteBuf::from(data.clone())).unwrap();
        assert_eq!(encoded.len(), 1024 + 3);
        assert_eq!(encoded[0], (MAJOR_BYTES << 5) | INFO_UINT16);
        assert_eq!(encoded[1], 0x04);
        assert_eq!(encoded[2], 0x00);
        assert_eq!(&encoded[3..], &data[..]);

        // 100KB array: 1 byte major + 4 bytes for length
        let large: Vec<u8> = (0..102400).map(|i| (i % 256) as u8).collect();
        let encoded_large = to_vec(&ByteBuf::from(large)).unwrap();
        assert_eq!(encoded_large.len(), 102400 + 5);
        assert_eq!(encoded_large[0], (MAJOR_BYTES << 5) | INFO_UINT32);
    }

    #[test]
    fn test_vec_u8_as_array() {
        // Without serde_bytes, Vec<u8> serializes as an array
        let data: Vec<u8> = vec![1, 2, 3];
        let encoded = to_vec(&data).unwrap();
        assert_eq!(encoded, [(MAJOR_ARRAY << 5) | 3, 1, 2, 3]);

        let as_bytes = to_vec(&ByteBuf::from(data)).unwrap();
        assert_eq!(as_bytes, [(MAJOR_BYTES << 5) | 3, 1, 2, 3]);
    }

    #[test]
    fn test_custom_error_is_returned_instead_of_bytes() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(
                &self,
                _s: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("unsupported thing"))
            }
        }

        let err = to_vec(&(1u8, Broken)).unwrap_err();
        assert_eq!(err, CborError::Message("unsupported thing".to_string()));
        assert_eq!(err.to_string(), "cbor: unsupported thing");
    }

    #[test]
    fn test_max_len_is_enforced() {
        let opts = EncodeOptions::new().max_len(4);
        assert_eq!(to_vec_with_options("abc", opts).unwrap(), [0x63, b'a', b'b', b'c']);
        assert_eq!(
            to_vec_with_options("abcd", opts).unwrap_err(),
            CborError::LengthOverflow
        );
    }
}
