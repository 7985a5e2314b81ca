use serde::Serialize;
use serde::ser::{
    SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
    SerializeTupleStruct, SerializeTupleVariant,
};

use crate::builder::{Builder, Deferred};
use crate::map::MapFrame;
use crate::tags::{RAW_NEWTYPE_NAME, TAGGED_NEWTYPE_NAME};
use crate::{CborError, MAJOR_ARRAY, MAJOR_MAP, Result};

impl<'a> serde::Serializer for &'a mut Builder {
    type Ok = ();
    type Error = CborError;
    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = Compound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.add_bool(v);
        self.status()
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.add_i64(v);
        self.status()
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.add_i128(v);
        self.status()
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.add_u64(v);
        self.status()
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.add_u128(v);
        self.status()
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.add_f32(v);
        self.status()
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.add_f64(v);
        self.status()
    }

    fn serialize_char(self, v: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.add_str(v);
        self.status()
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.add_bytes(v);
        self.status()
    }

    fn serialize_none(self) -> Result<()> {
        self.add_nil();
        self.status()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.serialize_none()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<()> {
        if name == RAW_NEWTYPE_NAME {
            let offset = self.len();
            value.serialize(&mut *self)?;
            self.unwrap_byte_string(offset);
            return self.status();
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.add_uint(MAJOR_MAP, 1);
        self.add_str(variant);
        value.serialize(&mut *self)?;
        self.status()
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Compound<'a>> {
        let deferred = match len {
            Some(len) => {
                self.add_uint(MAJOR_ARRAY, len as u64);
                None
            }
            None => self.begin_deferred(MAJOR_ARRAY),
        };
        self.status()?;
        Ok(Compound {
            builder: self,
            state: State::Seq { deferred, count: 0 },
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Compound<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, name: &'static str, len: usize) -> Result<Compound<'a>> {
        if name == TAGGED_NEWTYPE_NAME {
            self.status()?;
            return Ok(Compound {
                builder: self,
                state: State::Tag { fields: 0 },
            });
        }
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Compound<'a>> {
        self.add_uint(MAJOR_MAP, 1);
        self.add_str(variant);
        self.serialize_seq(Some(len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Compound<'a>> {
        let deferred = match len {
            Some(len) => {
                self.add_uint(MAJOR_MAP, len as u64);
                None
            }
            None => self.begin_deferred(MAJOR_MAP),
        };
        self.status()?;
        let frame = self.open_map(len.unwrap_or(0));
        self.status()?;
        Ok(Compound {
            builder: self,
            state: State::Map { frame, deferred },
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Compound<'a>> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Compound<'a>> {
        self.add_uint(MAJOR_MAP, 1);
        self.add_str(variant);
        self.serialize_map(Some(len))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// State of an array, map or tag being serialized into a [`Builder`].
pub struct Compound<'a> {
    builder: &'a mut Builder,
    state: State,
}

enum State {
    /// `deferred` holds the header slot when the length was not given up front.
    Seq { deferred: Option<Deferred>, count: u64 },
    Map { frame: MapFrame, deferred: Option<Deferred> },
    /// A `Tagged` value: field 0 is the tag number, field 1 the content.
    Tag { fields: usize },
}

impl Compound<'_> {
    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        match &mut self.state {
            State::Seq { count, .. } => {
                value.serialize(&mut *self.builder)?;
                *count += 1;
                Ok(())
            }
            State::Tag { fields } => {
                let offset = self.builder.len();
                match *fields {
                    0 => {
                        value.serialize(&mut *self.builder)?;
                        self.builder.retag_uint_header(offset);
                    }
                    1 => value.serialize(&mut *self.builder)?,
                    _ => self.builder.set_error(CborError::InvalidTag(
                        "a tag holds exactly one item".to_string(),
                    )),
                }
                *fields += 1;
                self.builder.status()
            }
            State::Map { .. } => Err(CborError::InvalidValue(
                "map entries need a key and a value".to_string(),
            )),
        }
    }

    fn key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        let State::Map { frame, .. } = &mut self.state else {
            return Err(CborError::InvalidValue("key outside of a map".to_string()));
        };
        self.builder.begin_entry(frame);
        key.serialize(&mut *self.builder)?;
        self.builder.end_key(frame);
        Ok(())
    }

    fn value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let State::Map { frame, .. } = &self.state else {
            return Err(CborError::InvalidValue("value outside of a map".to_string()));
        };
        value.serialize(&mut *self.builder)?;
        self.builder.end_entry(frame);
        self.builder.status()
    }

    fn finish(self) -> Result<()> {
        let Compound { builder, state } = self;
        match state {
            State::Seq {
                deferred: Some(deferred),
                count,
            } => builder.finish_deferred(MAJOR_ARRAY, deferred, count),
            State::Seq { deferred: None, .. } => {}
            State::Map { frame, deferred } => {
                let count = builder.close_map(frame);
                if let Some(deferred) = deferred {
                    builder.finish_deferred(MAJOR_MAP, deferred, count as u64);
                }
            }
            State::Tag { fields } => {
                if fields != 2 {
                    builder.set_error(CborError::InvalidTag(
                        "a tag needs a number and an item".to_string(),
                    ));
                }
            }
        }
        builder.status()
    }
}

impl SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = CborError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = CborError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl SerializeMap for Compound<'_> {
    type Ok = ();
    type Error = CborError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.key(key)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.value(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.key(key)?;
        self.value(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.key(key)?;
        self.value(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{EncodeOptions, SortMode};
    use crate::to_vec;
    use crate::to_vec_with_options;
    use serde::Serializer;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(u8),
        Line(u8, u8),
        Rect { w: u8, h: u8 },
    }

    #[test]
    fn test_enum_variants() {
        assert_eq!(to_vec(&Shape::Empty).unwrap(), [0x65, b'E', b'm', b'p', b't', b'y']);
        assert_eq!(
            to_vec(&Shape::Circle(3)).unwrap(),
            [0xa1, 0x66, b'C', b'i', b'r', b'c', b'l', b'e', 0x03]
        );
        assert_eq!(
            to_vec(&Shape::Line(1, 2)).unwrap(),
            [0xa1, 0x64, b'L', b'i', b'n', b'e', 0x82, 0x01, 0x02]
        );
        // Fields come out sorted: "h" before "w"
        assert_eq!(
            to_vec(&Shape::Rect { w: 4, h: 5 }).unwrap(),
            [0xa1, 0x64, b'R', b'e', b'c', b't', 0xa2, 0x61, b'h', 0x05, 0x61, b'w', 0x04]
        );
    }

    #[test]
    fn test_unit_and_option() {
        #[derive(Serialize)]
        struct Marker;
        assert_eq!(to_vec(&()).unwrap(), [0xf6]);
        assert_eq!(to_vec(&Marker).unwrap(), [0xf6]);
        assert_eq!(to_vec(&None::<u8>).unwrap(), [0xf6]);
        assert_eq!(to_vec(&Some("")).unwrap(), [0x60]);
        assert_eq!(to_vec(&'ß').unwrap(), [0x62, 0xc3, 0x9f]);
    }

    #[test]
    fn test_wide_integers() {
        assert_eq!(to_vec(&u128::MAX).unwrap()[..2], [0xc2, 0x50]);
        assert_eq!(to_vec(&-1i128).unwrap(), [0x20]);
    }

    #[test]
    fn test_unsorted_struct_keeps_field_order() {
        #[derive(Serialize)]
        struct Pair {
            zz: u8,
            a: u8,
        }
        let opts = EncodeOptions::new().sort(SortMode::Unsorted);
        assert_eq!(
            to_vec_with_options(&Pair { zz: 1, a: 2 }, opts).unwrap(),
            [0xa2, 0x62, b'z', b'z', 0x01, 0x61, b'a', 0x02]
        );
    }

    #[test]
    fn test_seq_without_length() {
        let mut b = Builder::new();
        let mut seq = (&mut b).serialize_seq(None).unwrap();
        for i in 0..24u8 {
            SerializeSeq::serialize_element(&mut seq, &i).unwrap();
        }
        SerializeSeq::end(seq).unwrap();
        let out = b.into_bytes().unwrap();
        assert_eq!(&out[..2], &[0x98, 0x18]);
        assert_eq!(out.len(), 2 + 24);
    }

    #[test]
    fn test_map_without_length() {
        let mut b = Builder::new();
        let mut map = (&mut b).serialize_map(None).unwrap();
        map.serialize_entry("bb", &1u8).unwrap();
        map.serialize_entry("a", &2u8).unwrap();
        SerializeMap::end(map).unwrap();
        assert_eq!(
            b.into_bytes().unwrap(),
            [0xa2, 0x61, b'a', 0x02, 0x62, b'b', b'b', 0x01]
        );
    }

    #[test]
    fn test_nested_maps_sort_independently() {
        let mut inner = BTreeMap::new();
        inner.insert("yy", 1u8);
        inner.insert("x", 2u8);
        let mut outer = BTreeMap::new();
        outer.insert("b", inner.clone());
        outer.insert("a", inner);
        let out = to_vec(&outer).unwrap();
        let inner_bytes = [0xa2, 0x61, b'x', 0x02, 0x62, b'y', b'y', 0x01];
        let mut expected = vec![0xa2, 0x61, b'a'];
        expected.extend_from_slice(&inner_bytes);
        expected.extend_from_slice(&[0x61, b'b']);
        expected.extend_from_slice(&inner_bytes);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_serializer_stops_after_error() {
        let mut b = Builder::with_options(EncodeOptions::new().max_len(2));
        let err = (&mut b).serialize_str("too long").unwrap_err();
        assert_eq!(err, CborError::LengthOverflow);
        assert_eq!((&mut b).serialize_u8(1).unwrap_err(), CborError::LengthOverflow);
        assert!((&mut b).serialize_seq(Some(1)).is_err());
    }

    #[test]
    fn test_not_human_readable() {
        let mut b = Builder::new();
        assert!(!(&mut b).is_human_readable());
    }
}
