use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::BuildHasher;

use half::f16;
use serde_bytes::{ByteBuf, Bytes};

use crate::builder::Builder;

/// A type that knows how to append itself to a [`Builder`].
///
/// This is the native counterpart of `serde::Serialize`: implementations call
/// the builder's `add_*` methods directly, and report failures through
/// [`Builder::set_error`] rather than a return value.
///
/// ```
/// use cbor_builder::{Builder, Encode};
///
/// struct Celsius(f32);
///
/// impl Encode for Celsius {
///     fn encode(&self, b: &mut Builder) {
///         b.add_tag(40001);
///         b.add_f32(self.0);
///     }
/// }
///
/// let bytes = cbor_builder::encode(&Celsius(21.5)).unwrap();
/// assert_eq!(bytes, [0xd9, 0x9c, 0x41, 0xf9, 0x4d, 0x60]);
/// ```
pub trait Encode {
    fn encode(&self, b: &mut Builder);
}

macro_rules! encode_with {
    ($($ty:ty => $method:ident,)*) => {
        $(
            impl Encode for $ty {
                #[inline]
                fn encode(&self, b: &mut Builder) {
                    b.$method(*self);
                }
            }
        )*
    };
}

encode_with! {
    bool => add_bool,
    u8 => add_u8,
    u16 => add_u16,
    u32 => add_u32,
    u64 => add_u64,
    usize => add_usize,
    u128 => add_u128,
    i8 => add_i8,
    i16 => add_i16,
    i32 => add_i32,
    i64 => add_i64,
    isize => add_isize,
    i128 => add_i128,
    f16 => add_f16,
    f32 => add_f32,
    f64 => add_f64,
}

impl Encode for str {
    fn encode(&self, b: &mut Builder) {
        b.add_str(self);
    }
}

impl Encode for String {
    fn encode(&self, b: &mut Builder) {
        b.add_str(self);
    }
}

impl Encode for char {
    fn encode(&self, b: &mut Builder) {
        let mut buf = [0u8; 4];
        b.add_str(self.encode_utf8(&mut buf));
    }
}

impl Encode for () {
    fn encode(&self, b: &mut Builder) {
        b.add_nil();
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, b: &mut Builder) {
        match self {
            Some(v) => v.encode(b),
            None => b.add_nil(),
        }
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, b: &mut Builder) {
        (**self).encode(b);
    }
}

impl<T: Encode + ?Sized> Encode for &mut T {
    fn encode(&self, b: &mut Builder) {
        (**self).encode(b);
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, b: &mut Builder) {
        (**self).encode(b);
    }
}

fn encode_seq<'a, T, I>(b: &mut Builder, len: usize, items: I)
where
    T: Encode + 'a,
    I: IntoIterator<Item = &'a T>,
{
    b.add_array(len as u64, |b| {
        for item in items {
            item.encode(b);
        }
    });
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, b: &mut Builder) {
        encode_seq(b, self.len(), self);
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, b: &mut Builder) {
        encode_seq(b, N, self);
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, b: &mut Builder) {
        encode_seq(b, self.len(), self);
    }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn encode(&self, b: &mut Builder) {
        encode_seq(b, self.len(), self);
    }
}

macro_rules! encode_tuple {
    ($len:expr => $($name:ident)+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode(&self, b: &mut Builder) {
                let ($($name,)+) = self;
                b.add_array($len, |b| {
                    $($name.encode(b);)+
                });
            }
        }
    };
}

encode_tuple!(1 => A);
encode_tuple!(2 => A B);
encode_tuple!(3 => A B C);
encode_tuple!(4 => A B C D);

// Maps are written in iteration order and reordered by the builder, so a
// HashMap comes out the same as the equivalent BTreeMap.
impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, b: &mut Builder) {
        b.add_map(self.len(), |m| {
            for (k, v) in self {
                m.pair(k, v);
            }
        });
    }
}

impl<K: Encode, V: Encode, S: BuildHasher> Encode for HashMap<K, V, S> {
    fn encode(&self, b: &mut Builder) {
        b.add_map(self.len(), |m| {
            for (k, v) in self {
                m.pair(k, v);
            }
        });
    }
}

impl Encode for Bytes {
    fn encode(&self, b: &mut Builder) {
        b.add_bytes(self);
    }
}

impl Encode for ByteBuf {
    fn encode(&self, b: &mut Builder) {
        b.add_bytes(self);
    }
}
