//! Float minimization.
//!
//! A float is written at the narrowest IEEE 754 width that represents it
//! exactly, unless the builder's [`FloatMode`] says otherwise. NaN and
//! infinity are governed separately by [`NanMode`] and [`InfMode`].

use half::f16;

use crate::builder::Builder;
use crate::options::{FloatMode, InfMode, NanMode};
use crate::{INFO_UINT16, INFO_UINT32, INFO_UINT64, MAJOR_SIMPLE};

const CANONICAL_NAN: [u8; 3] = [0xf9, 0x7e, 0x00];
const POSITIVE_INFINITY: [u8; 3] = [0xf9, 0x7c, 0x00];
const NEGATIVE_INFINITY: [u8; 3] = [0xf9, 0xfc, 0x00];

const F32_EXP_BIAS: i32 = 127;
const F32_COEF_MASK: u32 = 0x007f_ffff;
// Mantissa bits an f16 does not have
const F32_DROP_MASK: u32 = F32_COEF_MASK >> 10;

/// How well an f32 converts to IEEE binary16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Converts without loss.
    Exact,
    /// Needs a round trip to tell (NaN, or a possible f16 subnormal).
    Unknown,
    /// Mantissa bits would be lost.
    Inexact,
    /// Too small, even for an f16 subnormal.
    Underflow,
    /// Too large for an f16.
    Overflow,
}

/// Classifies how `v` converts to half precision without performing the conversion.
pub fn precision_from_f32(v: f32) -> Precision {
    let bits = v.to_bits();
    if bits & 0x7fff_ffff == 0 {
        return Precision::Exact;
    }
    let exp = ((bits >> 23) & 0xff) as i32 - F32_EXP_BIAS;
    let coef = bits & F32_COEF_MASK;
    if exp == 128 {
        return if coef == 0 {
            Precision::Exact
        } else {
            Precision::Unknown
        };
    }
    if exp < -24 {
        return Precision::Underflow;
    }
    if exp > 15 {
        return Precision::Overflow;
    }
    if coef & F32_DROP_MASK != 0 {
        return Precision::Inexact;
    }
    if exp < -14 {
        return Precision::Unknown;
    }
    Precision::Exact
}

/// Returns the f16 equal to `v`, if there is one.
fn exact_f16(v: f32) -> Option<f16> {
    match precision_from_f32(v) {
        Precision::Exact => Some(f16::from_f32(v)),
        Precision::Unknown => {
            let half = f16::from_f32(v);
            (half.to_f32() == v).then_some(half)
        }
        Precision::Inexact | Precision::Underflow | Precision::Overflow => None,
    }
}

fn fits_f32(v: f64) -> bool {
    (v as f32) as f64 == v
}

impl Builder {
    // Writes the fixed NaN/Infinity forms when the options ask for them.
    fn add_special_float(&mut self, is_nan: bool, is_infinite: bool, positive: bool) -> bool {
        if is_nan {
            if self.options.nan == NanMode::Canonical {
                self.add(&CANONICAL_NAN);
                return true;
            }
        } else if is_infinite && self.options.inf == InfMode::Float16 {
            self.add(if positive {
                &POSITIVE_INFINITY
            } else {
                &NEGATIVE_INFINITY
            });
            return true;
        }
        false
    }

    fn add_f16_bits(&mut self, bits: u16) {
        let [hi, lo] = bits.to_be_bytes();
        self.add(&[(MAJOR_SIMPLE << 5) | INFO_UINT16, hi, lo]);
    }

    fn add_f32_bits(&mut self, bits: u32) {
        let mut out = [(MAJOR_SIMPLE << 5) | INFO_UINT32, 0, 0, 0, 0];
        out[1..].copy_from_slice(&bits.to_be_bytes());
        self.add(&out);
    }

    fn add_f64_bits(&mut self, bits: u64) {
        let mut out = [(MAJOR_SIMPLE << 5) | INFO_UINT64, 0, 0, 0, 0, 0, 0, 0, 0];
        out[1..].copy_from_slice(&bits.to_be_bytes());
        self.add(&out);
    }

    /// Appends a half precision float as is, apart from NaN canonicalization.
    pub fn add_f16(&mut self, v: f16) {
        if self.add_special_float(v.is_nan(), false, false) {
            return;
        }
        self.add_f16_bits(v.to_bits());
    }

    pub fn add_f32(&mut self, v: f32) {
        if self.add_special_float(v.is_nan(), v.is_infinite(), v > 0.0) {
            return;
        }
        if self.options.float == FloatMode::Shortest {
            if let Some(half) = exact_f16(v) {
                self.add_f16_bits(half.to_bits());
                return;
            }
        }
        self.add_f32_bits(v.to_bits());
    }

    pub fn add_f64(&mut self, v: f64) {
        if self.add_special_float(v.is_nan(), v.is_infinite(), v > 0.0) {
            return;
        }
        if self.options.float == FloatMode::Native || !fits_f32(v) {
            self.add_f64_bits(v.to_bits());
        } else {
            self.add_f32(v as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::EncodeOptions;

    fn f32_bytes(v: f32, options: EncodeOptions) -> Vec<u8> {
        let mut b = Builder::with_options(options);
        b.add_f32(v);
        b.into_bytes().unwrap()
    }

    fn f64_bytes(v: f64, options: EncodeOptions) -> Vec<u8> {
        let mut b = Builder::with_options(options);
        b.add_f64(v);
        b.into_bytes().unwrap()
    }

    #[test]
    fn test_precision_classes() {
        assert_eq!(precision_from_f32(0.0), Precision::Exact);
        assert_eq!(precision_from_f32(-0.0), Precision::Exact);
        assert_eq!(precision_from_f32(1.5), Precision::Exact);
        assert_eq!(precision_from_f32(65504.0), Precision::Exact);
        assert_eq!(precision_from_f32(f32::INFINITY), Precision::Exact);
        assert_eq!(precision_from_f32(f32::NAN), Precision::Unknown);
        assert_eq!(precision_from_f32(100000.0), Precision::Overflow);
        assert_eq!(precision_from_f32(1.0e-10), Precision::Underflow);
        assert_eq!(precision_from_f32(1.1), Precision::Inexact);
        // 2^-24, the smallest f16 subnormal
        assert_eq!(precision_from_f32(5.960464477539063e-8), Precision::Unknown);
        // 2^-14, the smallest f16 normal
        assert_eq!(precision_from_f32(6.103515625e-5), Precision::Exact);
    }

    #[test]
    fn test_shortest_f32() {
        let opts = EncodeOptions::default();
        assert_eq!(f32_bytes(0.0, opts), [0xf9, 0x00, 0x00]);
        assert_eq!(f32_bytes(-0.0, opts), [0xf9, 0x80, 0x00]);
        assert_eq!(f32_bytes(1.0, opts), [0xf9, 0x3c, 0x00]);
        assert_eq!(f32_bytes(-4.0, opts), [0xf9, 0xc4, 0x00]);
        assert_eq!(f32_bytes(65504.0, opts), [0xf9, 0x7b, 0xff]);
        assert_eq!(f32_bytes(100000.0, opts), [0xfa, 0x47, 0xc3, 0x50, 0x00]);
        assert_eq!(f32_bytes(3.4028234663852886e+38, opts), [0xfa, 0x7f, 0x7f, 0xff, 0xff]);
    }

    #[test]
    fn test_subnormal_round_trip() {
        let opts = EncodeOptions::default();
        assert_eq!(f32_bytes(5.960464477539063e-8, opts), [0xf9, 0x00, 0x01]);
        assert_eq!(f64_bytes(5.960464477539063e-8, opts), [0xf9, 0x00, 0x01]);
        // 2^-24 * 1.5 sits between two f16 subnormals
        let between = 5.960464477539063e-8f32 * 1.5;
        assert_eq!(precision_from_f32(between), Precision::Unknown);
        assert_eq!(f32_bytes(between, opts)[0], 0xfa);
    }

    #[test]
    fn test_shortest_f64() {
        let opts = EncodeOptions::default();
        assert_eq!(f64_bytes(1.5, opts), [0xf9, 0x3e, 0x00]);
        assert_eq!(f64_bytes(100000.0, opts), [0xfa, 0x47, 0xc3, 0x50, 0x00]);
        assert_eq!(
            f64_bytes(1.1, opts),
            [0xfb, 0x3f, 0xf1, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9a]
        );
        assert_eq!(
            f64_bytes(1.0e+300, opts),
            [0xfb, 0x7e, 0x37, 0xe4, 0x3c, 0x88, 0x00, 0x75, 0x9c]
        );
        assert_eq!(
            f64_bytes(-4.1, opts),
            [0xfb, 0xc0, 0x10, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66]
        );
    }

    #[test]
    fn test_native_widths() {
        let opts = EncodeOptions::new().float(FloatMode::Native);
        assert_eq!(f32_bytes(1.0, opts), [0xfa, 0x3f, 0x80, 0x00, 0x00]);
        assert_eq!(
            f64_bytes(1.0, opts),
            [0xfb, 0x3f, 0xf0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_canonical_nan_and_infinity() {
        let opts = EncodeOptions::new().float(FloatMode::Native);
        let quiet_with_payload = f32::from_bits(0x7fc0_1234);
        assert_eq!(f32_bytes(quiet_with_payload, opts), CANONICAL_NAN);
        assert_eq!(f64_bytes(f64::NAN, opts), CANONICAL_NAN);
        assert_eq!(f64_bytes(-f64::NAN, opts), CANONICAL_NAN);
        assert_eq!(f32_bytes(f32::INFINITY, opts), POSITIVE_INFINITY);
        assert_eq!(f64_bytes(f64::NEG_INFINITY, opts), NEGATIVE_INFINITY);
    }

    #[test]
    fn test_preserved_nan_keeps_width() {
        let opts = EncodeOptions::new().nan(NanMode::Preserve);
        let nan32 = f32::from_bits(0x7fc0_0001);
        let mut expected = vec![0xfa];
        expected.extend_from_slice(&0x7fc0_0001u32.to_be_bytes());
        assert_eq!(f32_bytes(nan32, opts), expected);

        let nan64 = f64::from_bits(0x7ff8_0000_0000_0001);
        let mut expected = vec![0xfb];
        expected.extend_from_slice(&0x7ff8_0000_0000_0001u64.to_be_bytes());
        assert_eq!(f64_bytes(nan64, opts), expected);

        // The plain quiet NaN is not narrowed either
        assert_eq!(f32_bytes(f32::NAN, opts), [0xfa, 0x7f, 0xc0, 0x00, 0x00]);
    }

    #[test]
    fn test_preserved_infinity() {
        let native = EncodeOptions::ctap2();
        assert_eq!(f32_bytes(f32::INFINITY, native), [0xfa, 0x7f, 0x80, 0x00, 0x00]);
        assert_eq!(
            f64_bytes(f64::NEG_INFINITY, native),
            [0xfb, 0xff, 0xf0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        // With shortening on, infinity still narrows like any exact value
        let shortest = EncodeOptions::new().inf(InfMode::Preserve);
        assert_eq!(f64_bytes(f64::INFINITY, shortest), POSITIVE_INFINITY);
    }

    #[test]
    fn test_add_f16() {
        let mut b = Builder::new();
        b.add_f16(f16::from_f32(1.5));
        b.add_f16(f16::NAN);
        assert_eq!(b.into_bytes().unwrap(), [0xf9, 0x3e, 0x00, 0xf9, 0x7e, 0x00]);
    }
}
