use serde::Serialize;

use crate::encode::Encode;
use crate::map::MapEntry;
use crate::options::EncodeOptions;
use crate::tags::{TAG_ENCODED_CBOR, TAG_NEGATIVE_BIGNUM, TAG_POSITIVE_BIGNUM};
use crate::{
    CborError, FALSE, INFO_UINT8, INFO_UINT16, INFO_UINT32, INFO_UINT64, MAJOR_ARRAY,
    MAJOR_BYTES, MAJOR_NEGATIVE, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT, MAJOR_UNSIGNED, NULL,
    Result, TRUE,
};

/// Largest header: initial byte plus an 8 byte argument.
const MAX_HEADER_LEN: usize = 9;

/// Builds one CBOR byte sequence.
///
/// All `add_*` calls append to a single buffer. Errors are sticky: the first one
/// is kept, every later write becomes a no-op, and [`Builder::into_bytes`]
/// returns the error instead of the partial output.
///
/// A builder is not meant to be shared between concurrent encodes. It can be
/// reused sequentially through [`Builder::reset`], which keeps its allocations.
#[derive(Debug, Default)]
pub struct Builder {
    pub(crate) options: EncodeOptions,
    pub(crate) buf: Vec<u8>,
    error: Option<CborError>,
    // Descriptors of finished entries for every map currently open, innermost last.
    pub(crate) entries: Vec<MapEntry>,
    // Swap space for map reordering.
    pub(crate) scratch: Vec<u8>,
    // Bumped by `reset`; items opened before a reset must not be finished after it.
    pub(crate) resets: u64,
}

/// Header slot reserved by [`Builder::begin_deferred`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deferred {
    offset: usize,
    resets: u64,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EncodeOptions) -> Self {
        Builder {
            options,
            ..Self::default()
        }
    }

    pub fn with_capacity(capacity: usize, options: EncodeOptions) -> Self {
        Builder {
            options,
            buf: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Starts a builder that appends after the bytes already in `buffer`.
    pub fn with_buffer(buffer: Vec<u8>, options: EncodeOptions) -> Self {
        Builder {
            options,
            buf: buffer,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Records `err` as the result of this build. Writes made afterwards are ignored.
    ///
    /// Only the first error is kept.
    pub fn set_error(&mut self, err: CborError) {
        if self.error.is_none() {
            tracing::debug!(error = %err, len = self.buf.len(), "cbor builder failed");
            self.error = Some(err);
        }
    }

    pub fn error(&self) -> Option<&CborError> {
        self.error.as_ref()
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn status(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Returns the bytes written so far, or the error that stopped the build.
    pub fn bytes(&self) -> Result<&[u8]> {
        self.status()?;
        Ok(&self.buf)
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.buf),
        }
    }

    /// Clears the output and any error so the builder can encode a new value.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.entries.clear();
        self.error = None;
        self.resets = self.resets.wrapping_add(1);
    }

    /// Fails the builder when `reset` ran since an item was opened at `resets`.
    pub(crate) fn still_open(&mut self, resets: u64) -> bool {
        if self.resets != resets {
            self.set_error(CborError::InvalidValue(
                "builder was reset while an item was still open".to_string(),
            ));
            return false;
        }
        true
    }

    // Checks that `extra` more bytes fit the length budget.
    fn has_room(&mut self, extra: usize) -> bool {
        match self.buf.len().checked_add(extra) {
            Some(len) if len <= self.options.max_len => true,
            _ => {
                self.set_error(CborError::LengthOverflow);
                false
            }
        }
    }

    pub(crate) fn add(&mut self, bytes: &[u8]) {
        if self.error.is_some() || !self.has_room(bytes.len()) {
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn add_uint(&mut self, major: u8, value: u64) {
        let mut header = [0u8; MAX_HEADER_LEN];
        let len = encode_header(&mut header, major, value);
        self.add(&header[..len]);
    }

    /// Appends pre-encoded CBOR verbatim.
    pub fn add_raw_bytes(&mut self, bytes: &[u8]) {
        self.add(bytes);
    }

    pub fn add_bool(&mut self, v: bool) {
        let val = if v { TRUE } else { FALSE };
        self.add(&[(MAJOR_SIMPLE << 5) | val]);
    }

    pub fn add_nil(&mut self) {
        self.add(&[(MAJOR_SIMPLE << 5) | NULL]);
    }

    pub fn add_u8(&mut self, v: u8) {
        self.add_uint(MAJOR_UNSIGNED, v as u64);
    }

    pub fn add_u16(&mut self, v: u16) {
        self.add_uint(MAJOR_UNSIGNED, v as u64);
    }

    pub fn add_u32(&mut self, v: u32) {
        self.add_uint(MAJOR_UNSIGNED, v as u64);
    }

    pub fn add_u64(&mut self, v: u64) {
        self.add_uint(MAJOR_UNSIGNED, v);
    }

    pub fn add_usize(&mut self, v: usize) {
        self.add_uint(MAJOR_UNSIGNED, v as u64);
    }

    pub fn add_i8(&mut self, v: i8) {
        self.add_i64(v as i64);
    }

    pub fn add_i16(&mut self, v: i16) {
        self.add_i64(v as i64);
    }

    pub fn add_i32(&mut self, v: i32) {
        self.add_i64(v as i64);
    }

    pub fn add_i64(&mut self, v: i64) {
        if v >= 0 {
            self.add_uint(MAJOR_UNSIGNED, v as u64);
        } else {
            // -1 - v cannot overflow for any negative i64
            self.add_uint(MAJOR_NEGATIVE, (-1 - v) as u64);
        }
    }

    pub fn add_isize(&mut self, v: isize) {
        self.add_i64(v as i64);
    }

    /// Integers outside the 64-bit argument range become bignums (tag 2).
    pub fn add_u128(&mut self, v: u128) {
        match u64::try_from(v) {
            Ok(small) => self.add_uint(MAJOR_UNSIGNED, small),
            Err(_) => self.add_bignum(TAG_POSITIVE_BIGNUM, v),
        }
    }

    /// Integers outside the 64-bit argument range become bignums (tag 3).
    pub fn add_i128(&mut self, v: i128) {
        if v >= 0 {
            self.add_u128(v as u128);
            return;
        }
        let magnitude = (-1 - v) as u128;
        match u64::try_from(magnitude) {
            Ok(small) => self.add_uint(MAJOR_NEGATIVE, small),
            Err(_) => self.add_bignum(TAG_NEGATIVE_BIGNUM, magnitude),
        }
    }

    fn add_bignum(&mut self, tag: u64, magnitude: u128) {
        let bytes = magnitude.to_be_bytes();
        let skip = (magnitude.leading_zeros() / 8) as usize;
        self.add_tag(tag);
        self.add_bytes(&bytes[skip..]);
    }

    /// Appends a byte string. An empty slice is a zero-length string, not null.
    pub fn add_bytes(&mut self, v: &[u8]) {
        self.add_uint(MAJOR_BYTES, v.len() as u64);
        self.add(v);
    }

    /// `None` is written as null (`f6`).
    pub fn add_nullable_bytes(&mut self, v: Option<&[u8]>) {
        match v {
            Some(bytes) => self.add_bytes(bytes),
            None => self.add_nil(),
        }
    }

    pub fn add_str(&mut self, v: &str) {
        self.add_uint(MAJOR_TEXT, v.len() as u64);
        self.add(v.as_bytes());
    }

    /// `None` is written as null (`f6`).
    pub fn add_nullable_str(&mut self, v: Option<&str>) {
        match v {
            Some(s) => self.add_str(s),
            None => self.add_nil(),
        }
    }

    /// Writes the tag header. The caller must follow it with exactly one item.
    pub fn add_tag(&mut self, number: u64) {
        self.add_uint(MAJOR_TAG, number);
    }

    /// Writes an array header for `len` items, then lets `body` append them.
    ///
    /// The item count is not checked against `len`.
    pub fn add_array<F>(&mut self, len: u64, body: F)
    where
        F: FnOnce(&mut Builder),
    {
        self.add_uint(MAJOR_ARRAY, len);
        if self.is_err() {
            return;
        }
        body(self);
    }

    /// Appends a value through its [`Encode`] impl.
    pub fn add_value<T: Encode + ?Sized>(&mut self, value: &T) {
        if self.is_err() {
            return;
        }
        value.encode(self);
    }

    /// Appends a value through its `Serialize` impl. A serializer error becomes
    /// the builder's error.
    pub fn add_serialize<T: Serialize + ?Sized>(&mut self, value: &T) {
        if self.is_err() {
            return;
        }
        if let Err(err) = value.serialize(&mut *self) {
            self.set_error(err);
        }
    }

    /// Appends a byte string whose content is produced by `body`.
    ///
    /// The length header is fixed up once `body` returns.
    pub fn add_bytes_unknown_length<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Builder),
    {
        self.add_unknown_length(MAJOR_BYTES, body);
    }

    /// Like [`Builder::add_bytes_unknown_length`] for text. `body` must write UTF-8.
    pub fn add_str_unknown_length<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Builder),
    {
        self.add_unknown_length(MAJOR_TEXT, body);
    }

    /// Appends an array whose items are written by `body`, which returns how many it wrote.
    pub fn add_array_unknown_length<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Builder) -> u64,
    {
        let Some(deferred) = self.begin_deferred(MAJOR_ARRAY) else {
            return;
        };
        let count = body(self);
        self.finish_deferred(MAJOR_ARRAY, deferred, count);
    }

    /// Appends tag 24 wrapping the CBOR that `body` writes as a byte string.
    pub fn add_embedded_cbor<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Builder),
    {
        self.add_tag(TAG_ENCODED_CBOR);
        self.add_bytes_unknown_length(body);
    }

    fn add_unknown_length<F>(&mut self, major: u8, body: F)
    where
        F: FnOnce(&mut Builder),
    {
        let Some(deferred) = self.begin_deferred(major) else {
            return;
        };
        body(self);
        let len = self.buf.len().saturating_sub(deferred.offset + 1);
        self.finish_deferred(major, deferred, len as u64);
    }

    /// Reserves a one byte header for [`Builder::finish_deferred`] to fill in.
    pub(crate) fn begin_deferred(&mut self, major: u8) -> Option<Deferred> {
        let offset = self.buf.len();
        self.add(&[major << 5]);
        if self.is_err() {
            None
        } else {
            Some(Deferred {
                offset,
                resets: self.resets,
            })
        }
    }

    /// Rewrites the reserved header to carry `value`, widening it and moving
    /// everything after it when the argument needs extra bytes.
    pub(crate) fn finish_deferred(&mut self, major: u8, deferred: Deferred, value: u64) {
        if self.is_err() || !self.still_open(deferred.resets) {
            return;
        }
        let offset = deferred.offset;
        let mut header = [0u8; MAX_HEADER_LEN];
        let len = encode_header(&mut header, major, value);
        let extra = len - 1;
        if extra > 0 {
            if !self.has_room(extra) {
                return;
            }
            let end = self.buf.len();
            self.buf.resize(end + extra, 0);
            shift_forward(&mut self.buf, offset + 1, end, extra);
        }
        self.buf[offset..offset + len].copy_from_slice(&header[..len]);
    }

    /// Turns the unsigned integer header at `offset` into a tag header with the same argument.
    pub(crate) fn retag_uint_header(&mut self, offset: usize) {
        if self.is_err() {
            return;
        }
        match self.buf.get_mut(offset) {
            Some(initial) if *initial >> 5 == MAJOR_UNSIGNED => *initial |= MAJOR_TAG << 5,
            _ => self.set_error(CborError::InvalidTag(
                "tag number must be an unsigned integer".to_string(),
            )),
        }
    }

    /// Drops the byte string header at `offset`, leaving its payload in place as raw CBOR.
    pub(crate) fn unwrap_byte_string(&mut self, offset: usize) {
        if self.is_err() {
            return;
        }
        let header_len = match self.buf.get(offset) {
            Some(initial) if *initial >> 5 == MAJOR_BYTES => match initial & 0x1f {
                0..=23 => 1,
                INFO_UINT8 => 2,
                INFO_UINT16 => 3,
                INFO_UINT32 => 5,
                INFO_UINT64 => 9,
                _ => 0,
            },
            _ => 0,
        };
        if header_len == 0 {
            self.set_error(CborError::InvalidValue(
                "raw CBOR must be given as a byte string".to_string(),
            ));
            return;
        }
        self.buf.copy_within(offset + header_len.., offset);
        self.buf.truncate(self.buf.len() - header_len);
    }
}

/// Encodes the initial byte and argument for `major` into `out` using the
/// shortest form that holds `value`. Returns the header length.
pub(crate) fn encode_header(out: &mut [u8; MAX_HEADER_LEN], major: u8, value: u64) -> usize {
    let mt = major << 5;
    if value < 24 {
        out[0] = mt | value as u8;
        1
    } else if value <= u8::MAX as u64 {
        out[0] = mt | INFO_UINT8;
        out[1] = value as u8;
        2
    } else if value <= u16::MAX as u64 {
        out[0] = mt | INFO_UINT16;
        out[1..3].copy_from_slice(&(value as u16).to_be_bytes());
        3
    } else if value <= u32::MAX as u64 {
        out[0] = mt | INFO_UINT32;
        out[1..5].copy_from_slice(&(value as u32).to_be_bytes());
        5
    } else {
        out[0] = mt | INFO_UINT64;
        out[1..9].copy_from_slice(&value.to_be_bytes());
        9
    }
}

/// Moves `buf[start..end]` forward by `by` bytes. The destination must already exist.
pub(crate) fn shift_forward(buf: &mut [u8], start: usize, end: usize, by: usize) {
    buf.copy_within(start..end, start + by);
}
