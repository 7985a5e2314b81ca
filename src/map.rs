//! Map emission and in-place canonical ordering.
//!
//! Entries are written to the output buffer in the order the caller supplies
//! them. When an entry completes, it is moved into its sorted position among
//! the entries already written, so the map's bytes are always sorted and
//! contiguous. Moving an entry costs one copy of the entry plus one shift of
//! the entries that sort after it.

use std::ops::Range;

use crate::builder::{Builder, shift_forward};
use crate::encode::Encode;
use crate::options::SortMode;
use crate::{CborError, MAJOR_MAP};

/// Buffer span of one finished key/value pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MapEntry {
    pub(crate) offset: usize,
    pub(crate) key_len: usize,
    /// Key and value together.
    pub(crate) len: usize,
}

impl MapEntry {
    fn key(&self) -> Range<usize> {
        self.offset..self.offset + self.key_len
    }

    fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Bookkeeping for one open map.
///
/// The builder's descriptor list is shared by nested maps: a map owns the
/// descriptors from `base` upward while it is open.
#[derive(Debug)]
pub(crate) struct MapFrame {
    base: usize,
    key_start: usize,
    key_len: usize,
    resets: u64,
}

/// Handle passed to the body of [`Builder::add_map`].
pub struct MapBuilder<'a> {
    builder: &'a mut Builder,
    frame: MapFrame,
}

impl MapBuilder<'_> {
    /// Writes one entry: `key` appends the key item, then `value` the value item.
    pub fn entry<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: FnOnce(&mut Builder),
        V: FnOnce(&mut Builder),
    {
        if self.builder.is_err() {
            return self;
        }
        self.builder.begin_entry(&mut self.frame);
        key(&mut *self.builder);
        self.builder.end_key(&mut self.frame);
        value(&mut *self.builder);
        self.builder.end_entry(&self.frame);
        self
    }

    /// Writes one entry from two [`Encode`] values.
    pub fn pair<K, V>(&mut self, key: &K, value: &V) -> &mut Self
    where
        K: Encode + ?Sized,
        V: Encode + ?Sized,
    {
        self.entry(|b| key.encode(b), |b| value.encode(b))
    }

    /// Number of entries finished so far.
    pub fn len(&self) -> usize {
        self.builder.entries.len().saturating_sub(self.frame.base)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Builder {
    /// Writes a map header for `len` entries and lets `body` add them through a [`MapBuilder`].
    ///
    /// Entries are reordered as they complete according to the builder's [`SortMode`].
    /// The entry count is not checked against `len`.
    pub fn add_map<F>(&mut self, len: usize, body: F)
    where
        F: FnOnce(&mut MapBuilder<'_>),
    {
        self.add_uint(MAJOR_MAP, len as u64);
        if self.is_err() {
            return;
        }
        let frame = self.open_map(len);
        if self.is_err() {
            return;
        }
        let mut map = MapBuilder {
            builder: self,
            frame,
        };
        body(&mut map);
        let MapBuilder { builder, frame } = map;
        builder.close_map(frame);
    }

    /// Like [`Builder::add_map`], but the header is written for however many
    /// entries `body` adds.
    pub fn add_map_unknown_length<F>(&mut self, body: F)
    where
        F: FnOnce(&mut MapBuilder<'_>),
    {
        let Some(deferred) = self.begin_deferred(MAJOR_MAP) else {
            return;
        };
        let frame = self.open_map(0);
        let mut map = MapBuilder {
            builder: self,
            frame,
        };
        body(&mut map);
        let MapBuilder { builder, frame } = map;
        let count = builder.close_map(frame);
        builder.finish_deferred(MAJOR_MAP, deferred, count as u64);
    }

    pub(crate) fn open_map(&mut self, len: usize) -> MapFrame {
        if self.entries.try_reserve(len).is_err() {
            self.set_error(CborError::InvalidValue(format!(
                "cannot allocate descriptors for {len} map entries"
            )));
        }
        MapFrame {
            base: self.entries.len(),
            key_start: self.buf.len(),
            key_len: 0,
            resets: self.resets,
        }
    }

    pub(crate) fn begin_entry(&mut self, frame: &mut MapFrame) {
        frame.key_start = self.buf.len();
        frame.key_len = 0;
    }

    pub(crate) fn end_key(&mut self, frame: &mut MapFrame) {
        frame.key_len = self.buf.len().saturating_sub(frame.key_start);
    }

    /// Records the entry that started at `frame.key_start` and sorts it into place.
    pub(crate) fn end_entry(&mut self, frame: &MapFrame) {
        if self.is_err() || !self.still_open(frame.resets) {
            return;
        }
        let entry = MapEntry {
            offset: frame.key_start,
            key_len: frame.key_len,
            len: self.buf.len() - frame.key_start,
        };
        self.entries.push(entry);
        if self.options.sort != SortMode::Unsorted {
            let sort = self.options.sort;
            insert_last_sorted(
                &mut self.buf,
                &mut self.entries[frame.base..],
                &mut self.scratch,
                sort,
            );
        }
    }

    /// Releases the frame's descriptors and returns how many entries the map got.
    pub(crate) fn close_map(&mut self, frame: MapFrame) -> usize {
        let count = self.entries.len().saturating_sub(frame.base);
        self.entries.truncate(frame.base);
        count
    }
}

/// Whether key `x` belongs at or before key `y`.
fn sorts_at_or_before(sort: SortMode, x: &[u8], y: &[u8]) -> bool {
    if sort == SortMode::LengthFirst && x.len() != y.len() {
        return x.len() < y.len();
    }
    x <= y
}

/// Moves the last entry of `entries` into sorted position.
///
/// All other entries are sorted and contiguous in `buf`, and the last entry
/// directly follows them. The new entry goes in front of the first key it
/// sorts at or before.
fn insert_last_sorted(
    buf: &mut [u8],
    entries: &mut [MapEntry],
    scratch: &mut Vec<u8>,
    sort: SortMode,
) {
    let Some((&last, sorted)) = entries.split_last() else {
        return;
    };
    let n = sorted.len();
    let key = &buf[last.key()];
    let idx = sorted.partition_point(|e| !sorts_at_or_before(sort, key, &buf[e.key()]));
    if idx == n {
        return;
    }

    let dest = entries[idx].offset;
    tracing::trace!(from = last.offset, to = dest, len = last.len, "reordering map entry");
    scratch.clear();
    scratch.extend_from_slice(&buf[last.span()]);
    shift_forward(buf, dest, last.offset, last.len);
    buf[dest..dest + last.len].copy_from_slice(scratch);

    for moved in &mut entries[idx..n] {
        moved.offset += last.len;
    }
    entries[idx..].rotate_right(1);
    entries[idx] = MapEntry {
        offset: dest,
        ..last
    };
}
