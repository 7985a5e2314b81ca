use serde::{Deserialize, Serialize};

/// How NaN values are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanMode {
    /// Every NaN becomes the half-precision quiet NaN `f9 7e 00`.
    #[default]
    Canonical,
    /// NaN keeps its bit pattern and its original width.
    Preserve,
}

/// How positive and negative infinity are written.
///
/// Takes precedence over [`FloatMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfMode {
    /// Always `f9 7c 00` / `f9 fc 00`.
    #[default]
    Float16,
    /// Infinity is encoded like any other float.
    Preserve,
}

/// Which width finite floats are written at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatMode {
    /// Shortest of f16/f32/f64 that holds the value without losing a bit.
    #[default]
    Shortest,
    /// f32 stays f32 and f64 stays f64.
    Native,
}

/// Ordering applied to the entries of every map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Shorter encoded keys first, equal lengths compared bytewise.
    /// This is "Canonical CBOR" from RFC 7049 section 3.9.
    #[default]
    LengthFirst,
    /// Bytewise lexicographic order of the encoded keys, as used by
    /// CTAP2 canonical CBOR and RFC 8949 core deterministic encoding.
    BytewiseLexical,
    /// Entries stay in the order they were added.
    Unsorted,
}

/// Encoding policy for one [`Builder`](crate::Builder).
///
/// The default matches RFC 7049 canonical CBOR.
///
/// ```
/// use cbor_builder::{EncodeOptions, SortMode};
///
/// let opts = EncodeOptions::new().sort(SortMode::BytewiseLexical);
/// assert_eq!(opts.sort, SortMode::BytewiseLexical);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    pub nan: NanMode,
    pub inf: InfMode,
    pub float: FloatMode,
    pub sort: SortMode,
    /// Largest output the builder may produce, in bytes.
    pub max_len: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeOptions {
    pub const fn new() -> Self {
        EncodeOptions {
            nan: NanMode::Canonical,
            inf: InfMode::Float16,
            float: FloatMode::Shortest,
            sort: SortMode::LengthFirst,
            max_len: usize::MAX,
        }
    }

    /// RFC 7049 section 3.9 canonical CBOR.
    pub const fn canonical() -> Self {
        Self::new()
    }

    /// CTAP2 canonical CBOR: bytewise key order, floats untouched.
    pub const fn ctap2() -> Self {
        EncodeOptions {
            nan: NanMode::Preserve,
            inf: InfMode::Preserve,
            float: FloatMode::Native,
            sort: SortMode::BytewiseLexical,
            max_len: usize::MAX,
        }
    }

    /// RFC 8949 core deterministic encoding.
    pub const fn core_deterministic() -> Self {
        Self::new().sort(SortMode::BytewiseLexical)
    }

    /// Preferred serialization without any map sorting.
    pub const fn preferred_unsorted() -> Self {
        Self::new().sort(SortMode::Unsorted)
    }

    pub const fn nan(mut self, mode: NanMode) -> Self {
        self.nan = mode;
        self
    }

    pub const fn inf(mut self, mode: InfMode) -> Self {
        self.inf = mode;
        self
    }

    pub const fn float(mut self, mode: FloatMode) -> Self {
        self.float = mode;
        self
    }

    pub const fn sort(mut self, mode: SortMode) -> Self {
        self.sort = mode;
        self
    }

    pub const fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}
