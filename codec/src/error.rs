//! Error types for codec operations.

use std::fmt;

/// Errors produced while parsing and validating a snapshot blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// Buffer is shorter than the header and offset table require.
    Truncated { needed: usize, available: usize },

    /// A header count is negative.
    NegativeHeader { data_size: i32, num_items: i32 },

    /// More items than the protocol allows.
    TooManyItems { num_items: usize, max: usize },

    /// Data region larger than the protocol allows.
    DataTooLarge { data_size: usize, max: usize },

    /// Data region length is not a whole number of words.
    MisalignedData { data_size: usize },

    /// Buffer length disagrees with the header.
    LengthMismatch { expected: usize, actual: usize },

    /// An offset-table entry is invalid.
    InvalidOffset {
        index: usize,
        offset: i32,
        reason: OffsetReason,
    },
}

/// Why an offset-table entry was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReason {
    /// The first offset must be zero.
    FirstNotZero,
    /// Offsets must be 4-byte aligned.
    Misaligned,
    /// Offsets must be strictly increasing.
    NotIncreasing { previous: i32 },
    /// The offset points past the data region.
    OutOfRange { data_size: usize },
    /// The item span cannot hold its own header word.
    SpanTooSmall,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "snapshot truncated: need {needed} bytes, have {available}")
            }
            Self::NegativeHeader {
                data_size,
                num_items,
            } => {
                write!(
                    f,
                    "negative snapshot header: data_size={data_size} num_items={num_items}"
                )
            }
            Self::TooManyItems { num_items, max } => {
                write!(f, "too many items: {num_items} > {max}")
            }
            Self::DataTooLarge { data_size, max } => {
                write!(f, "data region too large: {data_size} > {max}")
            }
            Self::MisalignedData { data_size } => {
                write!(f, "data region not word-aligned: {data_size} bytes")
            }
            Self::LengthMismatch { expected, actual } => {
                write!(
                    f,
                    "buffer length mismatch: header implies {expected} bytes, got {actual}"
                )
            }
            Self::InvalidOffset {
                index,
                offset,
                reason,
            } => {
                write!(f, "invalid offset {offset} at index {index}: {reason}")
            }
        }
    }
}

impl fmt::Display for OffsetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstNotZero => write!(f, "first offset must be zero"),
            Self::Misaligned => write!(f, "not 4-byte aligned"),
            Self::NotIncreasing { previous } => {
                write!(f, "not increasing (previous {previous})")
            }
            Self::OutOfRange { data_size } => {
                write!(f, "past the {data_size}-byte data region")
            }
            Self::SpanTooSmall => write!(f, "item span too small for its header"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Errors produced by the snapshot builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The item table is full.
    TooManyItems { max: usize },

    /// The data region cannot hold another item.
    DataOverflow { needed: usize, max: usize },

    /// The extended-type table is full.
    TooManyExtendedTypes { max: usize },

    /// The registry has no UUID for an extended type.
    MissingUuid { type_id: i32 },

    /// The output buffer cannot hold the finished snapshot.
    OutputTooSmall { needed: usize, available: usize },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyItems { max } => write!(f, "item table full ({max} items)"),
            Self::DataOverflow { needed, max } => {
                write!(f, "data region overflow: need {needed} bytes, limit {max}")
            }
            Self::TooManyExtendedTypes { max } => {
                write!(f, "extended-type table full ({max} slots)")
            }
            Self::MissingUuid { type_id } => {
                write!(f, "no UUID registered for type {type_id}")
            }
            Self::OutputTooSmall { needed, available } => {
                write!(f, "output too small: need {needed} bytes, have {available}")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Errors produced while encoding a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    /// The output buffer cannot hold the encoded delta.
    OutputTooSmall { needed_words: usize, available_words: usize },
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputTooSmall {
                needed_words,
                available_words,
            } => {
                write!(
                    f,
                    "delta output too small: need {needed_words} words, have {available_words}"
                )
            }
        }
    }
}

impl std::error::Error for PackError {}

/// Errors produced while applying a delta.
///
/// Every failure mode is distinguishable; [`legacy_code`](Self::legacy_code)
/// maps each onto the historical negative return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackError {
    /// Delta buffer shorter than its declared counts require.
    TruncatedHeader {
        needed_words: usize,
        available_words: usize,
    },

    /// A header count is negative.
    NegativeCount { num_deleted: i32, num_updates: i32 },

    /// The reserved temp-item count was non-zero.
    TempItemsPresent { count: i32 },

    /// An update record lacked a size word that its type requires.
    TruncatedSize { update_index: usize },

    /// A type or size field is outside the valid range.
    MalformedTypeOrSize { item_type: i32, size_words: i32 },

    /// The output builder refused an item.
    OutOfCapacity { source: BuildError },
}

impl UnpackError {
    /// Returns the historical negative error code for this failure.
    #[must_use]
    pub const fn legacy_code(&self) -> i32 {
        match self {
            Self::TruncatedHeader { .. } | Self::NegativeCount { .. } => -1,
            Self::TruncatedSize { .. } => -2,
            Self::TempItemsPresent { .. } | Self::MalformedTypeOrSize { .. } => -3,
            Self::OutOfCapacity { .. } => -4,
        }
    }
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedHeader {
                needed_words,
                available_words,
            } => {
                write!(
                    f,
                    "delta truncated: need {needed_words} words, have {available_words}"
                )
            }
            Self::NegativeCount {
                num_deleted,
                num_updates,
            } => {
                write!(
                    f,
                    "negative delta counts: deleted={num_deleted} updates={num_updates}"
                )
            }
            Self::TempItemsPresent { count } => {
                write!(f, "reserved temp-item count must be zero, got {count}")
            }
            Self::TruncatedSize { update_index } => {
                write!(f, "update record {update_index} is missing its size word")
            }
            Self::MalformedTypeOrSize {
                item_type,
                size_words,
            } => {
                write!(
                    f,
                    "malformed update record: type={item_type} size_words={size_words}"
                )
            }
            Self::OutOfCapacity { source } => {
                write!(f, "snapshot rebuild out of capacity: {source}")
            }
        }
    }
}

impl std::error::Error for UnpackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OutOfCapacity { source } => Some(source),
            _ => None,
        }
    }
}

impl From<BuildError> for UnpackError {
    fn from(source: BuildError) -> Self {
        Self::OutOfCapacity { source }
    }
}

/// Errors produced by snapshot storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Ticks must be strictly increasing.
    OutOfOrder {
        last_tick: crate::Tick,
        new_tick: crate::Tick,
    },

    /// The snapshot blob failed validation.
    Snapshot(SnapshotError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrder {
                last_tick,
                new_tick,
            } => {
                write!(
                    f,
                    "tick {} not after stored tick {}",
                    new_tick.raw(),
                    last_tick.raw()
                )
            }
            Self::Snapshot(err) => write!(f, "snapshot rejected: {err}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Snapshot(err) => Some(err),
            Self::OutOfOrder { .. } => None,
        }
    }
}

impl From<SnapshotError> for StorageError {
    fn from(err: SnapshotError) -> Self {
        Self::Snapshot(err)
    }
}

/// Errors produced while populating the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The type id is already registered.
    DuplicateTypeId { type_id: i32 },

    /// The UUID is already registered.
    DuplicateUuid { type_id: i32 },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTypeId { type_id } => {
                write!(f, "type {type_id} already registered")
            }
            Self::DuplicateUuid { type_id } => {
                write!(f, "uuid already registered (as type {type_id})")
            }
        }
    }
}

impl std::error::Error for RegistryError {}
