//! Wire-visible protocol constants.
//!
//! Both peers of a session must agree on every value here; changing any
//! of them is a protocol break.

/// Maximum size of a snapshot's item data region in bytes.
pub const MAX_SNAPSHOT_SIZE: usize = 65536;

/// Maximum number of items in one snapshot.
pub const MAX_ITEMS: usize = 1024;

/// Cardinality of the static item-size table.
///
/// Types at or above this always carry their size on the wire.
pub const MAX_STATIC_TYPES: usize = 64;

/// Maximum number of UUID-declared item types per builder.
pub const MAX_EXTENDED_TYPES: usize = 64;

/// Highest wire type id. Extended-type slots count down from here.
pub const MAX_TYPE: i32 = 0x7fff;

/// Application type ids at or above this are identified by UUID and
/// never appear on the wire directly.
pub const OFFSET_UUID: i32 = 1 << 16;

/// Wire types at or above this resolve through a declaration item.
pub const OFFSET_UUID_TYPE: i32 = 0x4000;

/// Reserved item type whose payload declares an extended type's UUID.
pub const TYPE_DECLARATION: i32 = 0;

/// Size of the per-item header (the packed key word) in bytes.
pub(crate) const ITEM_HEADER_SIZE: usize = 4;

/// Words in the snapshot blob header (`data_size`, `num_items`).
pub(crate) const SNAP_HEADER_WORDS: usize = 2;
