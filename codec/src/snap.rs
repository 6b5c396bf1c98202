//! Immutable view over a packed snapshot blob.
//!
//! A snapshot is three regions: a two-word header (`data_size`,
//! `num_items`), an offset table of `num_items` byte offsets into the
//! data region, and the data region itself, a tight concatenation of
//! items. Each item is one packed key word followed by its payload
//! words. Every invariant is checked once at construction so the
//! accessors can stay unchecked and O(1).

use crate::error::{OffsetReason, SnapshotError};
use crate::limits::{
    ITEM_HEADER_SIZE, MAX_ITEMS, MAX_SNAPSHOT_SIZE, OFFSET_UUID_TYPE, SNAP_HEADER_WORDS,
    TYPE_DECLARATION,
};
use crate::registry::{uuid_from_words, UuidRegistry};
use crate::types::ItemKey;

/// Size of the snapshot blob header in bytes.
const HEADER_BYTES: usize = SNAP_HEADER_WORDS * 4;

/// A validated, immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// `[data_size, num_items, offsets..., data...]`.
    words: Vec<i32>,
}

/// A view of one item inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemView<'a> {
    key: ItemKey,
    data: &'a [i32],
}

impl<'a> ItemView<'a> {
    /// Returns the item's key.
    #[must_use]
    pub const fn key(&self) -> ItemKey {
        self.key
    }

    /// Returns the raw wire type (unresolved).
    #[must_use]
    pub const fn type_id(&self) -> i32 {
        self.key.type_id()
    }

    /// Returns the item id.
    #[must_use]
    pub const fn id(&self) -> i32 {
        self.key.id()
    }

    /// Returns the payload words.
    #[must_use]
    pub const fn data(&self) -> &'a [i32] {
        self.data
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.data.len() * 4
    }
}

impl Snapshot {
    /// Returns a snapshot with no items.
    #[must_use]
    pub fn empty() -> Self {
        Self { words: vec![0; SNAP_HEADER_WORDS] }
    }

    /// Parses and validates a little-endian snapshot blob.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] describing the first violated invariant.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < HEADER_BYTES {
            return Err(SnapshotError::Truncated {
                needed: HEADER_BYTES,
                available: bytes.len(),
            });
        }

        let raw_data_size = read_word(bytes, 0);
        let raw_num_items = read_word(bytes, 1);
        if raw_data_size < 0 || raw_num_items < 0 {
            return Err(SnapshotError::NegativeHeader {
                data_size: raw_data_size,
                num_items: raw_num_items,
            });
        }

        let data_size = raw_data_size as usize;
        let num_items = raw_num_items as usize;
        if num_items > MAX_ITEMS {
            return Err(SnapshotError::TooManyItems {
                num_items,
                max: MAX_ITEMS,
            });
        }
        if data_size > MAX_SNAPSHOT_SIZE {
            return Err(SnapshotError::DataTooLarge {
                data_size,
                max: MAX_SNAPSHOT_SIZE,
            });
        }
        if data_size % 4 != 0 {
            return Err(SnapshotError::MisalignedData { data_size });
        }

        let expected = HEADER_BYTES + num_items * 4 + data_size;
        if bytes.len() != expected {
            return Err(SnapshotError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let words: Vec<i32> = bytes
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let offsets = &words[SNAP_HEADER_WORDS..SNAP_HEADER_WORDS + num_items];
        for (index, &offset) in offsets.iter().enumerate() {
            let invalid = |reason| SnapshotError::InvalidOffset {
                index,
                offset,
                reason,
            };
            if index == 0 && offset != 0 {
                return Err(invalid(OffsetReason::FirstNotZero));
            }
            if offset % 4 != 0 {
                return Err(invalid(OffsetReason::Misaligned));
            }
            if index > 0 {
                let previous = offsets[index - 1];
                if offset <= previous {
                    return Err(invalid(OffsetReason::NotIncreasing { previous }));
                }
            }
            if offset as usize >= data_size {
                return Err(invalid(OffsetReason::OutOfRange { data_size }));
            }
            let span_end = if index + 1 < num_items {
                offsets[index + 1] as usize
            } else {
                data_size
            };
            if span_end < offset as usize + ITEM_HEADER_SIZE {
                return Err(invalid(OffsetReason::SpanTooSmall));
            }
        }

        Ok(Self { words })
    }

    /// Serializes the snapshot to its little-endian blob form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        for word in &self.words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Returns the number of items.
    #[must_use]
    pub fn num_items(&self) -> usize {
        self.words[1] as usize
    }

    /// Returns the size of the data region in bytes.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.words[0] as usize
    }

    /// Returns the total blob length in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        HEADER_BYTES + self.num_items() * 4 + self.data_size()
    }

    fn offsets(&self) -> &[i32] {
        &self.words[SNAP_HEADER_WORDS..SNAP_HEADER_WORDS + self.num_items()]
    }

    fn data_words(&self) -> &[i32] {
        &self.words[SNAP_HEADER_WORDS + self.num_items()..]
    }

    /// Returns the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_items()`; indices come from this
    /// snapshot's own accessors.
    #[must_use]
    pub fn item(&self, index: usize) -> ItemView<'_> {
        let offsets = self.offsets();
        let start = offsets[index] as usize / 4;
        let end = if index + 1 < offsets.len() {
            offsets[index + 1] as usize / 4
        } else {
            self.data_size() / 4
        };
        let data = self.data_words();
        ItemView {
            key: ItemKey::from_raw(data[start]),
            data: &data[start + 1..end],
        }
    }

    /// Returns the payload size of the item at `index` in bytes.
    #[must_use]
    pub fn item_size(&self, index: usize) -> usize {
        let offsets = self.offsets();
        let end = if index + 1 < offsets.len() {
            offsets[index + 1] as usize
        } else {
            self.data_size()
        };
        end - offsets[index] as usize - ITEM_HEADER_SIZE
    }

    /// Returns the application-level type of the item at `index`.
    ///
    /// Wire types below [`OFFSET_UUID_TYPE`] are returned as-is. Higher
    /// types resolve through their declaration item and the registry;
    /// when the declaration is absent, undersized, or unknown to the
    /// registry, the raw wire type is returned.
    #[must_use]
    pub fn item_type(&self, index: usize, registry: &dyn UuidRegistry) -> i32 {
        let raw = self.item(index).type_id();
        if raw < OFFSET_UUID_TYPE {
            return raw;
        }

        let Some(declaration) = self.item_index(ItemKey::new(TYPE_DECLARATION, raw)) else {
            return raw;
        };
        let payload = self.item(declaration).data();
        if payload.len() < 4 {
            return raw;
        }
        let uuid = uuid_from_words([payload[0], payload[1], payload[2], payload[3]]);
        registry.lookup_uuid(uuid).unwrap_or(raw)
    }

    /// Returns the index of the item with `key`, if present.
    #[must_use]
    pub fn item_index(&self, key: ItemKey) -> Option<usize> {
        (0..self.num_items()).find(|&index| self.item(index).key() == key)
    }

    /// Returns the wrapping 32-bit sum of all item payload words.
    ///
    /// An integrity tag for logging and assertions, not a security
    /// checksum.
    #[must_use]
    pub fn crc(&self) -> u32 {
        let mut crc = 0u32;
        for index in 0..self.num_items() {
            for &word in self.item(index).data() {
                crc = crc.wrapping_add(word as u32);
            }
        }
        crc
    }

    /// Logs the snapshot's layout and contents at debug level.
    pub fn debug_dump(&self) {
        tracing::debug!(
            data_size = self.data_size(),
            num_items = self.num_items(),
            crc = self.crc(),
            "snapshot"
        );
        for index in 0..self.num_items() {
            let item = self.item(index);
            tracing::debug!(
                index,
                item_type = item.type_id(),
                id = item.id(),
                words = ?item.data(),
                "item"
            );
        }
    }
}

#[inline]
fn read_word(bytes: &[u8], index: usize) -> i32 {
    let at = index * 4;
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRegistry;

    /// Builds a blob by hand: `items` are `(type, id, payload)`.
    fn blob(items: &[(i32, i32, &[i32])]) -> Vec<u8> {
        let mut offsets = Vec::new();
        let mut data = Vec::new();
        for &(item_type, id, payload) in items {
            offsets.push((data.len() * 4) as i32);
            data.push(ItemKey::new(item_type, id).raw());
            data.extend_from_slice(payload);
        }

        let mut words = vec![(data.len() * 4) as i32, items.len() as i32];
        words.extend_from_slice(&offsets);
        words.extend_from_slice(&data);

        let mut bytes = Vec::new();
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn empty_snapshot() {
        let snap = Snapshot::empty();
        assert_eq!(snap.num_items(), 0);
        assert_eq!(snap.data_size(), 0);
        assert_eq!(snap.byte_len(), 8);
        assert_eq!(snap.crc(), 0);
        assert_eq!(snap.to_bytes(), vec![0u8; 8]);
    }

    #[test]
    fn parse_roundtrip() {
        let bytes = blob(&[(5, 1, &[10, 20]), (5, 2, &[30])]);
        let snap = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(snap.num_items(), 2);
        assert_eq!(snap.data_size(), 12 + 8);
        assert_eq!(snap.to_bytes(), bytes);

        let first = snap.item(0);
        assert_eq!(first.type_id(), 5);
        assert_eq!(first.id(), 1);
        assert_eq!(first.data(), &[10, 20]);
        assert_eq!(snap.item_size(0), 8);
        assert_eq!(snap.item_size(1), 4);
    }

    #[test]
    fn item_index_by_key() {
        let bytes = blob(&[(5, 1, &[0]), (6, 2, &[0])]);
        let snap = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(snap.item_index(ItemKey::new(6, 2)), Some(1));
        assert_eq!(snap.item_index(ItemKey::new(6, 3)), None);
    }

    #[test]
    fn crc_is_wrapping_sum_of_payload_words() {
        let bytes = blob(&[(1, 1, &[i32::MAX, 1]), (1, 2, &[5])]);
        let snap = Snapshot::from_bytes(&bytes).unwrap();
        let expected = (i32::MAX as u32)
            .wrapping_add(1)
            .wrapping_add(5);
        assert_eq!(snap.crc(), expected);
    }

    #[test]
    fn zero_size_payload_is_legal() {
        let bytes = blob(&[(3, 1, &[])]);
        let snap = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(snap.item_size(0), 0);
        assert_eq!(snap.item(0).data(), &[] as &[i32]);
    }

    #[test]
    fn rejects_short_header() {
        let err = Snapshot::from_bytes(&[0; 7]).unwrap_err();
        assert!(matches!(err, SnapshotError::Truncated { .. }));
    }

    #[test]
    fn rejects_negative_header() {
        let mut bytes = blob(&[]);
        bytes[4..8].copy_from_slice(&(-1i32).to_le_bytes());
        let err = Snapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, SnapshotError::NegativeHeader { .. }));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = blob(&[(5, 1, &[10])]);
        bytes.push(0);
        let err = Snapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, SnapshotError::LengthMismatch { .. }));
    }

    #[test]
    fn rejects_nonzero_first_offset() {
        let mut bytes = blob(&[(5, 1, &[10])]);
        bytes[8..12].copy_from_slice(&4i32.to_le_bytes());
        let err = Snapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::InvalidOffset {
                reason: OffsetReason::FirstNotZero,
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_increasing_offsets() {
        let mut bytes = blob(&[(5, 1, &[10]), (5, 2, &[20])]);
        bytes[12..16].copy_from_slice(&0i32.to_le_bytes());
        let err = Snapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::InvalidOffset {
                reason: OffsetReason::NotIncreasing { .. },
                ..
            }
        ));
    }

    #[test]
    fn rejects_misaligned_offset() {
        let mut bytes = blob(&[(5, 1, &[10]), (5, 2, &[20])]);
        bytes[12..16].copy_from_slice(&6i32.to_le_bytes());
        let err = Snapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::InvalidOffset {
                reason: OffsetReason::Misaligned,
                ..
            }
        ));
    }

    #[test]
    fn resolves_declared_types_through_registry() {
        let uuid_words = [
            0x0011_2233,
            0x4455_6677,
            0x8899_aabbu32 as i32,
            0xccdd_eeffu32 as i32,
        ];
        let bytes = blob(&[
            (TYPE_DECLARATION, 0x7fff, &uuid_words),
            (0x7fff, 4, &[42]),
        ]);
        let snap = Snapshot::from_bytes(&bytes).unwrap();

        let mut registry = TypeRegistry::new();
        registry
            .register(70_003, uuid::Uuid::from_bytes([
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc,
                0xdd, 0xee, 0xff,
            ]))
            .unwrap();

        assert_eq!(snap.item_type(1, &registry), 70_003);
        // The declaration item itself is an ordinary low type.
        assert_eq!(snap.item_type(0, &registry), TYPE_DECLARATION);
    }

    #[test]
    fn unresolvable_declared_type_falls_back_to_raw() {
        let bytes = blob(&[(0x7fff, 4, &[42])]);
        let snap = Snapshot::from_bytes(&bytes).unwrap();
        let registry = TypeRegistry::new();
        assert_eq!(snap.item_type(0, &registry), 0x7fff);
    }
}
