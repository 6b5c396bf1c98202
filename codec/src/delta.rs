//! Delta construction and application between two snapshots.
//!
//! A delta is a word stream: `[num_deleted, num_updates, num_temp]`,
//! then `num_deleted` keys of removed items, then `num_updates` update
//! records. An update record is `type, id, [size_words], payload...`;
//! the size word is omitted for types with a static size. Payload words
//! are per-word differences against the prior item when one of the same
//! key and size exists, else the literal new words.
//!
//! The reserved `num_temp` count stays on the wire for compatibility
//! and is always zero in this revision.

use crate::builder::SnapshotBuilder;
use crate::error::{PackError, UnpackError};
use crate::limits::MAX_STATIC_TYPES;
use crate::snap::Snapshot;
use crate::types::ItemKey;

const HEADER_WORDS: usize = 3;
const HASH_BUCKETS: usize = 256;
const BUCKET_SLOTS: usize = 64;

/// Computes and applies deltas, tracking per-type transfer statistics.
///
/// The statistics are observational only and never influence decoding.
/// Scratch buffers are reused across calls, so a long-lived engine does
/// not allocate in steady state.
pub struct SnapshotDelta {
    /// Static payload size in bytes per type; zero means "on the wire".
    static_sizes: [usize; MAX_STATIC_TYPES],
    /// Downloaded volume per wire type, in bits.
    data_rate: Vec<u64>,
    /// Applied update records per wire type.
    data_updates: Vec<u64>,
    hash: ItemHash,
    past_indices: Vec<i32>,
    update_headers: Vec<(i32, usize)>,
}

impl Default for SnapshotDelta {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotDelta {
    /// Creates a delta engine with an empty static-size table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            static_sizes: [0; MAX_STATIC_TYPES],
            data_rate: vec![0; 1 << 16],
            data_updates: vec![0; 1 << 16],
            hash: ItemHash::new(),
            past_indices: Vec::with_capacity(crate::limits::MAX_ITEMS),
            update_headers: Vec::new(),
        }
    }

    /// Registers a static payload size (in bytes) for `item_type`.
    ///
    /// Types outside the static table are ignored. `size` must be a
    /// multiple of 4; zero restores "size on the wire".
    pub fn set_static_size(&mut self, item_type: i32, size: usize) {
        debug_assert!(size % 4 == 0, "static size must be a multiple of 4");
        if (0..MAX_STATIC_TYPES as i32).contains(&item_type) {
            self.static_sizes[item_type as usize] = size;
        }
    }

    /// Returns the bits downloaded for `item_type` so far.
    #[must_use]
    pub fn data_rate(&self, item_type: i32) -> u64 {
        stat(&self.data_rate, item_type)
    }

    /// Returns the number of update records applied for `item_type`.
    #[must_use]
    pub fn updates(&self, item_type: i32) -> u64 {
        stat(&self.data_updates, item_type)
    }

    fn static_size_words(&self, item_type: i32) -> Option<usize> {
        if (0..MAX_STATIC_TYPES as i32).contains(&item_type) {
            let size = self.static_sizes[item_type as usize];
            if size != 0 {
                return Some(size / 4);
            }
        }
        None
    }

    /// Encodes the difference between `from` and `to` into `out`.
    ///
    /// Returns the encoded byte length, or `Ok(0)` when the snapshots
    /// are identical, signalling "send nothing".
    ///
    /// # Errors
    ///
    /// Returns [`PackError::OutputTooSmall`] if `out` cannot hold the
    /// delta.
    pub fn create_delta(
        &mut self,
        from: &Snapshot,
        to: &Snapshot,
        out: &mut [u8],
    ) -> Result<usize, PackError> {
        let mut writer = WordWriter::new(out);
        writer.require(HEADER_WORDS)?;
        writer.advance(HEADER_WORDS);

        // Pass 1: items of `from` that are gone in `to`.
        self.hash.rebuild(to);
        let mut num_deleted = 0i32;
        for index in 0..from.num_items() {
            let key = from.item(index).key().raw();
            if self.hash.find(key).is_none() {
                writer.put(key)?;
                num_deleted += 1;
            }
        }

        // Prefetch prior indices in a separate pass; it keeps the hash
        // hot while the item walk below touches payload memory.
        self.hash.rebuild(from);
        self.past_indices.clear();
        for index in 0..to.num_items() {
            let key = to.item(index).key().raw();
            self.past_indices
                .push(self.hash.find(key).map_or(-1, |found| found as i32));
        }

        // Pass 2: update records in `to` order.
        let mut num_updates = 0i32;
        for index in 0..to.num_items() {
            let item = to.item(index);
            let size_words = to.item_size(index) / 4;
            let wire_type = item.type_id();
            let include_size = self.static_size_words(wire_type).is_none();
            let header_words = if include_size { 3 } else { 2 };

            let past = self.past_indices[index];
            let prior = if past >= 0 && from.item_size(past as usize) == size_words * 4 {
                Some(from.item(past as usize))
            } else {
                None
            };

            match prior {
                // A key present on both sides with a different size falls
                // through to the literal branch below.
                Some(prior) => {
                    let start = writer.pos();
                    writer.require(header_words + size_words)?;
                    let mut nonzero = 0i32;
                    for word in 0..size_words {
                        let diff = item.data()[word].wrapping_sub(prior.data()[word]);
                        writer.put_at(start + header_words + word, diff);
                        nonzero |= diff;
                    }
                    if nonzero != 0 {
                        writer.put_at(start, wire_type);
                        writer.put_at(start + 1, item.id());
                        if include_size {
                            writer.put_at(start + 2, size_words as i32);
                        }
                        writer.advance(header_words + size_words);
                        num_updates += 1;
                    }
                }
                None => {
                    writer.require(header_words + size_words)?;
                    writer.put(wire_type)?;
                    writer.put(item.id())?;
                    if include_size {
                        writer.put(size_words as i32)?;
                    }
                    for &word in item.data() {
                        writer.put(word)?;
                    }
                    num_updates += 1;
                }
            }
        }

        if num_deleted == 0 && num_updates == 0 {
            return Ok(0);
        }
        writer.put_at(0, num_deleted);
        writer.put_at(1, num_updates);
        writer.put_at(2, 0);

        let bytes = writer.byte_len();
        tracing::trace!(num_deleted, num_updates, bytes, "delta encoded");
        Ok(bytes)
    }

    /// Applies the delta in `src` to `from`, rebuilding the new snapshot
    /// through `builder` and writing its blob into `out`.
    ///
    /// Returns the blob's byte length. An empty `src` rebuilds `from`
    /// verbatim. On error the builder holds partial state and must be
    /// discarded (re-`init`) by the caller; statistics updated before
    /// the failure stay as-is.
    ///
    /// # Errors
    ///
    /// Returns an [`UnpackError`] naming the failure; `legacy_code()`
    /// maps it onto the historical negative return value.
    pub fn unpack_delta(
        &mut self,
        from: &Snapshot,
        builder: &mut SnapshotBuilder<'_>,
        src: &[u8],
        out: &mut [u8],
    ) -> Result<usize, UnpackError> {
        builder.init()?;

        if src.is_empty() {
            for index in 0..from.num_items() {
                let item = from.item(index);
                let payload = builder.new_item(item.type_id(), item.id(), item.size())?;
                payload.copy_from_slice(item.data());
            }
            return Ok(builder.finish(out)?);
        }

        let words = src.len() / 4;
        if words < HEADER_WORDS {
            return Err(UnpackError::TruncatedHeader {
                needed_words: HEADER_WORDS,
                available_words: words,
            });
        }

        let num_deleted = word_at(src, 0);
        let num_updates = word_at(src, 1);
        let num_temp = word_at(src, 2);
        if num_deleted < 0 || num_updates < 0 {
            return Err(UnpackError::NegativeCount {
                num_deleted,
                num_updates,
            });
        }
        if num_temp != 0 {
            return Err(UnpackError::TempItemsPresent { count: num_temp });
        }

        let deleted_start = HEADER_WORDS;
        let deleted_end = deleted_start + num_deleted as usize;
        if deleted_end > words {
            return Err(UnpackError::TruncatedHeader {
                needed_words: deleted_end,
                available_words: words,
            });
        }

        // Walk the update records once up front, validating layout and
        // collecting `(key, size)` pairs. Knowing the incoming sizes lets
        // the copy phase below drop prior items that an update replaces
        // with a different size.
        self.update_headers.clear();
        let mut cursor = deleted_end;
        for update_index in 0..num_updates as usize {
            if cursor + 2 > words {
                return Err(UnpackError::TruncatedHeader {
                    needed_words: cursor + 2,
                    available_words: words,
                });
            }
            let item_type = word_at(src, cursor);
            if !(0..=0xffff).contains(&item_type) {
                return Err(UnpackError::MalformedTypeOrSize {
                    item_type,
                    size_words: 0,
                });
            }
            let id = word_at(src, cursor + 1);
            cursor += 2;

            let size_words = match self.static_size_words(item_type) {
                Some(size_words) => size_words,
                None => {
                    if cursor >= words {
                        return Err(UnpackError::TruncatedSize { update_index });
                    }
                    let raw = word_at(src, cursor);
                    cursor += 1;
                    if raw < 0 {
                        return Err(UnpackError::MalformedTypeOrSize {
                            item_type,
                            size_words: raw,
                        });
                    }
                    raw as usize
                }
            };
            if size_words > words - cursor {
                return Err(UnpackError::MalformedTypeOrSize {
                    item_type,
                    size_words: size_words as i32,
                });
            }
            self.update_headers
                .push((ItemKey::new(item_type, id).raw(), size_words));
            cursor += size_words;
        }

        // Copy every surviving prior item. An item is dropped when its
        // key is in the deleted list or when an update re-creates it
        // with a different size.
        for index in 0..from.num_items() {
            let item = from.item(index);
            let key = item.key().raw();
            let deleted = (deleted_start..deleted_end).any(|at| word_at(src, at) == key);
            if deleted {
                continue;
            }
            let resized = self
                .update_headers
                .iter()
                .any(|&(update_key, size_words)| {
                    update_key == key && size_words * 4 != item.size()
                });
            if resized {
                continue;
            }
            let payload = builder.new_item(item.type_id(), item.id(), item.size())?;
            payload.copy_from_slice(item.data());
        }

        // Apply the update records.
        let mut cursor = deleted_end;
        for record_index in 0..num_updates as usize {
            let (raw_key, size_words) = self.update_headers[record_index];
            let key = ItemKey::from_raw(raw_key);
            cursor += 2;
            if self.static_size_words(key.type_id()).is_none() {
                cursor += 1;
            }

            if builder.get_item_data(key).is_none() {
                builder.new_item(key.type_id(), key.id(), size_words * 4)?;
            }
            // A staged item of the wrong length means the delta carried
            // conflicting sizes for one key.
            let payload = builder
                .get_item_data(key)
                .filter(|payload| payload.len() == size_words)
                .ok_or(UnpackError::MalformedTypeOrSize {
                    item_type: key.type_id(),
                    size_words: size_words as i32,
                })?;

            let prior = from
                .item_index(key)
                .filter(|&at| from.item_size(at) == size_words * 4)
                .map(|at| from.item(at));

            let stat_at = key.type_id() as usize;
            match prior {
                Some(prior) => {
                    let mut bits = 0u64;
                    for word in 0..size_words {
                        let diff = word_at(src, cursor + word);
                        payload[word] = prior.data()[word].wrapping_add(diff);
                        bits += if diff == 0 {
                            1
                        } else {
                            8 * varint::packed_len(diff) as u64
                        };
                    }
                    self.data_rate[stat_at] += bits;
                }
                None => {
                    for word in 0..size_words {
                        payload[word] = word_at(src, cursor + word);
                    }
                    self.data_rate[stat_at] += size_words as u64 * 32;
                }
            }
            self.data_updates[stat_at] += 1;
            cursor += size_words;
        }

        let len = builder.finish(out)?;
        tracing::trace!(
            num_deleted,
            num_updates,
            bytes = len,
            "delta applied"
        );
        Ok(len)
    }
}

fn stat(table: &[u64], item_type: i32) -> u64 {
    if (0..=0xffff).contains(&item_type) {
        table[item_type as usize]
    } else {
        0
    }
}

#[inline]
fn word_at(bytes: &[u8], index: usize) -> i32 {
    let at = index * 4;
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Fixed-geometry key hash: 256 buckets of 64 slots.
///
/// The geometry favours cache locality at realistic item counts. A full
/// bucket silently drops further keys; a dropped key merely degrades to
/// the caller's miss path, it is never resolved wrongly.
struct ItemHash {
    buckets: Vec<Bucket>,
}

#[derive(Clone, Copy)]
struct Bucket {
    num: u8,
    keys: [i32; BUCKET_SLOTS],
    indices: [u16; BUCKET_SLOTS],
}

impl Bucket {
    const EMPTY: Self = Self {
        num: 0,
        keys: [0; BUCKET_SLOTS],
        indices: [0; BUCKET_SLOTS],
    };
}

impl ItemHash {
    fn new() -> Self {
        Self {
            buckets: vec![Bucket::EMPTY; HASH_BUCKETS],
        }
    }

    fn rebuild(&mut self, snapshot: &Snapshot) {
        for bucket in &mut self.buckets {
            bucket.num = 0;
        }
        for index in 0..snapshot.num_items() {
            let key = snapshot.item(index).key().raw();
            let bucket = &mut self.buckets[bucket_of(key)];
            let used = bucket.num as usize;
            if used < BUCKET_SLOTS {
                bucket.keys[used] = key;
                bucket.indices[used] = index as u16;
                bucket.num += 1;
            }
        }
    }

    fn find(&self, key: i32) -> Option<usize> {
        let bucket = &self.buckets[bucket_of(key)];
        bucket.keys[..bucket.num as usize]
            .iter()
            .position(|&candidate| candidate == key)
            .map(|slot| bucket.indices[slot] as usize)
    }
}

fn bucket_of(key: i32) -> usize {
    (((key >> 12) & 0xf0) | (key & 0xf)) as usize
}

/// Bounded little-endian word cursor over a caller-provided buffer.
struct WordWriter<'a> {
    out: &'a mut [u8],
    len: usize,
}

impl<'a> WordWriter<'a> {
    fn new(out: &'a mut [u8]) -> Self {
        Self { out, len: 0 }
    }

    fn capacity(&self) -> usize {
        self.out.len() / 4
    }

    fn pos(&self) -> usize {
        self.len
    }

    fn byte_len(&self) -> usize {
        self.len * 4
    }

    fn require(&self, words: usize) -> Result<(), PackError> {
        if self.len + words > self.capacity() {
            return Err(PackError::OutputTooSmall {
                needed_words: self.len + words,
                available_words: self.capacity(),
            });
        }
        Ok(())
    }

    fn advance(&mut self, words: usize) {
        self.len += words;
    }

    fn put(&mut self, word: i32) -> Result<(), PackError> {
        self.require(1)?;
        self.put_at(self.len, word);
        self.len += 1;
        Ok(())
    }

    /// Writes without advancing; the slot must have been `require`d.
    fn put_at(&mut self, index: usize, word: i32) {
        self.out[index * 4..index * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bucket_function_matches_wire_contract() {
        assert_eq!(bucket_of(0), 0);
        assert_eq!(bucket_of((5 << 16) | 1), (5 << 4) | 1);
        assert_eq!(bucket_of(-1), 0xff);
    }

    #[test]
    fn hash_finds_items_and_reports_misses() {
        let mut offsets = Vec::new();
        let mut data = Vec::new();
        for id in 0..5 {
            offsets.push((data.len() * 4) as i32);
            data.push(ItemKey::new(7, id).raw());
            data.push(id * 10);
        }
        let mut bytes = Vec::new();
        for word in [(data.len() * 4) as i32, 5]
            .iter()
            .chain(offsets.iter())
            .chain(data.iter())
        {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let snap = Snapshot::from_bytes(&bytes).unwrap();

        let mut hash = ItemHash::new();
        hash.rebuild(&snap);
        for id in 0..5 {
            assert_eq!(hash.find(ItemKey::new(7, id).raw()), Some(id as usize));
        }
        assert_eq!(hash.find(ItemKey::new(7, 5).raw()), None);
        assert_eq!(hash.find(ItemKey::new(8, 0).raw()), None);
    }

    #[test]
    fn word_writer_bounds() {
        let mut buf = [0u8; 8];
        let mut writer = WordWriter::new(&mut buf);
        writer.put(1).unwrap();
        writer.put(2).unwrap();
        assert_eq!(
            writer.put(3),
            Err(PackError::OutputTooSmall {
                needed_words: 3,
                available_words: 2
            })
        );
        assert_eq!(writer.byte_len(), 8);
    }

    #[test]
    fn static_size_table_bounds() {
        let mut delta = SnapshotDelta::new();
        delta.set_static_size(5, 8);
        delta.set_static_size(-1, 8);
        delta.set_static_size(MAX_STATIC_TYPES as i32, 8);
        assert_eq!(delta.static_size_words(5), Some(2));
        assert_eq!(delta.static_size_words(-1), None);
        assert_eq!(delta.static_size_words(MAX_STATIC_TYPES as i32), None);
        delta.set_static_size(5, 0);
        assert_eq!(delta.static_size_words(5), None);
    }

    #[test]
    fn stats_ignore_out_of_range_types() {
        let delta = SnapshotDelta::new();
        assert_eq!(delta.data_rate(-5), 0);
        assert_eq!(delta.updates(0x10000), 0);
    }
}
