//! Mutable staging buffer that accumulates items into a snapshot.

use uuid::Uuid;

use crate::error::BuildError;
use crate::limits::{
    ITEM_HEADER_SIZE, MAX_EXTENDED_TYPES, MAX_ITEMS, MAX_SNAPSHOT_SIZE, MAX_TYPE, OFFSET_UUID,
    TYPE_DECLARATION,
};
use crate::registry::{uuid_to_words, UuidRegistry};
use crate::types::ItemKey;

/// Maps item types into the wire's type space at emit time.
///
/// The default [`IdentityTranslator`] leaves types untouched; a
/// [`TableTranslator`] bridges to a legacy protocol's type ids. A
/// negative result means "no equivalent": the item is still emitted,
/// carrying the negative type as a sentinel, so readers can skip it
/// while item indices stay aligned.
pub trait TypeTranslator {
    /// Returns the wire type for `item_type`.
    fn translate(&self, item_type: i32) -> i32;
}

/// The no-op translator.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranslator;

impl TypeTranslator for IdentityTranslator {
    fn translate(&self, item_type: i32) -> i32 {
        item_type
    }
}

/// A table-driven translator for legacy-protocol bridging.
///
/// Types absent from the table translate to `-1`.
#[derive(Debug, Default, Clone)]
pub struct TableTranslator {
    map: std::collections::HashMap<i32, i32>,
}

impl TableTranslator {
    /// Creates an empty table (everything translates to `-1`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping from `item_type` to `wire_type`.
    pub fn map(&mut self, item_type: i32, wire_type: i32) {
        self.map.insert(item_type, wire_type);
    }
}

impl TypeTranslator for TableTranslator {
    fn translate(&self, item_type: i32) -> i32 {
        self.map.get(&item_type).copied().unwrap_or(-1)
    }
}

static IDENTITY: IdentityTranslator = IdentityTranslator;

/// Accumulates items and finalizes them into a packed snapshot blob.
///
/// A builder is created once per peer session and re-used across ticks
/// via [`init`](Self::init). The extended-type slot table survives
/// `init` so declaration items keep stable synthetic types for the
/// session's lifetime.
pub struct SnapshotBuilder<'r> {
    registry: &'r dyn UuidRegistry,
    translator: &'r dyn TypeTranslator,
    /// Data region: item key words and payload words.
    data: Vec<i32>,
    /// Byte offset of each item within the data region.
    offsets: Vec<i32>,
    /// Slot index -> (application type id, its UUID). Append-only.
    extended: Vec<(i32, Uuid)>,
}

impl<'r> SnapshotBuilder<'r> {
    /// Creates a builder that emits types unchanged.
    #[must_use]
    pub fn new(registry: &'r dyn UuidRegistry) -> Self {
        Self::with_translator(registry, &IDENTITY)
    }

    /// Creates a builder with an injected type translator.
    #[must_use]
    pub fn with_translator(
        registry: &'r dyn UuidRegistry,
        translator: &'r dyn TypeTranslator,
    ) -> Self {
        Self {
            registry,
            translator,
            data: Vec::new(),
            offsets: Vec::new(),
            extended: Vec::new(),
        }
    }

    /// Resets the staging buffers for a new snapshot.
    ///
    /// Declaration items for every known extended type are re-emitted at
    /// the head of the snapshot, in slot order.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the declaration items do not fit.
    pub fn init(&mut self) -> Result<(), BuildError> {
        self.data.clear();
        self.offsets.clear();
        for slot in 0..self.extended.len() {
            self.emit_declaration(slot)?;
        }
        Ok(())
    }

    /// Returns the number of staged items.
    #[must_use]
    pub fn num_items(&self) -> usize {
        self.offsets.len()
    }

    /// Returns the staged data region size in bytes.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data.len() * 4
    }

    /// Returns the number of registered extended types.
    #[must_use]
    pub fn num_extended_types(&self) -> usize {
        self.extended.len()
    }

    /// Returns the byte length [`finish`](Self::finish) will produce.
    #[must_use]
    pub fn finished_size(&self) -> usize {
        8 + self.offsets.len() * 4 + self.data_size()
    }

    /// Reserves a new item and returns its zeroed payload words.
    ///
    /// `size` is the payload length in bytes and must be a multiple
    /// of 4. Types at or above [`OFFSET_UUID`] are mapped to a synthetic
    /// declaration-range type, registering a slot and emitting the
    /// declaration item on first encounter. Other types pass through the
    /// translator.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when an item-count or data bound would be
    /// violated, when the extended-type table is full, or when the
    /// registry has no UUID for an extended type. The caller must treat
    /// capacity failures as fatal oversubscription of the snapshot.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not a multiple of 4.
    pub fn new_item(
        &mut self,
        item_type: i32,
        id: i32,
        size: usize,
    ) -> Result<&mut [i32], BuildError> {
        let wire_type = if item_type >= OFFSET_UUID {
            let slot = self.extended_slot(item_type)?;
            MAX_TYPE - slot as i32
        } else {
            self.translator.translate(item_type)
        };
        self.push_item(wire_type, id, size)
    }

    /// Returns the payload of the staged item with `key`, if present.
    pub fn get_item_data(&mut self, key: ItemKey) -> Option<&mut [i32]> {
        for index in 0..self.offsets.len() {
            let start = self.offsets[index] as usize / 4;
            if self.data[start] == key.raw() {
                let end = if index + 1 < self.offsets.len() {
                    self.offsets[index + 1] as usize / 4
                } else {
                    self.data.len()
                };
                return Some(&mut self.data[start + 1..end]);
            }
        }
        None
    }

    /// Writes the finished snapshot blob into `out` and returns its
    /// length.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OutputTooSmall`] if `out` cannot hold
    /// [`finished_size`](Self::finished_size) bytes.
    pub fn finish(&self, out: &mut [u8]) -> Result<usize, BuildError> {
        let needed = self.finished_size();
        if out.len() < needed {
            return Err(BuildError::OutputTooSmall {
                needed,
                available: out.len(),
            });
        }

        let mut at = 0;
        let mut put = |word: i32, at: &mut usize| {
            out[*at..*at + 4].copy_from_slice(&word.to_le_bytes());
            *at += 4;
        };
        put(self.data_size() as i32, &mut at);
        put(self.offsets.len() as i32, &mut at);
        for &offset in &self.offsets {
            put(offset, &mut at);
        }
        for &word in &self.data {
            put(word, &mut at);
        }
        Ok(needed)
    }

    fn extended_slot(&mut self, type_id: i32) -> Result<usize, BuildError> {
        if let Some(slot) = self.extended.iter().position(|&(t, _)| t == type_id) {
            return Ok(slot);
        }
        if self.extended.len() == MAX_EXTENDED_TYPES {
            return Err(BuildError::TooManyExtendedTypes {
                max: MAX_EXTENDED_TYPES,
            });
        }
        let uuid = self
            .registry
            .uuid_of(type_id)
            .ok_or(BuildError::MissingUuid { type_id })?;

        let slot = self.extended.len();
        self.extended.push((type_id, uuid));
        self.emit_declaration(slot)?;
        Ok(slot)
    }

    fn emit_declaration(&mut self, slot: usize) -> Result<(), BuildError> {
        let (_, uuid) = self.extended[slot];
        let words = uuid_to_words(uuid);
        let wire_type = self.translator.translate(TYPE_DECLARATION);
        let payload = self.push_item(wire_type, MAX_TYPE - slot as i32, 16)?;
        payload.copy_from_slice(&words);
        Ok(())
    }

    fn push_item(
        &mut self,
        wire_type: i32,
        id: i32,
        size: usize,
    ) -> Result<&mut [i32], BuildError> {
        assert!(size % 4 == 0, "item size must be a multiple of 4");

        if self.offsets.len() == MAX_ITEMS {
            return Err(BuildError::TooManyItems { max: MAX_ITEMS });
        }
        let needed = self.data_size() + ITEM_HEADER_SIZE + size;
        if needed > MAX_SNAPSHOT_SIZE {
            return Err(BuildError::DataOverflow {
                needed,
                max: MAX_SNAPSHOT_SIZE,
            });
        }

        self.offsets.push(self.data_size() as i32);
        self.data.push(ItemKey::new(wire_type, id).raw());
        let start = self.data.len();
        self.data.resize(start + size / 4, 0);
        Ok(&mut self.data[start..])
    }
}
