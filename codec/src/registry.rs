//! Bidirectional mapping between integer type ids and UUIDs.
//!
//! The registry is populated by the domain layer at startup and injected
//! by reference wherever the codec needs to resolve an extended type. It
//! is never owned or mutated by the codec.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::RegistryError;

/// Resolves extended item types in both directions.
pub trait UuidRegistry {
    /// Returns the type id registered for `uuid`, if any.
    fn lookup_uuid(&self, uuid: Uuid) -> Option<i32>;

    /// Returns the UUID registered for `type_id`, if any.
    fn uuid_of(&self, type_id: i32) -> Option<Uuid>;
}

/// An in-memory [`UuidRegistry`].
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    by_type: HashMap<i32, Uuid>,
    by_uuid: HashMap<Uuid, i32>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type id / UUID pair.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if either side is already registered;
    /// both directions must stay unique.
    pub fn register(&mut self, type_id: i32, uuid: Uuid) -> Result<(), RegistryError> {
        if self.by_type.contains_key(&type_id) {
            return Err(RegistryError::DuplicateTypeId { type_id });
        }
        if let Some(&existing) = self.by_uuid.get(&uuid) {
            return Err(RegistryError::DuplicateUuid { type_id: existing });
        }
        self.by_type.insert(type_id, uuid);
        self.by_uuid.insert(uuid, type_id);
        Ok(())
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl UuidRegistry for TypeRegistry {
    fn lookup_uuid(&self, uuid: Uuid) -> Option<i32> {
        self.by_uuid.get(&uuid).copied()
    }

    fn uuid_of(&self, type_id: i32) -> Option<Uuid> {
        self.by_type.get(&type_id).copied()
    }
}

/// Unpacks a UUID from four words, four big-endian bytes per word.
#[must_use]
pub(crate) fn uuid_from_words(words: [i32; 4]) -> Uuid {
    let mut bytes = [0u8; 16];
    for (group, word) in words.iter().enumerate() {
        bytes[group * 4..group * 4 + 4].copy_from_slice(&(*word as u32).to_be_bytes());
    }
    Uuid::from_bytes(bytes)
}

/// Packs a UUID into four words, four big-endian bytes per word.
#[must_use]
pub(crate) fn uuid_to_words(uuid: Uuid) -> [i32; 4] {
    let bytes = uuid.as_bytes();
    let mut words = [0i32; 4];
    for (group, word) in words.iter_mut().enumerate() {
        let mut chunk = [0u8; 4];
        chunk.copy_from_slice(&bytes[group * 4..group * 4 + 4]);
        *word = u32::from_be_bytes(chunk) as i32;
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_uuid() -> Uuid {
        Uuid::from_bytes([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ])
    }

    #[test]
    fn register_and_lookup_both_directions() {
        let mut registry = TypeRegistry::new();
        registry.register(70001, sample_uuid()).unwrap();

        assert_eq!(registry.lookup_uuid(sample_uuid()), Some(70001));
        assert_eq!(registry.uuid_of(70001), Some(sample_uuid()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_lookups_return_none() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup_uuid(sample_uuid()), None);
        assert_eq!(registry.uuid_of(1), None);
    }

    #[test]
    fn duplicate_type_id_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register(1, sample_uuid()).unwrap();
        let err = registry.register(1, Uuid::from_bytes([1; 16])).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTypeId { type_id: 1 });
    }

    #[test]
    fn duplicate_uuid_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register(1, sample_uuid()).unwrap();
        let err = registry.register(2, sample_uuid()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateUuid { type_id: 1 });
    }

    #[test]
    fn word_packing_is_big_endian_per_group() {
        let words = uuid_to_words(sample_uuid());
        assert_eq!(
            words,
            [
                0x0011_2233,
                0x4455_6677,
                0x8899_aabbu32 as i32,
                0xccdd_eeffu32 as i32,
            ]
        );
        assert_eq!(uuid_from_words(words), sample_uuid());
    }
}
