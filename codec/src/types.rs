//! Core types for the codec.

/// A simulation tick number.
///
/// Ticks are monotonically increasing identifiers for simulation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(i32);

impl Tick {
    /// Creates a new tick.
    #[must_use]
    pub const fn new(tick: i32) -> Self {
        Self(tick)
    }

    /// Returns the raw tick value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl From<i32> for Tick {
    fn from(tick: i32) -> Self {
        Self(tick)
    }
}

impl From<Tick> for i32 {
    fn from(tick: Tick) -> Self {
        tick.0
    }
}

/// The identity of an item within a snapshot.
///
/// Packs a 16-bit type into the high half and a 16-bit id into the low
/// half of one word, which is also the item's on-wire header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey(i32);

impl ItemKey {
    /// Packs a type and an id into a key.
    ///
    /// Negative sentinel types are preserved; the id contributes only its
    /// low 16 bits.
    #[must_use]
    pub const fn new(item_type: i32, id: i32) -> Self {
        Self((item_type << 16) | (id & 0xffff))
    }

    /// Creates a key from its raw packed word.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw packed word.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Returns the type half.
    ///
    /// The shift is arithmetic, so a negative sentinel type round-trips.
    #[must_use]
    pub const fn type_id(self) -> i32 {
        self.0 >> 16
    }

    /// Returns the id half.
    #[must_use]
    pub const fn id(self) -> i32 {
        self.0 & 0xffff
    }
}
