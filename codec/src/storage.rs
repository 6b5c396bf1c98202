//! Sliding window of recent snapshots, indexed by tick.

use std::collections::VecDeque;

use crate::error::StorageError;
use crate::snap::Snapshot;
use crate::types::Tick;

/// One retained snapshot, with an optional alternate view.
///
/// The alternate shares the primary's tick and timestamp; servers use it
/// for a second parallel view per tick with an identical lifetime.
#[derive(Debug, Clone)]
pub struct SnapshotHolder {
    /// The tick this snapshot describes.
    pub tick: Tick,
    /// Caller-supplied timestamp for the tick.
    pub timestamp: i64,
    /// The primary snapshot.
    pub snap: Snapshot,
    /// The alternate snapshot, when one was requested at `add` time.
    pub alt_snap: Option<Snapshot>,
}

impl SnapshotHolder {
    /// Returns the primary snapshot's blob length in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.snap.byte_len()
    }
}

/// A tick-ordered FIFO of snapshot holders.
///
/// Holders enter at the back with strictly increasing ticks and leave at
/// the front via [`purge_until`](Self::purge_until). Lookup scans from
/// the oldest holder; an unknown tick is `None`.
#[derive(Debug, Default)]
pub struct SnapshotStorage {
    holders: VecDeque<SnapshotHolder>,
}

impl SnapshotStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of retained holders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    /// Returns `true` if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Returns the oldest holder.
    #[must_use]
    pub fn first(&self) -> Option<&SnapshotHolder> {
        self.holders.front()
    }

    /// Returns the newest holder.
    #[must_use]
    pub fn last(&self) -> Option<&SnapshotHolder> {
        self.holders.back()
    }

    /// Parses `data` and retains it for `tick`.
    ///
    /// With `create_alt` a second copy is retained on the same holder.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OutOfOrder`] unless `tick` is greater
    /// than every stored tick, and [`StorageError::Snapshot`] when the
    /// blob fails validation.
    pub fn add(
        &mut self,
        tick: Tick,
        timestamp: i64,
        data: &[u8],
        create_alt: bool,
    ) -> Result<(), StorageError> {
        if let Some(last) = self.holders.back() {
            if tick <= last.tick {
                return Err(StorageError::OutOfOrder {
                    last_tick: last.tick,
                    new_tick: tick,
                });
            }
        }

        let snap = Snapshot::from_bytes(data)?;
        let alt_snap = create_alt.then(|| snap.clone());
        tracing::trace!(tick = tick.raw(), bytes = data.len(), create_alt, "snapshot stored");
        self.holders.push_back(SnapshotHolder {
            tick,
            timestamp,
            snap,
            alt_snap,
        });
        Ok(())
    }

    /// Returns the holder for `tick`, if retained.
    #[must_use]
    pub fn get(&self, tick: Tick) -> Option<&SnapshotHolder> {
        self.holders.iter().find(|holder| holder.tick == tick)
    }

    /// Returns the holder for `tick` mutably, if retained.
    ///
    /// Callers that post-process the alternate view mutate it through
    /// this.
    pub fn get_mut(&mut self, tick: Tick) -> Option<&mut SnapshotHolder> {
        self.holders.iter_mut().find(|holder| holder.tick == tick)
    }

    /// Drops every holder with a tick before `tick`.
    pub fn purge_until(&mut self, tick: Tick) {
        let before = self.holders.len();
        while self
            .holders
            .front()
            .is_some_and(|holder| holder.tick < tick)
        {
            self.holders.pop_front();
        }
        let dropped = before - self.holders.len();
        if dropped > 0 {
            tracing::trace!(tick = tick.raw(), dropped, "snapshots purged");
        }
    }

    /// Drops every holder.
    pub fn purge_all(&mut self) {
        self.holders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_blob() -> Vec<u8> {
        vec![0u8; 8]
    }

    fn blob_with_item(value: i32) -> Vec<u8> {
        let words: [i32; 5] = [8, 1, 0, (1 << 16) | 1, value];
        let mut bytes = Vec::new();
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn add_and_get() {
        let mut storage = SnapshotStorage::new();
        storage
            .add(Tick::new(10), 1000, &blob_with_item(42), false)
            .unwrap();
        storage
            .add(Tick::new(11), 1001, &blob_with_item(43), false)
            .unwrap();

        let holder = storage.get(Tick::new(10)).unwrap();
        assert_eq!(holder.timestamp, 1000);
        assert_eq!(holder.snap.item(0).data(), &[42]);
        assert_eq!(holder.size(), 20);
        assert!(holder.alt_snap.is_none());

        assert!(storage.get(Tick::new(12)).is_none());
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn alternate_shares_tick_and_contents() {
        let mut storage = SnapshotStorage::new();
        storage
            .add(Tick::new(1), 0, &blob_with_item(7), true)
            .unwrap();

        let holder = storage.get(Tick::new(1)).unwrap();
        let alt = holder.alt_snap.as_ref().unwrap();
        assert_eq!(alt.to_bytes(), holder.snap.to_bytes());
    }

    #[test]
    fn alternate_is_independently_mutable() {
        let mut storage = SnapshotStorage::new();
        storage
            .add(Tick::new(1), 0, &blob_with_item(7), true)
            .unwrap();

        let holder = storage.get_mut(Tick::new(1)).unwrap();
        holder.alt_snap = None;
        assert!(storage.get(Tick::new(1)).unwrap().alt_snap.is_none());
    }

    #[test]
    fn rejects_out_of_order_ticks() {
        let mut storage = SnapshotStorage::new();
        storage.add(Tick::new(5), 0, &empty_blob(), false).unwrap();
        let err = storage
            .add(Tick::new(5), 0, &empty_blob(), false)
            .unwrap_err();
        assert!(matches!(err, StorageError::OutOfOrder { .. }));
    }

    #[test]
    fn rejects_malformed_blob() {
        let mut storage = SnapshotStorage::new();
        let err = storage
            .add(Tick::new(1), 0, &[1, 2, 3], false)
            .unwrap_err();
        assert!(matches!(err, StorageError::Snapshot(_)));
        assert!(storage.is_empty());
    }

    #[test]
    fn purge_until_keeps_at_or_after() {
        let mut storage = SnapshotStorage::new();
        for tick in 1..=5 {
            storage
                .add(Tick::new(tick), i64::from(tick), &empty_blob(), false)
                .unwrap();
        }

        storage.purge_until(Tick::new(4));
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.first().unwrap().tick, Tick::new(4));
        assert_eq!(storage.last().unwrap().tick, Tick::new(5));
        assert!(storage.get(Tick::new(3)).is_none());
    }

    #[test]
    fn purge_until_past_everything_empties() {
        let mut storage = SnapshotStorage::new();
        storage.add(Tick::new(1), 0, &empty_blob(), false).unwrap();
        storage.purge_until(Tick::new(100));
        assert!(storage.is_empty());
    }

    #[test]
    fn purge_all_empties() {
        let mut storage = SnapshotStorage::new();
        storage.add(Tick::new(1), 0, &empty_blob(), false).unwrap();
        storage.add(Tick::new(2), 0, &empty_blob(), false).unwrap();
        storage.purge_all();
        assert!(storage.is_empty());
        assert!(storage.first().is_none());
    }
}
