//! Tick-indexed world snapshots with per-item delta compression.
//!
//! Each server tick, gameplay stages its world objects into a
//! [`SnapshotBuilder`], which finalizes them into a packed [`Snapshot`]
//! blob. [`SnapshotStorage`] retains recent blobs by tick so a client
//! acknowledgement can name the reference snapshot, and
//! [`SnapshotDelta`] encodes only the changed words between that
//! reference and the newest snapshot - and reconstructs the newest on
//! the receiving side.
//!
//! # Features
//!
//! - Packed, self-describing snapshot blobs with O(1) item access
//! - Per-item word deltas with a deletion list
//! - UUID-declared extended item types via an injected registry
//! - Tick-indexed snapshot history with acknowledgement-driven pruning
//! - Per-type transfer statistics in bit units
//!
//! # Design Principles
//!
//! - **Correctness first** - Every blob invariant is validated at parse
//!   time; decode paths never panic on malformed input.
//! - **No steady-state allocations** - Finished snapshots and deltas go
//!   into caller-provided buffers; scratch space is reused.
//! - **Single-threaded by contract** - Each logical flow owns its
//!   builder, delta engine and storage; there is no shared state inside
//!   the codec.

mod builder;
mod delta;
mod error;
pub mod limits;
mod registry;
mod snap;
mod storage;
mod types;

pub use builder::{IdentityTranslator, SnapshotBuilder, TableTranslator, TypeTranslator};
pub use delta::SnapshotDelta;
pub use error::{
    BuildError, OffsetReason, PackError, RegistryError, SnapshotError, StorageError, UnpackError,
};
pub use registry::{TypeRegistry, UuidRegistry};
pub use snap::{ItemView, Snapshot};
pub use storage::{SnapshotHolder, SnapshotStorage};
pub use types::{ItemKey, Tick};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = Tick::new(0);
        let _ = ItemKey::new(1, 2);
        let _ = Snapshot::empty();
        let _ = SnapshotDelta::new();
        let _ = SnapshotStorage::new();
        let _ = TypeRegistry::new();
    }

    #[test]
    fn limits_are_exported() {
        assert_eq!(limits::MAX_SNAPSHOT_SIZE, 65536);
        assert_eq!(limits::MAX_ITEMS, 1024);
        assert_eq!(limits::MAX_TYPE, 0x7fff);
    }

    #[test]
    fn builder_works_against_the_trait_object_seam() {
        let registry = TypeRegistry::new();
        let mut builder = SnapshotBuilder::new(&registry);
        builder.init().unwrap();
        builder.new_item(1, 1, 4).unwrap();
        assert_eq!(builder.num_items(), 1);
    }
}
