//! Introspection and debugging tools for the snapshot codec.
//!
//! This crate turns snapshot and delta blobs into structured reports:
//!
//! - Decode and print a snapshot's layout, items and CRC
//! - Diff two snapshots and explain the delta's size and traffic
//! - Apply a delta and verify the result
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not
//!   afterthoughts.
//! - **Human-readable output** - Make it easy to understand what the
//!   codec is doing.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use codec::{Snapshot, SnapshotBuilder, SnapshotDelta, TypeRegistry};
use serde::Serialize;

/// Largest possible snapshot blob.
const OUT_BYTES: usize = 8 + 4 * codec::limits::MAX_ITEMS + codec::limits::MAX_SNAPSHOT_SIZE;

/// A decoded snapshot, ready for serialization.
#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    pub byte_len: usize,
    pub data_size: usize,
    pub num_items: usize,
    pub crc: u32,
    pub items: Vec<ItemReport>,
}

/// One item inside a [`SnapshotReport`].
#[derive(Debug, Serialize)]
pub struct ItemReport {
    pub index: usize,
    pub item_type: i32,
    pub id: i32,
    pub size: usize,
    pub words: Vec<i32>,
}

/// A decoded delta, ready for serialization.
#[derive(Debug, Serialize)]
pub struct DeltaReport {
    /// Raw delta length in bytes (words on the wire).
    pub raw_bytes: usize,
    /// Length after the outer framing's varint pass.
    pub packed_bytes: usize,
    pub num_deleted: usize,
    pub num_updates: usize,
    pub deleted_keys: Vec<DeletedKey>,
    pub traffic: Vec<TypeTraffic>,
}

/// A deleted item key inside a [`DeltaReport`].
#[derive(Debug, Serialize)]
pub struct DeletedKey {
    pub item_type: i32,
    pub id: i32,
}

/// Per-type transfer statistics inside a [`DeltaReport`].
#[derive(Debug, Serialize)]
pub struct TypeTraffic {
    pub item_type: i32,
    pub updates: u64,
    pub bits: u64,
}

/// Parses a snapshot blob into a report.
pub fn inspect_snapshot(bytes: &[u8]) -> Result<SnapshotReport> {
    let snap = Snapshot::from_bytes(bytes).context("parse snapshot")?;

    let items = (0..snap.num_items())
        .map(|index| {
            let item = snap.item(index);
            ItemReport {
                index,
                item_type: item.type_id(),
                id: item.id(),
                size: item.size(),
                words: item.data().to_vec(),
            }
        })
        .collect();

    Ok(SnapshotReport {
        byte_len: snap.byte_len(),
        data_size: snap.data_size(),
        num_items: snap.num_items(),
        crc: snap.crc(),
        items,
    })
}

/// Diffs two snapshot blobs and reports the delta's cost.
///
/// `static_sizes` registers `(type, size)` pairs before encoding, the
/// same table both peers of the session would carry.
pub fn diff_snapshots(
    from_bytes: &[u8],
    to_bytes: &[u8],
    static_sizes: &[(i32, usize)],
) -> Result<DeltaReport> {
    let from = Snapshot::from_bytes(from_bytes).context("parse reference snapshot")?;
    let to = Snapshot::from_bytes(to_bytes).context("parse target snapshot")?;

    let mut delta = SnapshotDelta::new();
    for &(item_type, size) in static_sizes {
        delta.set_static_size(item_type, size);
    }

    let mut encoded = vec![0u8; OUT_BYTES];
    let raw_bytes = delta
        .create_delta(&from, &to, &mut encoded)
        .context("encode delta")?;
    encoded.truncate(raw_bytes);

    if raw_bytes == 0 {
        return Ok(DeltaReport {
            raw_bytes: 0,
            packed_bytes: 0,
            num_deleted: 0,
            num_updates: 0,
            deleted_keys: Vec::new(),
            traffic: Vec::new(),
        });
    }

    // Apply the delta locally; the engine's statistics then describe
    // exactly this transfer.
    let registry = TypeRegistry::new();
    let mut builder = SnapshotBuilder::new(&registry);
    let mut out = vec![0u8; OUT_BYTES];
    delta
        .unpack_delta(&from, &mut builder, &encoded, &mut out)
        .map_err(|err| anyhow::anyhow!("{err} (code {})", err.legacy_code()))
        .context("apply delta back")?;

    let words: Vec<i32> = encoded
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let num_deleted = words[0] as usize;
    let num_updates = words[1] as usize;
    let deleted_keys = words[3..3 + num_deleted]
        .iter()
        .map(|&raw| {
            let key = codec::ItemKey::from_raw(raw);
            DeletedKey {
                item_type: key.type_id(),
                id: key.id(),
            }
        })
        .collect();

    let mut packed = vec![0u8; words.len() * varint::MAX_PACKED_BYTES];
    let packed_bytes = varint::compress(&words, &mut packed).context("varint pass")?;

    let mut traffic: Vec<TypeTraffic> = Vec::new();
    for index in 0..to.num_items() {
        let item_type = to.item(index).type_id();
        if traffic.iter().any(|entry| entry.item_type == item_type) {
            continue;
        }
        let updates = delta.updates(item_type);
        if updates > 0 {
            traffic.push(TypeTraffic {
                item_type,
                updates,
                bits: delta.data_rate(item_type),
            });
        }
    }

    Ok(DeltaReport {
        raw_bytes,
        packed_bytes,
        num_deleted,
        num_updates,
        deleted_keys,
        traffic,
    })
}

/// Applies a delta blob to a snapshot blob, returning the new blob.
///
/// The rebuilt snapshot is re-validated before it is returned.
pub fn apply_delta(from_bytes: &[u8], delta_bytes: &[u8]) -> Result<Vec<u8>> {
    let from = Snapshot::from_bytes(from_bytes).context("parse reference snapshot")?;

    let registry = TypeRegistry::new();
    let mut builder = SnapshotBuilder::new(&registry);
    let mut delta = SnapshotDelta::new();
    let mut out = vec![0u8; OUT_BYTES];
    let len = delta
        .unpack_delta(&from, &mut builder, delta_bytes, &mut out)
        .map_err(|err| anyhow::anyhow!("{err} (code {})", err.legacy_code()))
        .context("apply delta")?;
    out.truncate(len);

    let rebuilt = Snapshot::from_bytes(&out).context("validate rebuilt snapshot")?;
    if rebuilt.byte_len() != len {
        bail!("rebuilt snapshot length disagrees with its header");
    }
    Ok(out)
}

/// Renders a [`SnapshotReport`] as aligned plain text.
#[must_use]
pub fn format_snapshot_pretty(report: &SnapshotReport) -> String {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "snapshot: {} bytes, {} items, data {} bytes, crc {:08x}",
        report.byte_len, report.num_items, report.data_size, report.crc
    );
    for item in &report.items {
        let _ = writeln!(
            text,
            "  [{:3}] type={:6} id={:5} size={:5}  {:?}",
            item.index, item.item_type, item.id, item.size, item.words
        );
    }
    text
}

/// Renders a [`DeltaReport`] as aligned plain text.
#[must_use]
pub fn format_delta_pretty(report: &DeltaReport) -> String {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "delta: {} bytes raw, {} bytes packed, {} deleted, {} updates",
        report.raw_bytes, report.packed_bytes, report.num_deleted, report.num_updates
    );
    for key in &report.deleted_keys {
        let _ = writeln!(text, "  deleted type={} id={}", key.item_type, key.id);
    }
    for entry in &report.traffic {
        let _ = writeln!(
            text,
            "  type={:6} updates={:4} bits={:8}",
            entry.item_type, entry.updates, entry.bits
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_bytes(items: &[(i32, i32, Vec<i32>)]) -> Vec<u8> {
        let registry = TypeRegistry::new();
        let mut builder = SnapshotBuilder::new(&registry);
        builder.init().unwrap();
        for (item_type, id, payload) in items {
            builder
                .new_item(*item_type, *id, payload.len() * 4)
                .unwrap()
                .copy_from_slice(payload);
        }
        let mut out = vec![0u8; builder.finished_size()];
        builder.finish(&mut out).unwrap();
        out
    }

    #[test]
    fn inspect_reports_items_and_crc() {
        let bytes = snapshot_bytes(&[(5, 1, vec![10, 20]), (9, 2, vec![30])]);
        let report = inspect_snapshot(&bytes).unwrap();
        assert_eq!(report.num_items, 2);
        assert_eq!(report.items[0].words, vec![10, 20]);
        assert_eq!(report.crc, 60);
        assert_eq!(report.byte_len, bytes.len());
    }

    #[test]
    fn inspect_rejects_garbage() {
        assert!(inspect_snapshot(&[1, 2, 3]).is_err());
    }

    #[test]
    fn diff_reports_traffic_and_packing() {
        let from = snapshot_bytes(&[(9, 1, vec![100, 200])]);
        let to = snapshot_bytes(&[(9, 1, vec![100, 201])]);
        let report = diff_snapshots(&from, &to, &[]).unwrap();

        assert_eq!(report.num_deleted, 0);
        assert_eq!(report.num_updates, 1);
        assert_eq!(report.traffic.len(), 1);
        assert_eq!(report.traffic[0].updates, 1);
        assert!(report.packed_bytes < report.raw_bytes);
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let blob = snapshot_bytes(&[(9, 1, vec![7])]);
        let report = diff_snapshots(&blob, &blob, &[]).unwrap();
        assert_eq!(report.raw_bytes, 0);
        assert_eq!(report.num_updates, 0);
    }

    #[test]
    fn diff_lists_deleted_keys() {
        let from = snapshot_bytes(&[(9, 1, vec![7]), (9, 2, vec![8])]);
        let to = snapshot_bytes(&[(9, 1, vec![7])]);
        let report = diff_snapshots(&from, &to, &[]).unwrap();
        assert_eq!(report.num_deleted, 1);
        assert_eq!(report.deleted_keys[0].item_type, 9);
        assert_eq!(report.deleted_keys[0].id, 2);
    }

    #[test]
    fn apply_round_trips_through_the_report_path() {
        let from = snapshot_bytes(&[(9, 1, vec![1, 2])]);
        let to = snapshot_bytes(&[(9, 1, vec![3, 2]), (9, 5, vec![4])]);

        let mut delta = SnapshotDelta::new();
        let from_snap = Snapshot::from_bytes(&from).unwrap();
        let to_snap = Snapshot::from_bytes(&to).unwrap();
        let mut encoded = vec![0u8; OUT_BYTES];
        let len = delta.create_delta(&from_snap, &to_snap, &mut encoded).unwrap();

        let rebuilt = apply_delta(&from, &encoded[..len]).unwrap();
        assert_eq!(rebuilt, to);
    }

    #[test]
    fn apply_surfaces_the_legacy_error_code() {
        let from = snapshot_bytes(&[]);
        let err = apply_delta(&from, &[0u8; 8]).unwrap_err();
        assert!(format!("{err:#}").contains("-1"), "{err:#}");
    }

    #[test]
    fn pretty_formats_mention_the_headline_numbers() {
        let bytes = snapshot_bytes(&[(5, 1, vec![10])]);
        let report = inspect_snapshot(&bytes).unwrap();
        let text = format_snapshot_pretty(&report);
        assert!(text.contains("1 items"));
        assert!(text.contains("type="));
    }
}
