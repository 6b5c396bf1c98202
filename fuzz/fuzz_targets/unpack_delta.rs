#![no_main]

use codec::{Snapshot, SnapshotBuilder, SnapshotDelta, TypeRegistry};
use libfuzzer_sys::fuzz_target;

const OUT_BYTES: usize = 8 + 4 * codec::limits::MAX_ITEMS + codec::limits::MAX_SNAPSHOT_SIZE;

fn prior_snapshot(registry: &TypeRegistry) -> Snapshot {
    let mut builder = SnapshotBuilder::new(registry);
    builder.init().unwrap();
    for id in 0..8 {
        let data = builder.new_item(5, id, 12).unwrap();
        data.copy_from_slice(&[id, id * 2, id * 3]);
    }
    let mut out = vec![0u8; builder.finished_size()];
    builder.finish(&mut out).unwrap();
    Snapshot::from_bytes(&out).unwrap()
}

fuzz_target!(|data: &[u8]| {
    let registry = TypeRegistry::new();
    let from = prior_snapshot(&registry);

    let mut delta = SnapshotDelta::new();
    delta.set_static_size(5, 12);

    // Arbitrary bytes must either apply cleanly or fail with an error;
    // the decoder must never panic.
    let mut builder = SnapshotBuilder::new(&registry);
    let mut out = vec![0u8; OUT_BYTES];
    if let Ok(len) = delta.unpack_delta(&from, &mut builder, data, &mut out) {
        let rebuilt = Snapshot::from_bytes(&out[..len]).expect("rebuilt snapshot must validate");
        let _ = rebuilt.crc();
    }
});
