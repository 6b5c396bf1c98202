#![no_main]

use codec::{Snapshot, TypeRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(snap) = Snapshot::from_bytes(data) else {
        return;
    };

    // A blob that parses must support every accessor without panicking.
    let registry = TypeRegistry::new();
    let _ = snap.crc();
    for index in 0..snap.num_items() {
        let item = snap.item(index);
        let _ = item.data();
        let _ = snap.item_size(index);
        let _ = snap.item_type(index, &registry);
        let _ = snap.item_index(item.key());
    }
    assert_eq!(snap.to_bytes(), data);
});
