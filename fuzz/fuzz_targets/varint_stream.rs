#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut offset = 0;
    while offset < data.len() {
        match varint::unpack(&data[offset..]) {
            Ok((value, read)) => {
                // Whatever decoded must re-encode to the same value.
                let mut buf = [0u8; varint::MAX_PACKED_BYTES];
                let written = varint::pack(value, &mut buf).unwrap();
                let (again, _) = varint::unpack(&buf[..written]).unwrap();
                assert_eq!(again, value);
                offset += read;
            }
            Err(_) => break,
        }
    }
});
