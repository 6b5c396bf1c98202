use proptest::prelude::*;
use varint::{compress, decompress, pack, packed_len, unpack, MAX_PACKED_BYTES};

proptest! {
    #[test]
    fn prop_roundtrip_single(value in any::<i32>()) {
        let mut buf = [0u8; MAX_PACKED_BYTES];
        let written = pack(value, &mut buf).unwrap();
        prop_assert_eq!(written, packed_len(value));

        let (decoded, read) = unpack(&buf[..written]).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(read, written);
    }

    #[test]
    fn prop_roundtrip_stream(words in prop::collection::vec(any::<i32>(), 0..128)) {
        let mut bytes = vec![0u8; words.len() * MAX_PACKED_BYTES];
        let used = compress(&words, &mut bytes).unwrap();

        let mut out = vec![0i32; words.len()];
        let count = decompress(&bytes[..used], &mut out).unwrap();
        prop_assert_eq!(count, words.len());
        prop_assert_eq!(&out[..count], words.as_slice());
    }

    #[test]
    fn prop_unpack_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..16)) {
        let _ = unpack(&bytes);
    }
}
