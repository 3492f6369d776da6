#![no_main]
use libfuzzer_sys::fuzz_target;
use magpack::{decode_header, encode_header, is_header, scan};

fuzz_target!(|data: &[u8]| {
    let valid = is_header(data);
    match decode_header(data) {
        Ok((ns, schema, comp)) => {
            assert!(valid);
            let header = encode_header(ns, schema, comp).unwrap();
            assert_eq!(header.as_ref(), data);
        }
        Err(_) => assert!(!valid),
    }
    for (offset, header) in scan(data) {
        assert_eq!(header.as_ref(), &data[offset..offset + 8]);
    }
});
