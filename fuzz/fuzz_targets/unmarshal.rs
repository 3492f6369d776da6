#![no_main]
use libfuzzer_sys::fuzz_target;
use magpack::{resolve, unmarshal, unmarshal_primitive, BasicMap, BasicString, Candidate};

fuzz_target!(|data: &[u8]| {
    let _ = unmarshal_primitive(data);
    let mut dst = BasicMap::default();
    let _ = unmarshal(data, &mut dst, None);
    let _ = resolve(
        data,
        vec![Candidate::of::<BasicString>(), Candidate::of::<BasicMap>()],
    );
});
