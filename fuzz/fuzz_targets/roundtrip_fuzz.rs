#![no_main]
use bindelta::binary::{BinaryDeltaCompressor, DeltaOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First two bytes pick the tuning, the third whether there is an old value.
    let opts = DeltaOptions {
        min_block: data[0] as usize % 32,
        replace_threshold: data[1] as usize,
    };
    let has_old = data[2] & 1 != 0;
    let payload = &data[3..];

    let split = payload.len() / 2;
    let (old, new) = payload.split_at(split);
    let old = has_old.then_some(old);

    let compressor = BinaryDeltaCompressor::with_options(opts);
    let delta = compressor.extract(old, new);
    let restored = compressor.apply(old, delta.as_deref()).unwrap();
    assert_eq!(restored, new);
});
