#![no_main]
use bindelta::{DeltaCompressor, binary, decorated};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Applying arbitrary bytes must never panic, only return errors.
    let _ = binary::DEFAULT.apply_delta(None, Some(data));
    let _ = decorated::DEFAULT.apply_delta(None, Some(data));

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (old, delta) = data.split_at(split);
        let _ = binary::DEFAULT.apply_delta(Some(old), Some(delta));
        let _ = decorated::DEFAULT.apply_delta(Some(old), Some(delta));
    }
});
