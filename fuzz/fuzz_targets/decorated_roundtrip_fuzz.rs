#![no_main]
use bindelta::decoration::{self, DECO_ID_MAX};
use bindelta::{DeltaCompressor, decorated};
use libfuzzer_sys::fuzz_target;

/// Carve a decoration vector out of `data`: each chunk starts with an id
/// byte and a length byte.
fn decorations(mut data: &[u8]) -> Vec<Option<&[u8]>> {
    let mut decos = vec![None; DECO_ID_MAX + 1];
    while data.len() >= 2 {
        let id = data[0] as usize % (DECO_ID_MAX + 1);
        let len = (data[1] as usize).min(data.len() - 2);
        decos[id] = Some(&data[2..2 + len]);
        data = &data[2 + len..];
    }
    decos
}

fuzz_target!(|data: &[u8]| {
    let split = data.len() / 2;
    let (a, b) = data.split_at(split);

    let old = decoration::decorate(&decorations(a)).unwrap().unwrap_or_default();
    let new = decoration::decorate(&decorations(b)).unwrap().unwrap_or_default();

    let delta = decorated::DEFAULT.extract_delta(Some(&old), &new).unwrap();
    let restored = decorated::DEFAULT.apply_delta(Some(&old), delta.as_deref()).unwrap();
    assert_eq!(restored, new);
});
