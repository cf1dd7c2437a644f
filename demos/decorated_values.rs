use bindelta::decorated::{self, Envelope};
use bindelta::decoration::{self, DECO_EXPIRY, DECO_VALUE};
use bindelta::DeltaCompressor;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let value: Vec<u8> = (0..=255u8).cycle().take(400).collect();
    let old = decoration::decorate_with(Some(&value), DECO_EXPIRY, Some(&b"ttl=60"[..]))?
        .ok_or("nothing to decorate")?;

    let mut changed = value.clone();
    changed[200] ^= 0xFF;
    let new = decoration::decorate_with(Some(&old), DECO_VALUE, Some(&changed))?
        .ok_or("nothing to decorate")?;
    let new = decoration::decorate_with(Some(&new), DECO_EXPIRY, Some(&b"ttl=90"[..]))?
        .ok_or("nothing to decorate")?;

    let delta = decorated::DEFAULT
        .extract_delta(Some(&old), &new)?
        .ok_or("values are identical")?;
    let restored = decorated::DEFAULT.apply_delta(Some(&old), Some(&delta))?;
    assert_eq!(restored, new);

    let env = Envelope::parse(&delta)?;
    println!(
        "decorated value {} bytes -> delta {} bytes: {} decoration op(s), value {}",
        new.len(),
        delta.len(),
        env.ops.len(),
        if env.value_delta.is_some() { "changed" } else { "unchanged" }
    );

    Ok(())
}
