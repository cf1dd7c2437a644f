use bindelta::binary::{self, Delta};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let old: Vec<u8> = b"order:1234;status=PENDING;"
        .iter()
        .copied()
        .cycle()
        .take(520)
        .collect();
    let mut new = old.clone();
    new[260..267].copy_from_slice(b"SHIPPED");

    let delta = binary::DEFAULT.extract(Some(&old), &new);
    let restored = binary::DEFAULT.apply(Some(&old), delta.as_deref())?;
    assert_eq!(restored, new);

    match delta.as_deref() {
        Some(bytes) => println!(
            "value {} bytes -> delta {} bytes ({}) -> restored {} bytes",
            new.len(),
            bytes.len(),
            Delta::parse(bytes).name(),
            restored.len()
        ),
        None => println!("values are identical"),
    }

    Ok(())
}
