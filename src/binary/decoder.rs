// Binary delta decoder.

use super::format::{Delta, Op};
use crate::compressor::DeltaError;

/// Apply `delta` to `old`. A `None` delta returns `old` unchanged.
pub fn apply_delta(old: Option<&[u8]>, delta: Option<&[u8]>) -> Result<Vec<u8>, DeltaError> {
    let old = old.unwrap_or_default();
    let Some(delta) = delta else {
        return Ok(old.to_vec());
    };

    let parsed = Delta::parse(delta);
    log::debug!(
        "apply: format={} old={} delta={}",
        parsed.name(),
        old.len(),
        delta.len()
    );

    match parsed {
        Delta::Empty => Ok(Vec::new()),
        Delta::Replace(value) | Delta::Literal(value) => Ok(value.to_vec()),
        Delta::BinDiff(ops) => {
            let mut out = Vec::with_capacity(old.len());
            for op in ops {
                match op? {
                    Op::Extract { offset, len } => {
                        let end = offset
                            .checked_add(len)
                            .filter(|&end| end <= old.len())
                            .ok_or(DeltaError::ExtractOutOfBounds {
                                offset,
                                len,
                                old_len: old.len(),
                            })?;
                        out.extend_from_slice(&old[offset..end]);
                    }
                    Op::Append(data) => out.extend_from_slice(data),
                }
            }
            Ok(out)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
