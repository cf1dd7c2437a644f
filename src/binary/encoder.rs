// Binary delta encoder.
//
// Deltas are built from three observations about typical value updates:
//   - a common head (prefix) and tail (suffix) are copied from the old value
//   - same-length values are scanned for unchanged runs at identical offsets
//   - everything else is sent as literal bytes
//
// There is no general-purpose match search. Small values, or values with
// no region long enough to be worth an EXTRACT, are sent whole.

use super::format::{DiffWriter, FMT_EMPTY, FMT_REPLACE, is_format_byte};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Minimum length (exclusive) of an unchanged run worth an EXTRACT.
pub const MIN_BLOCK: usize = 12;

/// Values shorter than this are always sent whole.
pub const REPLACE_THRESHOLD: usize = 64;

/// Tuning knobs for delta extraction. Decoding does not depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaOptions {
    /// Lower bound for the significance threshold of an unchanged run.
    /// The effective threshold is `max(min_block, min(old_len, new_len) / 4)`.
    pub min_block: usize,
    /// New values shorter than this are encoded as a full replacement.
    pub replace_threshold: usize,
}

impl DeltaOptions {
    pub const DEFAULT: Self = Self {
        min_block: MIN_BLOCK,
        replace_threshold: REPLACE_THRESHOLD,
    };
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Compute the delta from `old` to `new`, or `None` if they are identical.
pub fn extract_delta(opts: &DeltaOptions, old: Option<&[u8]>, new: &[u8]) -> Option<Vec<u8>> {
    let old = old.unwrap_or_default();

    if old == new {
        return None;
    }

    if new.is_empty() {
        log::debug!("delta: truncate {} bytes", old.len());
        return Some(vec![FMT_EMPTY]);
    }

    Some(create_delta(opts, old, new))
}

/// Build the delta for two values known to differ, `new` being non-empty.
fn create_delta(opts: &DeltaOptions, old: &[u8], new: &[u8]) -> Vec<u8> {
    let (cb_old, cb_new) = (old.len(), new.len());

    if cb_old == 0 || cb_new < opts.replace_threshold {
        log::debug!("delta: replace (old={cb_old}, new={cb_new})");
        return encode_replace(new);
    }

    let cb_min = cb_old.min(cb_new);
    let cb_head = common_prefix(old, new);
    let cb_tail = if cb_head < cb_min {
        common_suffix(&old[cb_head..], &new[cb_head..])
    } else {
        0
    };
    let cb_sig = opts.min_block.max(cb_min / 4);

    log::debug!(
        "delta: old={cb_old} new={cb_new} head={cb_head} tail={cb_tail} threshold={cb_sig}"
    );

    let mut writer = DiffWriter::with_capacity(cb_new / 2);
    // offset in `new` up to which output has been produced
    let mut of_done = 0;

    if cb_head > cb_sig {
        writer.extract(0, cb_head);
        of_done = cb_head;
    }

    let of_tail = cb_new - cb_tail;

    if cb_old == cb_new {
        let mut of = cb_head;
        while of < of_tail {
            if old[of] != new[of] {
                of += 1;
                continue;
            }

            let of_run = of;
            while of < of_tail && old[of] == new[of] {
                of += 1;
            }

            let cb_run = of - of_run;
            if cb_run > cb_sig {
                writer.append(&new[of_done..of_run]);
                writer.extract(of_run, cb_run);
                of_done = of;
            }
        }
    }

    if cb_tail > cb_sig {
        writer.append(&new[of_done..of_tail]);
        writer.extract(cb_old - cb_tail, cb_tail);
        of_done = cb_new;
    }

    if !writer.has_extracts() {
        log::debug!("delta: no run above threshold, replacing");
        return encode_replace(new);
    }

    writer.append(&new[of_done..]);
    writer.finish()
}

/// Encode `new` as a whole-value replacement.
///
/// The `FMT_REPLACE` prefix is only needed when the value's own first byte
/// would be read as a format byte; otherwise the value is its own delta.
fn encode_replace(new: &[u8]) -> Vec<u8> {
    match new.first() {
        Some(&b) if is_format_byte(b) => {
            let mut out = Vec::with_capacity(new.len() + 1);
            out.push(FMT_REPLACE);
            out.extend_from_slice(new);
            out
        }
        _ => new.to_vec(),
    }
}

/// Length of the common prefix of `a` and `b`.
fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Length of the common suffix of `a` and `b`.
fn common_suffix(a: &[u8], b: &[u8]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
