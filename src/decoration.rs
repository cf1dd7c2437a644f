// Decorated binaries.
//
// A decorated binary carries a value plus up to 64 side-band decorations,
// addressed by id. Id 0 (`DECO_VALUE`) is the value itself.
//
//   FMT_BIN_DECO      <mask: u8>          ids 0..=7
//   FMT_BIN_EXT_DECO  <mask: packed i64>  ids 0..=63
//
// followed, for every id whose mask bit is set in ascending order, by a
// packed length and that many bytes. A buffer that does not start with one
// of the two format bytes (or is a single byte long) is undecorated and is
// its own value.

use thiserror::Error;

use crate::packed::{self, PackedIntError};

pub const FMT_BIN_DECO: u8 = 18;
pub const FMT_BIN_EXT_DECO: u8 = 19;

pub const DECO_ID_MIN: usize = 0;
pub const DECO_ID_MAX: usize = 63;

/// The undecorated value.
pub const DECO_VALUE: usize = 0;
pub const DECO_EXPIRY: usize = 1;
pub const DECO_STORE: usize = 2;
pub const DECO_TX: usize = 3;
pub const DECO_PUSHREP: usize = 4;
pub const DECO_BACKUP: usize = 5;
pub const DECO_CUSTOM: usize = 7;
pub const DECO_APP_1: usize = 10;
pub const DECO_APP_2: usize = 11;
pub const DECO_APP_3: usize = 12;

/// Highest id expressible in the compact one-byte mask.
const COMPACT_ID_MAX: usize = 7;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecorationError {
    #[error("decorated binary truncated: {len} bytes at offset {offset} exceed buffer length {buf_len}")]
    Truncated {
        offset: usize,
        len: usize,
        buf_len: usize,
    },

    #[error("decoration id {id} out of range (max {DECO_ID_MAX})")]
    IdOutOfRange { id: usize },

    #[error("malformed packed integer in decorated binary at offset {offset}: {source}")]
    PackedInt {
        offset: usize,
        #[source]
        source: PackedIntError,
    },
}

// ---------------------------------------------------------------------------
// DecorationStore
// ---------------------------------------------------------------------------

/// Reads and builds decorated binaries.
///
/// Decoration vectors are indexed by id; index 0 is the value. Absent
/// decorations are `None`.
pub trait DecorationStore {
    fn is_decorated(&self, buf: &[u8]) -> bool;

    /// All decorations of `buf`. An undecorated buffer yields `[Some(buf)]`.
    fn decorations<'a>(&self, buf: &'a [u8]) -> Result<Vec<Option<&'a [u8]>>, DecorationError>;

    /// The value of `buf`, or `None` if `buf` is decorated without one.
    fn undecorated<'a>(&self, buf: &'a [u8]) -> Result<Option<&'a [u8]>, DecorationError> {
        if !self.is_decorated(buf) {
            return Ok(Some(buf));
        }
        Ok(self.decorations(buf)?.first().copied().flatten())
    }

    /// Build a buffer from a decoration vector. Returns `None` when every
    /// entry is absent.
    fn decorate(&self, decos: &[Option<&[u8]>]) -> Result<Option<Vec<u8>>, DecorationError>;
}

/// The standard decorated-binary format described at the top of this module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryDecorations;

impl DecorationStore for BinaryDecorations {
    fn is_decorated(&self, buf: &[u8]) -> bool {
        is_decorated(buf)
    }

    fn decorations<'a>(&self, buf: &'a [u8]) -> Result<Vec<Option<&'a [u8]>>, DecorationError> {
        get_decorations(buf)
    }

    fn undecorated<'a>(&self, buf: &'a [u8]) -> Result<Option<&'a [u8]>, DecorationError> {
        get_undecorated(buf)
    }

    fn decorate(&self, decos: &[Option<&[u8]>]) -> Result<Option<Vec<u8>>, DecorationError> {
        decorate(decos)
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub fn is_decorated(buf: &[u8]) -> bool {
    buf.len() > 1 && matches!(buf[0], FMT_BIN_DECO | FMT_BIN_EXT_DECO)
}

/// Read the id mask of a decorated buffer. Returns the mask and the offset
/// of the first decoration.
fn read_mask(buf: &[u8]) -> Result<(u64, usize), DecorationError> {
    if buf[0] == FMT_BIN_DECO {
        return Ok((u64::from(buf[1]), 2));
    }
    let (mask, consumed) = packed::read_i64(&buf[1..])
        .map_err(|source| DecorationError::PackedInt { offset: 1, source })?;
    // bit 63 (id 63) arrives as the sign bit
    Ok((mask as u64, 1 + consumed))
}

/// All decorations of `buf`, indexed by id.
///
/// An undecorated buffer is a single value: `[Some(buf)]`. A decorated
/// buffer with an empty mask yields `[None]`.
pub fn get_decorations(buf: &[u8]) -> Result<Vec<Option<&[u8]>>, DecorationError> {
    if !is_decorated(buf) {
        return Ok(vec![Some(buf)]);
    }

    let (mut mask, mut pos) = read_mask(buf)?;
    if mask == 0 {
        return Ok(vec![None]);
    }

    let count = (u64::BITS - mask.leading_zeros()) as usize;
    let mut decos = Vec::with_capacity(count);
    for _ in 0..count {
        if mask & 1 == 0 {
            decos.push(None);
        } else {
            let (len, consumed) = packed::read_len(&buf[pos..])
                .map_err(|source| DecorationError::PackedInt { offset: pos, source })?;
            let start = pos + consumed;
            let end = start
                .checked_add(len)
                .filter(|&end| end <= buf.len())
                .ok_or(DecorationError::Truncated {
                    offset: start,
                    len,
                    buf_len: buf.len(),
                })?;
            decos.push(Some(&buf[start..end]));
            pos = end;
        }
        mask >>= 1;
    }
    Ok(decos)
}

/// Decoration `id` of `buf`. For an undecorated buffer, id 0 is the buffer
/// itself and every other id is absent.
pub fn get_decoration(buf: &[u8], id: usize) -> Result<Option<&[u8]>, DecorationError> {
    if !is_decorated(buf) || id > DECO_ID_MAX {
        return Ok((id == DECO_VALUE).then_some(buf));
    }
    Ok(get_decorations(buf)?.get(id).copied().flatten())
}

/// The value of `buf`; `None` if `buf` is decorated without a value.
pub fn get_undecorated(buf: &[u8]) -> Result<Option<&[u8]>, DecorationError> {
    get_decoration(buf, DECO_VALUE)
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Assemble a buffer from a decoration vector indexed by id.
///
/// - no present entries: `None`
/// - only an undecorated value: the value itself
/// - highest id up to 7: compact format, otherwise extended
/// - any present id above 63: `IdOutOfRange`
pub fn decorate(decos: &[Option<&[u8]>]) -> Result<Option<Vec<u8>>, DecorationError> {
    let present = || decos.iter().enumerate().filter_map(|(id, d)| d.map(|d| (id, d)));

    let Some((last_id, _)) = present().last() else {
        return Ok(None);
    };
    if last_id > DECO_ID_MAX {
        return Err(DecorationError::IdOutOfRange { id: last_id });
    }
    if last_id == DECO_VALUE {
        if let Some(value) = decos[DECO_VALUE].filter(|v| !is_decorated(v)) {
            return Ok(Some(value.to_vec()));
        }
    }

    let mask = present().fold(0u64, |mask, (id, _)| mask | 1 << id);
    let body: usize = present()
        .map(|(_, d)| packed::packed_len_i64(d.len() as i64) + d.len())
        .sum();

    let mut out = Vec::with_capacity(1 + packed::MAX_PACKED_LEN + body);
    if last_id > COMPACT_ID_MAX {
        out.push(FMT_BIN_EXT_DECO);
        packed::push_i64(&mut out, mask as i64);
    } else {
        out.push(FMT_BIN_DECO);
        out.push(mask as u8);
    }
    for (_, deco) in present() {
        packed::push_len(&mut out, deco.len());
        out.extend_from_slice(deco);
    }
    Ok(Some(out))
}

/// Add or replace decoration `id` on `buf`, which may already be decorated.
/// A `None` decoration removes `id` (see [`undecorate`]).
///
/// Returns `None` only when nothing remains.
pub fn decorate_with(
    buf: Option<&[u8]>,
    id: usize,
    deco: Option<&[u8]>,
) -> Result<Option<Vec<u8>>, DecorationError> {
    let Some(deco) = deco else {
        return match buf {
            Some(buf) => undecorate(buf, id),
            None => Ok(None),
        };
    };
    if id > DECO_ID_MAX {
        return Err(DecorationError::IdOutOfRange { id });
    }

    let mut decos = match buf {
        Some(buf) => get_decorations(buf)?,
        None => Vec::new(),
    };
    if decos.len() <= id {
        decos.resize(id + 1, None);
    }
    decos[id] = Some(deco);
    decorate(&decos)
}

/// Remove decoration `id` from `buf`.
///
/// When only an undecorated value remains, that value is returned as is.
/// Removing the value of an undecorated buffer leaves nothing.
pub fn undecorate(buf: &[u8], id: usize) -> Result<Option<Vec<u8>>, DecorationError> {
    if !is_decorated(buf) {
        return Ok((id != DECO_VALUE).then(|| buf.to_vec()));
    }

    let mut decos = get_decorations(buf)?;
    match decos.get_mut(id) {
        Some(slot @ Some(_)) => *slot = None,
        _ => return Ok(Some(buf.to_vec())),
    }
    decorate(&decos)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
