// Packed integer encoding.
//
// Variable-length signed integers, least-significant group first:
//   first byte:  [cont:1][sign:1][data:6]
//   next bytes:  [cont:1][data:7]
// Negative values are stored as their one's complement with the sign bit
// set, so -1 encodes as a single 0x40 byte.
//
// Every length and offset in the delta grammar uses this format, and so
// does the decoration mask of the extended decorated-binary format.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Maximum encoded length of a 64-bit value (6 + 7 * 9 >= 63 data bits).
pub const MAX_PACKED_LEN: usize = 10;

/// Maximum encoded length of a 32-bit value (6 + 7 * 4 >= 31 data bits).
pub const MAX_PACKED_LEN_I32: usize = 5;

const CONT_BIT: u8 = 0x80;
const SIGN_BIT: u8 = 0x40;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode an `i64` into `buf`, returning the number of bytes used (1..=10).
#[inline]
pub fn encode_i64(n: i64, buf: &mut [u8; MAX_PACKED_LEN]) -> usize {
    let (mut b, mut v) = if n < 0 {
        (SIGN_BIT, !n as u64)
    } else {
        (0u8, n as u64)
    };

    // first byte carries only 6 data bits
    b |= (v & 0x3F) as u8;
    v >>= 6;

    let mut len = 0;
    while v != 0 {
        buf[len] = b | CONT_BIT;
        len += 1;
        b = (v & 0x7F) as u8;
        v >>= 7;
    }
    buf[len] = b;
    len + 1
}

/// Encode an `i32` into `buf`, returning the number of bytes used (1..=5).
///
/// Produces exactly the bytes `encode_i64` would for the widened value.
#[inline]
pub fn encode_i32(n: i32, buf: &mut [u8; MAX_PACKED_LEN]) -> usize {
    encode_i64(i64::from(n), buf)
}

/// Append a packed `i64` to a byte vector.
pub fn push_i64(out: &mut Vec<u8>, n: i64) {
    let mut buf = [0u8; MAX_PACKED_LEN];
    let len = encode_i64(n, &mut buf);
    out.extend_from_slice(&buf[..len]);
}

/// Append a packed `i32` to a byte vector.
pub fn push_i32(out: &mut Vec<u8>, n: i32) {
    push_i64(out, i64::from(n));
}

/// Append a non-negative length or offset.
///
/// Identical on the wire to the `i32` form for every value below 2^31.
pub fn push_len(out: &mut Vec<u8>, n: usize) {
    // usize values above i64::MAX cannot address memory on any target
    push_i64(out, n as i64);
}

/// Encode an `i64` and write it to a `Write` sink.
pub fn write_i64<W: Write>(w: &mut W, n: i64) -> io::Result<()> {
    let mut buf = [0u8; MAX_PACKED_LEN];
    let len = encode_i64(n, &mut buf);
    w.write_all(&buf[..len])
}

/// Encode an `i32` and write it to a `Write` sink.
pub fn write_i32<W: Write>(w: &mut W, n: i32) -> io::Result<()> {
    write_i64(w, i64::from(n))
}

// ---------------------------------------------------------------------------
// Decoding from byte slices
// ---------------------------------------------------------------------------

/// Decode the magnitude and sign of a packed integer whose magnitude must
/// fit in `max_bits` bits. Returns `(magnitude, negative, bytes_consumed)`.
fn read_raw(data: &[u8], max_bits: u32) -> Result<(u64, bool, usize), PackedIntError> {
    let Some(&first) = data.first() else {
        return Err(PackedIntError::Underflow);
    };

    let negative = first & SIGN_BIT != 0;
    let mut val = u64::from(first & 0x3F);
    let mut shift = 6u32;
    let mut b = first;
    let mut pos = 1;

    while b & CONT_BIT != 0 {
        b = *data.get(pos).ok_or(PackedIntError::Underflow)?;
        pos += 1;
        let group = u64::from(b & 0x7F);
        if shift >= max_bits || group >> (max_bits - shift) != 0 {
            return Err(PackedIntError::Overflow);
        }
        val |= group << shift;
        shift += 7;
    }

    Ok((val, negative, pos))
}

/// Decode an `i64` from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_i64(data: &[u8]) -> Result<(i64, usize), PackedIntError> {
    let (mag, negative, len) = read_raw(data, 63)?;
    let val = mag as i64;
    Ok((if negative { !val } else { val }, len))
}

/// Decode an `i32` from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_i32(data: &[u8]) -> Result<(i32, usize), PackedIntError> {
    let (mag, negative, len) = read_raw(data, 31)?;
    let val = mag as i32;
    Ok((if negative { !val } else { val }, len))
}

/// Decode a length or offset, rejecting negative values.
pub fn read_len(data: &[u8]) -> Result<(usize, usize), PackedIntError> {
    let (val, len) = read_i64(data)?;
    let val = usize::try_from(val).map_err(|_| PackedIntError::Negative(val))?;
    Ok((val, len))
}

// ---------------------------------------------------------------------------
// Decoding from `Read` (streaming)
// ---------------------------------------------------------------------------

fn stream_read_raw<R: Read>(r: &mut R, max_bits: u32) -> io::Result<(u64, bool)> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    let first = buf[0];

    let negative = first & SIGN_BIT != 0;
    let mut val = u64::from(first & 0x3F);
    let mut shift = 6u32;
    let mut b = first;

    while b & CONT_BIT != 0 {
        r.read_exact(&mut buf)?;
        b = buf[0];
        let group = u64::from(b & 0x7F);
        if shift >= max_bits || group >> (max_bits - shift) != 0 {
            return Err(PackedIntError::Overflow.into());
        }
        val |= group << shift;
        shift += 7;
    }

    Ok((val, negative))
}

/// Read a packed `i64` from a streaming source.
pub fn stream_read_i64<R: Read>(r: &mut R) -> io::Result<i64> {
    let (mag, negative) = stream_read_raw(r, 63)?;
    let val = mag as i64;
    Ok(if negative { !val } else { val })
}

/// Read a packed `i32` from a streaming source.
pub fn stream_read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let (mag, negative) = stream_read_raw(r, 31)?;
    let val = mag as i32;
    Ok(if negative { !val } else { val })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Encoded byte-length of an `i32`.
#[inline]
pub fn packed_len_i32(n: i32) -> usize {
    let n = if n < 0 { !n } else { n };
    if n < 0x40 {
        1
    } else {
        ((0x27 - n.leading_zeros()) / 7) as usize
    }
}

/// Encoded byte-length of an `i64`.
#[inline]
pub fn packed_len_i64(n: i64) -> usize {
    let n = if n < 0 { !n } else { n };
    if n < 0x40 {
        1
    } else {
        ((0x47 - n.leading_zeros()) / 7) as usize
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PackedIntError {
    /// Not enough input bytes to complete the integer.
    #[error("packed integer underflow (truncated input)")]
    Underflow,
    /// Value has more data bits than the target integer type.
    #[error("packed integer overflow")]
    Overflow,
    /// A length or offset decoded to a negative value.
    #[error("negative length or offset: {0}")]
    Negative(i64),
}

impl From<PackedIntError> for io::Error {
    fn from(e: PackedIntError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
