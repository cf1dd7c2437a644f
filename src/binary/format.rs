// Binary delta grammar.
//
// The first byte of a delta selects its format:
//
//   FMT_EMPTY    new value is zero-length
//   FMT_REPLACE  remaining bytes are the new value
//   FMT_BINDIFF  remaining bytes are EXTRACT/APPEND operations up to TERM
//   other        the whole delta, first byte included, is the new value
//
// Operations inside FMT_BINDIFF:
//
//   OP_EXTRACT <offset> <length>   copy old[offset..offset + length]
//   OP_APPEND  <length> <bytes>    copy literal bytes
//   OP_TERM                        end of operations
//
// Offsets and lengths are packed integers (see `crate::packed`).

use crate::compressor::DeltaError;
use crate::packed;

pub const FMT_EMPTY: u8 = 0xF6;
pub const FMT_REPLACE: u8 = 0xF5;
pub const FMT_BINDIFF: u8 = 0xF4;

pub const OP_EXTRACT: u8 = 0x01;
pub const OP_APPEND: u8 = 0x02;
pub const OP_TERM: u8 = 0x03;

/// Whether `b` would be read as a format byte rather than as the first
/// byte of a literal value.
#[inline]
pub fn is_format_byte(b: u8) -> bool {
    matches!(b, FMT_EMPTY | FMT_REPLACE | FMT_BINDIFF)
}

// ---------------------------------------------------------------------------
// Parsed views
// ---------------------------------------------------------------------------

/// A delta, classified by its leading format byte.
#[derive(Debug, Clone)]
pub enum Delta<'a> {
    /// The new value is empty.
    Empty,
    /// The new value follows the `FMT_REPLACE` byte.
    Replace(&'a [u8]),
    /// The new value is assembled from the old one by these operations.
    BinDiff(OpIter<'a>),
    /// The delta is itself the new value.
    Literal(&'a [u8]),
}

impl<'a> Delta<'a> {
    pub fn parse(delta: &'a [u8]) -> Self {
        match delta.first() {
            Some(&FMT_EMPTY) => Delta::Empty,
            Some(&FMT_REPLACE) => Delta::Replace(&delta[1..]),
            Some(&FMT_BINDIFF) => Delta::BinDiff(OpIter::new(delta)),
            _ => Delta::Literal(delta),
        }
    }

    /// Short name of the format, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Delta::Empty => "empty",
            Delta::Replace(_) => "replace",
            Delta::BinDiff(_) => "bindiff",
            Delta::Literal(_) => "literal",
        }
    }
}

/// One operation of a `FMT_BINDIFF` delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op<'a> {
    /// Copy `len` bytes of the old value starting at `offset`.
    Extract { offset: usize, len: usize },
    /// Copy these literal bytes.
    Append(&'a [u8]),
}

impl Op<'_> {
    /// Number of output bytes this operation produces.
    pub fn output_len(&self) -> usize {
        match self {
            Op::Extract { len, .. } => *len,
            Op::Append(data) => data.len(),
        }
    }
}

/// Iterator over the operations of a `FMT_BINDIFF` delta.
///
/// Yields operations up to (not including) `OP_TERM`. Any malformed
/// operation is yielded as an error, after which iteration stops.
#[derive(Debug, Clone)]
pub struct OpIter<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> OpIter<'a> {
    /// Iterate the operations of `delta`, which must start with `FMT_BINDIFF`.
    fn new(delta: &'a [u8]) -> Self {
        Self {
            data: delta,
            pos: 1,
            done: false,
        }
    }

    /// Offset in the delta of the next unread byte.
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn read_len(&mut self) -> Result<usize, DeltaError> {
        let (val, consumed) =
            packed::read_len(&self.data[self.pos..]).map_err(DeltaError::packed(self.pos))?;
        self.pos += consumed;
        Ok(val)
    }

    fn next_op(&mut self) -> Result<Option<Op<'a>>, DeltaError> {
        let Some(&op) = self.data.get(self.pos) else {
            return Err(DeltaError::MissingTerminator { offset: self.pos });
        };
        let op_offset = self.pos;
        self.pos += 1;

        match op {
            OP_EXTRACT => {
                let offset = self.read_len()?;
                let len = self.read_len()?;
                Ok(Some(Op::Extract { offset, len }))
            }
            OP_APPEND => {
                let len = self.read_len()?;
                let start = self.pos;
                let end = start
                    .checked_add(len)
                    .filter(|&end| end <= self.data.len())
                    .ok_or(DeltaError::LiteralOverrun {
                        offset: start,
                        len,
                        delta_len: self.data.len(),
                    })?;
                self.pos = end;
                Ok(Some(Op::Append(&self.data[start..end])))
            }
            OP_TERM => Ok(None),
            _ => Err(DeltaError::UnknownOp {
                op,
                offset: op_offset,
            }),
        }
    }
}

impl<'a> Iterator for OpIter<'a> {
    type Item = Result<Op<'a>, DeltaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_op() {
            Ok(Some(op)) => Some(Ok(op)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operation writer
// ---------------------------------------------------------------------------

/// Accumulates a `FMT_BINDIFF` delta.
pub(crate) struct DiffWriter {
    out: Vec<u8>,
    extracts: usize,
}

impl DiffWriter {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        let mut out = Vec::with_capacity(cap);
        out.push(FMT_BINDIFF);
        Self { out, extracts: 0 }
    }

    pub(crate) fn extract(&mut self, offset: usize, len: usize) {
        log::trace!("delta: extract offset={offset} len={len}");
        self.out.push(OP_EXTRACT);
        packed::push_len(&mut self.out, offset);
        packed::push_len(&mut self.out, len);
        self.extracts += 1;
    }

    /// Append literal bytes. Empty slices emit nothing.
    pub(crate) fn append(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        log::trace!("delta: append len={}", data.len());
        self.out.push(OP_APPEND);
        packed::push_len(&mut self.out, data.len());
        self.out.extend_from_slice(data);
    }

    /// Whether any region of the old value is reused.
    pub(crate) fn has_extracts(&self) -> bool {
        self.extracts > 0
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.out.push(OP_TERM);
        self.out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dispatches_on_first_byte() {
        assert!(matches!(Delta::parse(&[FMT_EMPTY]), Delta::Empty));
        assert!(matches!(
            Delta::parse(&[FMT_REPLACE, 1, 2]),
            Delta::Replace(&[1, 2])
        ));
        assert!(matches!(
            Delta::parse(&[FMT_BINDIFF, OP_TERM]),
            Delta::BinDiff(_)
        ));
        assert!(matches!(Delta::parse(b"abc"), Delta::Literal(b"abc")));
        assert!(matches!(Delta::parse(&[]), Delta::Literal(&[])));
    }

    #[test]
    fn writer_output_parses_back() {
        let mut w = DiffWriter::with_capacity(16);
        w.extract(0, 100);
        w.append(b"xyz");
        w.append(b"");
        w.extract(200, 5);
        assert!(w.has_extracts());
        let delta = w.finish();

        let Delta::BinDiff(ops) = Delta::parse(&delta) else {
            panic!("expected bindiff");
        };
        let ops: Vec<_> = ops.collect::<Result<_, _>>().unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Extract {
                    offset: 0,
                    len: 100
                },
                Op::Append(b"xyz"),
                Op::Extract {
                    offset: 200,
                    len: 5
                },
            ]
        );
        assert_eq!(ops.iter().map(Op::output_len).sum::<usize>(), 108);
    }

    #[test]
    fn unknown_op_reports_byte_and_offset() {
        let delta = [FMT_BINDIFF, OP_APPEND, 0x01, b'a', 0x7E, OP_TERM];
        let Delta::BinDiff(mut ops) = Delta::parse(&delta) else {
            panic!("expected bindiff");
        };
        assert_eq!(ops.next().unwrap().unwrap(), Op::Append(b"a"));
        match ops.next() {
            Some(Err(DeltaError::UnknownOp { op, offset })) => {
                assert_eq!(op, 0x7E);
                assert_eq!(offset, 4);
            }
            other => panic!("expected UnknownOp, got {other:?}"),
        }
        assert!(ops.next().is_none());
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let delta = [FMT_BINDIFF, OP_EXTRACT, 0x00, 0x05];
        let Delta::BinDiff(ops) = Delta::parse(&delta) else {
            panic!("expected bindiff");
        };
        let result: Result<Vec<_>, _> = ops.collect();
        assert!(matches!(
            result,
            Err(DeltaError::MissingTerminator { offset: 4 })
        ));
    }

    #[test]
    fn append_overrun_is_an_error() {
        let delta = [FMT_BINDIFF, OP_APPEND, 0x10, b'a', b'b'];
        let Delta::BinDiff(mut ops) = Delta::parse(&delta) else {
            panic!("expected bindiff");
        };
        assert!(matches!(
            ops.next(),
            Some(Err(DeltaError::LiteralOverrun { len: 16, .. }))
        ));
    }

    #[test]
    fn format_bytes() {
        assert!(is_format_byte(FMT_EMPTY));
        assert!(is_format_byte(FMT_REPLACE));
        assert!(is_format_byte(FMT_BINDIFF));
        assert!(!is_format_byte(0x00));
        assert!(!is_format_byte(0xF7));
    }
}
