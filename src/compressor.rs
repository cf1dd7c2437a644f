// Delta compressor abstraction and the shared error type.

use thiserror::Error;

use crate::decoration::DecorationError;
use crate::packed::PackedIntError;

// ---------------------------------------------------------------------------
// DeltaCompressor
// ---------------------------------------------------------------------------

/// Computes and applies deltas between two versions of a binary value.
///
/// Implementations are stateless: every call depends only on its arguments,
/// so a single instance can be shared freely across threads.
///
/// A missing old value (`None`) is treated as the empty value. A `None`
/// delta means "no change".
pub trait DeltaCompressor {
    /// Compute the delta that turns `old` into `new`.
    ///
    /// Returns `Ok(None)` iff `old` and `new` are bit-identical.
    fn extract_delta(&self, old: Option<&[u8]>, new: &[u8])
    -> Result<Option<Vec<u8>>, DeltaError>;

    /// Apply `delta` to `old`, reconstructing the new value.
    fn apply_delta(&self, old: Option<&[u8]>, delta: Option<&[u8]>)
    -> Result<Vec<u8>, DeltaError>;
}

impl<T: DeltaCompressor + ?Sized> DeltaCompressor for &T {
    fn extract_delta(
        &self,
        old: Option<&[u8]>,
        new: &[u8],
    ) -> Result<Option<Vec<u8>>, DeltaError> {
        (**self).extract_delta(old, new)
    }

    fn apply_delta(&self, old: Option<&[u8]>, delta: Option<&[u8]>) -> Result<Vec<u8>, DeltaError> {
        (**self).apply_delta(old, delta)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A delta could not be applied (or its inputs could not be parsed).
///
/// Every variant indicates corrupt or mismatched input; none of them is
/// recoverable by retrying.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// An operation byte in a binary diff is not EXTRACT, APPEND or TERM.
    #[error("unknown delta operation ({op:#04X}) encountered at offset {offset}")]
    UnknownOp { op: u8, offset: usize },

    /// The operation stream ended before its TERM byte.
    #[error("delta truncated at offset {offset}: missing terminator")]
    MissingTerminator { offset: usize },

    /// A packed length, offset or id could not be decoded.
    #[error("malformed packed integer at offset {offset}: {source}")]
    PackedInt {
        offset: usize,
        #[source]
        source: PackedIntError,
    },

    /// An EXTRACT region lies outside the old value.
    #[error("extract of {len} bytes at offset {offset} exceeds old value length {old_len}")]
    ExtractOutOfBounds {
        offset: usize,
        len: usize,
        old_len: usize,
    },

    /// A literal run (APPEND, INSERT or UPDATE payload) runs past the end of the delta.
    #[error("literal of {len} bytes at offset {offset} runs past end of delta ({delta_len} bytes)")]
    LiteralOverrun {
        offset: usize,
        len: usize,
        delta_len: usize,
    },

    /// An operation byte in a decoration list is not INSERT, UPDATE, DELETE or TERM.
    #[error("unknown decoration operation ({op:#04X}) encountered at offset {offset}")]
    UnknownDecorationOp { op: u8, offset: usize },

    /// A decoration operation refers to an id that is absent or out of range.
    #[error("decoration index {id} out of range")]
    DecorationIndex { id: i64 },

    /// The decorated form of a value could not be parsed or built.
    #[error(transparent)]
    Decoration(#[from] DecorationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeltaError {
    pub(crate) fn packed(offset: usize) -> impl FnOnce(PackedIntError) -> Self {
        move |source| Self::PackedInt { offset, source }
    }
}
