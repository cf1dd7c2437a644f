// Binary delta compression.
//
// This module implements the value-level delta codec:
//
// - `format`   delta grammar: format/operation bytes and parsed views
// - `encoder`  head/tail/interior-run matching and delta emission
// - `decoder`  delta application

pub mod decoder;
pub mod encoder;
pub mod format;

pub use encoder::{DeltaOptions, MIN_BLOCK, REPLACE_THRESHOLD};
pub use format::{Delta, Op, OpIter};

use crate::compressor::{DeltaCompressor, DeltaError};

/// Shared default instance. The compressor is stateless, so one value
/// serves every caller.
pub const DEFAULT: BinaryDeltaCompressor = BinaryDeltaCompressor::new();

/// Delta compressor for opaque binary values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryDeltaCompressor {
    opts: DeltaOptions,
}

impl BinaryDeltaCompressor {
    /// Create a compressor with the default thresholds.
    pub const fn new() -> Self {
        Self {
            opts: DeltaOptions::DEFAULT,
        }
    }

    pub const fn with_options(opts: DeltaOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &DeltaOptions {
        &self.opts
    }

    /// Infallible form of [`DeltaCompressor::extract_delta`].
    pub fn extract(&self, old: Option<&[u8]>, new: &[u8]) -> Option<Vec<u8>> {
        encoder::extract_delta(&self.opts, old, new)
    }

    /// Same as [`DeltaCompressor::apply_delta`].
    pub fn apply(&self, old: Option<&[u8]>, delta: Option<&[u8]>) -> Result<Vec<u8>, DeltaError> {
        decoder::apply_delta(old, delta)
    }
}

impl DeltaCompressor for BinaryDeltaCompressor {
    fn extract_delta(
        &self,
        old: Option<&[u8]>,
        new: &[u8],
    ) -> Result<Option<Vec<u8>>, DeltaError> {
        Ok(self.extract(old, new))
    }

    fn apply_delta(&self, old: Option<&[u8]>, delta: Option<&[u8]>) -> Result<Vec<u8>, DeltaError> {
        self.apply(old, delta)
    }
}
