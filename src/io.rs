// File-level helpers for delta encoding/decoding.
//
// Provides `encode_file()` and `decode_file()`, which read whole values from
// disk, run a `DeltaCompressor` over them and write the result with buffered
// I/O. Values are opaque in-memory binaries, so nothing is streamed through
// the compressor itself. SHA-256 checksums are feature-gated behind
// `file-io`.
//
// A "no change" delta is stored as a zero-length file. Every delta the
// compressors produce for a real change is at least one byte long.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::compressor::{DeltaCompressor, DeltaError};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `encode_file()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    /// Old value size in bytes (0 when there is no old value).
    pub old_size: u64,
    /// New value size in bytes.
    pub new_size: u64,
    /// Delta output size in bytes.
    pub delta_size: u64,
    /// Whether the values differ. When false the delta file is empty.
    pub changed: bool,
    /// SHA-256 of the old value (if `file-io` feature is enabled).
    pub old_sha256: Option<[u8; 32]>,
    /// SHA-256 of the new value (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub old_size: u64,
    pub delta_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("delta error: {0}")]
    Delta(#[from] DeltaError),
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// encode_file
// ---------------------------------------------------------------------------

/// Compute the delta from `old_path` (or no old value) to `new_path` and
/// write it to `delta_path`.
pub fn encode_file(
    old_path: Option<&Path>,
    new_path: &Path,
    delta_path: &Path,
    compressor: &dyn DeltaCompressor,
) -> Result<EncodeStats, IoError> {
    let old = read_optional(old_path)?;
    let new = std::fs::read(new_path)?;

    let delta = compressor.extract_delta(old.as_deref(), &new)?;
    let delta_bytes = delta.as_deref().unwrap_or_default();
    write_buffered(delta_path, delta_bytes)?;

    log::debug!(
        "encode_file: old={} new={} delta={}",
        old.as_ref().map_or(0, Vec::len),
        new.len(),
        delta_bytes.len()
    );

    Ok(EncodeStats {
        old_size: old.as_ref().map_or(0, |o| o.len() as u64),
        new_size: new.len() as u64,
        delta_size: delta_bytes.len() as u64,
        changed: delta.is_some(),
        old_sha256: old.as_deref().and_then(sha256),
        new_sha256: sha256(&new),
    })
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Apply the delta in `delta_path` to `old_path` (or no old value), writing
/// the reconstructed value to `output_path`.
pub fn decode_file(
    old_path: Option<&Path>,
    delta_path: &Path,
    output_path: &Path,
    compressor: &dyn DeltaCompressor,
) -> Result<DecodeStats, IoError> {
    let old = read_optional(old_path)?;
    let delta = std::fs::read(delta_path)?;

    // zero-length file: no change
    let delta_opt = (!delta.is_empty()).then_some(delta.as_slice());
    let output = compressor.apply_delta(old.as_deref(), delta_opt)?;
    write_buffered(output_path, &output)?;

    Ok(DecodeStats {
        old_size: old.as_ref().map_or(0, |o| o.len() as u64),
        delta_size: delta.len() as u64,
        output_size: output.len() as u64,
        output_sha256: sha256(&output),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_optional(path: Option<&Path>) -> io::Result<Option<Vec<u8>>> {
    path.map(std::fs::read).transpose()
}

fn write_buffered(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(path)?);
    writer.write_all(data)?;
    writer.flush()
}

/// SHA-256 of `data`, or `None` without the `file-io` feature.
#[cfg(feature = "file-io")]
pub fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
pub fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

/// Lowercase hex rendering of a digest.
pub fn to_hex(digest: &[u8]) -> String {
    use std::fmt::Write as _;
    digest.iter().fold(String::with_capacity(digest.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Lowercase hex SHA-256 of `data`, for reports.
pub fn sha256_hex(data: &[u8]) -> Option<String> {
    sha256(data).map(|digest| to_hex(&digest))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
