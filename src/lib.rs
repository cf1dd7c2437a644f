//! Bindelta: compact binary deltas for cache values, in Rust.
//!
//! The crate provides:
//! - Variable-length packed integers (`packed`)
//! - A value-level binary delta codec (`binary`)
//! - Decorated binaries, values with id-addressed side data (`decoration`)
//! - A delta codec aware of decorations (`decorated`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use bindelta::{binary, DeltaCompressor};
//!
//! let old = vec![b'a'; 256];
//! let mut new = old.clone();
//! new[128] = b'b';
//!
//! let delta = binary::DEFAULT.extract_delta(Some(&old), &new).unwrap();
//! let restored = binary::DEFAULT.apply_delta(Some(&old), delta.as_deref()).unwrap();
//! assert_eq!(restored, new);
//! ```

pub mod binary;
pub mod compressor;
pub mod decorated;
pub mod decoration;
pub mod io;
pub mod packed;

#[cfg(feature = "cli")]
pub mod cli;

pub use binary::{BinaryDeltaCompressor, DeltaOptions};
pub use compressor::{DeltaCompressor, DeltaError};
pub use decorated::DecoratedBinaryDeltaCompressor;
pub use decoration::{BinaryDecorations, DecorationError, DecorationStore};
