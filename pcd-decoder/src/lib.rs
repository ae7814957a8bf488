//! PCD point-cloud decoding.
//!
//! Turns the raw bytes of a `.pcd` file into flat position and intensity
//! arrays plus per-axis ranges, ready to be uploaded as a point buffer.
//!
//! ## Supported payloads
//!
//! - `DATA ascii`: whitespace separated rows, one point per line
//! - `DATA binary`: little-endian rows of `row_size` bytes (array of structures)
//! - `DATA binary_compressed`: LZF-compressed structure of arrays
//!
//! Only `x`, `y`, `z` and `intensity` are consumed. Every other declared field
//! is skipped by its declared byte width.
//!
//! ```rust,ignore
//! let bytes = std::fs::read("frame_0001.pcd")?;
//! let cloud = pcd_decoder::decode(&bytes)?;
//! println!("{} points, z in [{}, {}]", cloud.len(), cloud.ranges.z.min, cloud.ranges.z.max);
//! ```

/// Decoded cloud type and the three payload readers.
pub mod decoder;

/// Decoder error taxonomy.
pub mod error;

/// Header parsing and field layout resolution.
pub mod header;

/// LZF codec used by `binary_compressed` payloads.
pub mod lzf;

/// Running min/max tracking per axis.
pub mod ranges;

/// PCD encoder for fixtures and format conversion.
pub mod writer;

pub use decoder::{DecodedPointCloud, decode};
pub use error::{DecodeError, Result};
pub use header::{DataMode, FieldKind, PcdHeader, parse_header};
pub use ranges::{Range, Ranges};
pub use writer::{encode, write_pcd_file};
