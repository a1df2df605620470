//! Parallel block-based JPEG-style image codec.
//!
//! The classic pipeline: RGB -> YCbCr conversion, 8x8 block DCT,
//! quality-scaled quantization, zigzag reordering and Huffman entropy
//! coding, plus the symmetric decompression path. Block rows are processed
//! by a fixed worker pool over disjoint output ranges, so the compressed
//! bytes are identical for any worker count.
//!
//! The caller supplies a rectangular buffer of 24-bit RGB pixels with both
//! dimensions multiples of 8 (see [`Matrix::from_rgb_bytes`], which
//! truncates raw input down to block multiples); image-file parsing and
//! writing live outside this crate.

pub mod color;
pub mod container;
pub mod dct;
pub mod error;
pub mod huffman;
pub mod matrix;
pub mod processor;
pub mod quantization;
pub mod zigzag;

pub use color::{Pixel, PixelFormat};
pub use container::CompressedImage;
pub use error::CodecError;
pub use matrix::Matrix;
pub use processor::{ChromaMode, compress, compress_with_mode, decompress};
pub use quantization::QuantizationCache;
