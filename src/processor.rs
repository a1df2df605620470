//! Compression pipeline orchestration.
//!
//! Compression walks every 8x8 block position, runs each channel through
//! shift, forward DCT, quantization and zigzag, and writes the 64 resulting
//! bytes at an offset computed from the block position alone. Block rows are
//! dealt to workers as contiguous ranges (remainder appended to the last
//! share), so every worker owns a disjoint slice of the output and the byte
//! layout is identical for any worker count. One Huffman pass over the
//! assembled buffer then produces the compressed container.
//!
//! Decompression mirrors each stage in the same block order.

use std::ops::Range;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use rayon::prelude::*;
use tracing::debug;

use crate::color::Pixel;
use crate::container::CompressedImage;
use crate::dct::{
    BLOCK_DIM, BLOCK_SIZE, fdct_8x8, fdct_8x8_subsampled_by2, idct_8x8, idct_8x8_subsampled_by2,
};
use crate::error::CodecError;
use crate::huffman;
use crate::matrix::Matrix;
use crate::quantization::{QuantizationCache, dequantize_block, quantize_block};
use crate::zigzag;

pub const CHANNEL_COUNT: usize = 3;

/// Centering shift applied before the forward transform and undone after
/// the inverse, matching the signed byte range used by quantization.
const SAMPLE_SHIFT: f32 = 128.0;

/// How the chroma channels are transformed. Persisted in the container so
/// decompression always applies the matching inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ChromaMode {
    /// Full-resolution transform on all three channels.
    #[default]
    Full = 0,
    /// Half-resolution transform on Cb/Cr: adjacent row pairs are averaged,
    /// trading chroma detail for half the summation work.
    SubsampledBy2 = 1,
}

/// Compresses a pixel buffer at the given quality with full-resolution
/// chroma.
pub fn compress(
    matrix: &Matrix,
    quality: u8,
    cache: &QuantizationCache,
) -> Result<CompressedImage, CodecError> {
    compress_with_mode(matrix, quality, ChromaMode::Full, cache)
}

/// Compresses a pixel buffer at the given quality and chroma mode.
pub fn compress_with_mode(
    matrix: &Matrix,
    quality: u8,
    chroma: ChromaMode,
    cache: &QuantizationCache,
) -> Result<CompressedImage, CodecError> {
    let quant_matrix = cache.get(quality)?;
    let height = matrix.height();
    let width = matrix.width();
    if height % BLOCK_SIZE != 0 || width % BLOCK_SIZE != 0 {
        return Err(CodecError::InvalidDimensions);
    }
    debug!(height, width, quality, ?chroma, "compressing pixel buffer");

    let block_rows = height / BLOCK_SIZE;
    let bytes_per_block_row = width * BLOCK_SIZE * CHANNEL_COUNT;
    let mut output = vec![0u8; block_rows * bytes_per_block_row];

    let shares = worker_shares(block_rows);
    let slices = split_into_shares(&mut output, &shares, bytes_per_block_row);
    shares
        .into_par_iter()
        .zip(slices.into_par_iter())
        .for_each(|(rows, share)| {
            let mut samples = [0.0f32; BLOCK_DIM];
            let mut freqs = [0.0f32; BLOCK_DIM];
            let mut quantized = [0u8; BLOCK_DIM];
            let mut offset = 0;
            for block_row in rows {
                let top = block_row * BLOCK_SIZE;
                for left in (0..width).step_by(BLOCK_SIZE) {
                    for channel in 0..CHANNEL_COUNT {
                        extract_channel_block(matrix, top, left, channel, &mut samples);
                        forward_transform(channel, chroma)(&samples, &mut freqs);
                        quantize_block(&freqs, &quant_matrix, &mut quantized);
                        share[offset..offset + BLOCK_DIM]
                            .copy_from_slice(&zigzag::scan(&quantized));
                        offset += BLOCK_DIM;
                    }
                }
            }
        });

    let (compressed_bytes, decode_table, bits_count) = huffman::encode(&output);
    debug!(
        input_bytes = output.len(),
        compressed_bytes = compressed_bytes.len(),
        bits_count,
        "pixel buffer compressed"
    );

    Ok(CompressedImage {
        quality,
        width,
        height,
        chroma,
        bits_count,
        decode_table,
        compressed_bytes,
    })
}

/// Decompresses a container back into a pixel buffer.
pub fn decompress(
    image: &CompressedImage,
    cache: &QuantizationCache,
) -> Result<Matrix, CodecError> {
    let quant_matrix = cache.get(image.quality)?;
    let height = image.height;
    let width = image.width;
    if height % BLOCK_SIZE != 0 || width % BLOCK_SIZE != 0 {
        return Err(CodecError::InvalidDimensions);
    }
    debug!(height, width, quality = image.quality, "decompressing image");

    let decoded = huffman::decode(&image.compressed_bytes, &image.decode_table, image.bits_count)?;
    if decoded.len() != height * width * CHANNEL_COUNT {
        return Err(CodecError::CorruptStream);
    }

    let block_rows = height / BLOCK_SIZE;
    let bytes_per_block_row = width * BLOCK_SIZE * CHANNEL_COUNT;
    let pixels_per_block_row = width * BLOCK_SIZE;
    let mut pixels = vec![Pixel::default(); height * width];

    let shares = worker_shares(block_rows);
    let slices = split_into_shares(&mut pixels, &shares, pixels_per_block_row);
    shares
        .into_par_iter()
        .zip(slices.into_par_iter())
        .for_each(|(rows, share)| {
            let mut scanned = [0u8; BLOCK_DIM];
            let mut freqs = [0.0f32; BLOCK_DIM];
            let mut channels = [[0.0f32; BLOCK_DIM]; CHANNEL_COUNT];
            for (local_row, block_row) in rows.enumerate() {
                let source = &decoded[block_row * bytes_per_block_row..][..bytes_per_block_row];
                let mut offset = 0;
                for left in (0..width).step_by(BLOCK_SIZE) {
                    for channel in 0..CHANNEL_COUNT {
                        scanned.copy_from_slice(&source[offset..offset + BLOCK_DIM]);
                        offset += BLOCK_DIM;
                        let block = zigzag::unscan(&scanned);
                        dequantize_block(&block, &quant_matrix, &mut freqs);
                        inverse_transform(channel, image.chroma)(&freqs, &mut channels[channel]);
                    }
                    for row in 0..BLOCK_SIZE {
                        for col in 0..BLOCK_SIZE {
                            let sample = row * BLOCK_SIZE + col;
                            share[(local_row * BLOCK_SIZE + row) * width + left + col] =
                                Pixel::from_ycbcr(
                                    channels[0][sample] + SAMPLE_SHIFT,
                                    channels[1][sample] + SAMPLE_SHIFT,
                                    channels[2][sample] + SAMPLE_SHIFT,
                                );
                        }
                    }
                }
            }
        });

    Ok(Matrix::from_pixels(pixels, height, width))
}

fn forward_transform(
    channel: usize,
    chroma: ChromaMode,
) -> fn(&[f32; BLOCK_DIM], &mut [f32; BLOCK_DIM]) {
    if channel > 0 && chroma == ChromaMode::SubsampledBy2 {
        fdct_8x8_subsampled_by2
    } else {
        fdct_8x8
    }
}

fn inverse_transform(
    channel: usize,
    chroma: ChromaMode,
) -> fn(&[f32; BLOCK_DIM], &mut [f32; BLOCK_DIM]) {
    if channel > 0 && chroma == ChromaMode::SubsampledBy2 {
        idct_8x8_subsampled_by2
    } else {
        idct_8x8
    }
}

fn extract_channel_block(
    matrix: &Matrix,
    top: usize,
    left: usize,
    channel: usize,
    samples: &mut [f32; BLOCK_DIM],
) {
    for row in 0..BLOCK_SIZE {
        for col in 0..BLOCK_SIZE {
            let pixel = matrix.get(top + row, left + col);
            let value = match channel {
                0 => pixel.y(),
                1 => pixel.cb(),
                _ => pixel.cr(),
            };
            samples[row * BLOCK_SIZE + col] = value - SAMPLE_SHIFT;
        }
    }
}

/// Contiguous block-row range per worker: rows divided evenly, remainder
/// appended to the last worker's share.
fn worker_shares(block_rows: usize) -> Vec<Range<usize>> {
    let workers = rayon::current_num_threads().clamp(1, block_rows.max(1));
    let per_worker = block_rows / workers;
    (0..workers)
        .map(|worker| {
            let start = worker * per_worker;
            let end = if worker == workers - 1 {
                block_rows
            } else {
                start + per_worker
            };
            start..end
        })
        .collect()
}

/// Splits a buffer into one disjoint mutable slice per worker share.
fn split_into_shares<'a, T>(
    mut data: &'a mut [T],
    shares: &[Range<usize>],
    items_per_row: usize,
) -> Vec<&'a mut [T]> {
    let mut slices = Vec::with_capacity(shares.len());
    for share in shares {
        let (head, tail) = data.split_at_mut(share.len() * items_per_row);
        slices.push(head);
        data = tail;
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_shares_cover_all_rows_once() {
        for block_rows in [0usize, 1, 3, 7, 8, 17] {
            let shares = worker_shares(block_rows);
            let mut covered = 0;
            let mut next = 0;
            for share in &shares {
                assert_eq!(share.start, next);
                next = share.end;
                covered += share.len();
            }
            assert_eq!(covered, block_rows, "block_rows={block_rows}");
            assert_eq!(next, block_rows);
        }
    }

    #[test]
    fn test_remainder_rows_go_to_last_share() {
        let shares = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap()
            .install(|| worker_shares(10));
        assert_eq!(shares.len(), 4);
        assert_eq!(shares[0], 0..2);
        assert_eq!(shares[3], 6..10);
    }

    #[test]
    fn test_invalid_dimensions_fail_fast() {
        let matrix = Matrix::new(12, 16);
        let cache = QuantizationCache::new();
        assert!(matches!(
            compress(&matrix, 50, &cache),
            Err(CodecError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_invalid_quality_fails_before_processing() {
        let matrix = Matrix::new(8, 8);
        let cache = QuantizationCache::new();
        assert!(matches!(
            compress(&matrix, 0, &cache),
            Err(CodecError::InvalidQuality)
        ));
        assert!(matches!(
            compress(&matrix, 100, &cache),
            Err(CodecError::InvalidQuality)
        ));
    }
}
