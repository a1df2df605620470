//! Quantization of DCT coefficient blocks.
//!
//! The divisor table is the standard luminance matrix scaled by a quality
//! level in [1,99]. Scaled matrices are cached per quality behind a lock so
//! concurrent compressions share them; the computation is pure, so a
//! redundant concurrent compute for the same quality is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dct::BLOCK_DIM;
use crate::error::CodecError;

/// Standard JPEG luminance quantization table (quality 50).
pub const BASE_QUANT_TABLE: [i32; BLOCK_DIM] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

pub type QuantizationMatrix = [i32; BLOCK_DIM];

/// Scales the base table for a quality level in [1,99].
pub fn quantization_matrix(quality: u8) -> Result<QuantizationMatrix, CodecError> {
    if !(1..=99).contains(&quality) {
        return Err(CodecError::InvalidQuality);
    }
    let quality = quality as i32;
    let multiplier = if quality < 50 { 5000 / quality } else { 200 - 2 * quality };

    let mut matrix = [0i32; BLOCK_DIM];
    for (entry, &base) in matrix.iter_mut().zip(BASE_QUANT_TABLE.iter()) {
        // Integer scaling can reach 0 at the highest qualities; divisors
        // must stay positive.
        *entry = ((multiplier * base + 50) / 100).max(1);
    }
    Ok(matrix)
}

/// Process-wide cache of scaled quantization matrices keyed by quality.
///
/// Passed into the pipeline explicitly rather than living in a global.
/// Readers never block each other; a write only happens on the first use of
/// a quality level.
#[derive(Default)]
pub struct QuantizationCache {
    matrices: RwLock<HashMap<u8, Arc<QuantizationMatrix>>>,
}

impl QuantizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached matrix for `quality`, computing and inserting it
    /// on first use.
    pub fn get(&self, quality: u8) -> Result<Arc<QuantizationMatrix>, CodecError> {
        if let Some(matrix) = self.matrices.read().get(&quality) {
            return Ok(Arc::clone(matrix));
        }
        let matrix = Arc::new(quantization_matrix(quality)?);
        self.matrices
            .write()
            .insert(quality, Arc::clone(&matrix));
        Ok(matrix)
    }
}

/// Divides each coefficient by its table entry, truncating toward zero, and
/// stores the signed result reinterpreted as an unsigned byte.
pub fn quantize_block(
    freqs: &[f32; BLOCK_DIM],
    matrix: &QuantizationMatrix,
    output: &mut [u8; BLOCK_DIM],
) {
    for index in 0..BLOCK_DIM {
        output[index] = (freqs[index] / matrix[index] as f32) as i8 as u8;
    }
}

/// Reinterprets each stored byte as signed and multiplies by the matching
/// table entry.
pub fn dequantize_block(
    quantized: &[u8; BLOCK_DIM],
    matrix: &QuantizationMatrix,
    output: &mut [f32; BLOCK_DIM],
) {
    for index in 0..BLOCK_DIM {
        output[index] = (quantized[index] as i8) as f32 * matrix[index] as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_50_keeps_base_dc_entry() {
        let matrix = quantization_matrix(50).unwrap();
        assert_eq!(matrix[0], 16);
    }

    #[test]
    fn test_quality_bounds_rejected() {
        assert!(matches!(
            quantization_matrix(0),
            Err(CodecError::InvalidQuality)
        ));
        assert!(matches!(
            quantization_matrix(100),
            Err(CodecError::InvalidQuality)
        ));
        assert!(quantization_matrix(1).is_ok());
        assert!(quantization_matrix(99).is_ok());
    }

    #[test]
    fn test_low_quality_is_coarser_everywhere() {
        let coarse = quantization_matrix(1).unwrap();
        let fine = quantization_matrix(99).unwrap();
        for index in 0..BLOCK_DIM {
            assert!(
                coarse[index] > fine[index],
                "entry {index}: {} vs {}",
                coarse[index],
                fine[index]
            );
        }
    }

    #[test]
    fn test_entries_never_reach_zero() {
        for quality in 1..=99u8 {
            let matrix = quantization_matrix(quality).unwrap();
            assert!(matrix.iter().all(|&entry| entry >= 1), "quality {quality}");
        }
    }

    #[test]
    fn test_quantize_truncates_toward_zero_and_keeps_sign() {
        let matrix = quantization_matrix(50).unwrap();
        let mut freqs = [0.0f32; BLOCK_DIM];
        freqs[0] = -20.56; // entry 16 -> -1
        freqs[1] = 21.9; // entry 11 -> 1
        let mut quantized = [0u8; BLOCK_DIM];
        quantize_block(&freqs, &matrix, &mut quantized);
        assert_eq!(quantized[0] as i8, -1);
        assert_eq!(quantized[1] as i8, 1);

        let mut restored = [0.0f32; BLOCK_DIM];
        dequantize_block(&quantized, &matrix, &mut restored);
        assert_eq!(restored[0], -16.0);
        assert_eq!(restored[1], 11.0);
    }

    #[test]
    fn test_cache_returns_same_matrix() {
        let cache = QuantizationCache::new();
        let first = cache.get(70).unwrap();
        let second = cache.get(70).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(cache.get(0), Err(CodecError::InvalidQuality)));
    }
}
