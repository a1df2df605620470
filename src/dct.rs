//! Discrete Cosine Transform over 8x8 blocks.
//!
//! Forward and inverse 2D DCT-II with the codec's own scaling constant
//! beta = 1/N + 1/N. The constant differs from the textbook 2/N
//! normalization but the inverse matches it, so round trips are exact up to
//! float error; only interoperability with external decoders would care.
//!
//! The half-resolution variants average adjacent row pairs (forward over the
//! input samples, inverse over the coefficient rows) and still produce a
//! full 8x8 output block, trading chroma detail for half the summation work.

use std::f32::consts::PI;

use once_cell::sync::Lazy;

pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_DIM: usize = BLOCK_SIZE * BLOCK_SIZE;

/// alpha(0) = 1/sqrt(2); alpha(k>0) = 1.
const ALPHA_DC: f32 = 0.707_106_78;
const BETA: f32 = 1.0 / BLOCK_SIZE as f32 + 1.0 / BLOCK_SIZE as f32;

/// BASIS[i][k] = cos((2i+1) * k * pi / 16), the only cosine arguments the
/// full transforms ever need.
static BASIS: Lazy<[[f32; BLOCK_SIZE]; BLOCK_SIZE]> = Lazy::new(|| {
    let mut table = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
    for (i, row) in table.iter_mut().enumerate() {
        for (k, value) in row.iter_mut().enumerate() {
            *value = (((2 * i + 1) * k) as f32 * PI / (2.0 * BLOCK_SIZE as f32)).cos();
        }
    }
    table
});

/// MIDPOINT_BASIS[p][k] = cos((4p+2) * k * pi / 16): the cosine at the
/// midpoint of row pair (2p, 2p+1), used by the subsampled forward
/// transform.
static MIDPOINT_BASIS: Lazy<[[f32; BLOCK_SIZE]; BLOCK_SIZE / 2]> = Lazy::new(|| {
    let mut table = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE / 2];
    for (p, row) in table.iter_mut().enumerate() {
        for (k, value) in row.iter_mut().enumerate() {
            *value = (((4 * p + 2) * k) as f32 * PI / (2.0 * BLOCK_SIZE as f32)).cos();
        }
    }
    table
});

fn alpha(k: usize) -> f32 {
    if k == 0 { ALPHA_DC } else { 1.0 }
}

/// Forward 2D DCT over one 8x8 block.
pub fn fdct_8x8(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    for u in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for x in 0..BLOCK_SIZE {
                let cos_x = BASIS[x][u];
                for y in 0..BLOCK_SIZE {
                    sum += input[x * BLOCK_SIZE + y] * cos_x * BASIS[y][v];
                }
            }
            output[u * BLOCK_SIZE + v] = alpha(u) * alpha(v) * BETA * sum;
        }
    }
}

/// Inverse 2D DCT over one 8x8 coefficient block.
pub fn idct_8x8(coeffs: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    for x in 0..BLOCK_SIZE {
        for y in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for u in 0..BLOCK_SIZE {
                let cos_x = BASIS[x][u];
                let alpha_u = alpha(u);
                for v in 0..BLOCK_SIZE {
                    sum += alpha_u * alpha(v) * coeffs[u * BLOCK_SIZE + v] * cos_x * BASIS[y][v];
                }
            }
            output[x * BLOCK_SIZE + y] = sum * BETA;
        }
    }
}

/// Forward transform that averages each adjacent row pair and evaluates the
/// basis at the pair midpoint, doubling every term to compensate for the
/// halved sample count.
pub fn fdct_8x8_subsampled_by2(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    for u in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for p in 0..BLOCK_SIZE / 2 {
                let x = 2 * p;
                let cos_x = MIDPOINT_BASIS[p][u];
                for y in 0..BLOCK_SIZE {
                    let averaged =
                        (input[x * BLOCK_SIZE + y] + input[(x + 1) * BLOCK_SIZE + y]) / 2.0;
                    sum += averaged * cos_x * BASIS[y][v] * 2.0;
                }
            }
            output[u * BLOCK_SIZE + v] = alpha(u) * alpha(v) * BETA * sum;
        }
    }
}

/// Inverse transform that averages each adjacent coefficient-row pair,
/// doubling every term, and reconstructs the full-resolution block.
pub fn idct_8x8_subsampled_by2(coeffs: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    for x in 0..BLOCK_SIZE {
        for y in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for p in 0..BLOCK_SIZE / 2 {
                let u = 2 * p;
                let cos_x = BASIS[x][u];
                let alpha_u = alpha(u);
                for v in 0..BLOCK_SIZE {
                    let averaged =
                        (coeffs[u * BLOCK_SIZE + v] + coeffs[(u + 1) * BLOCK_SIZE + v]) / 2.0;
                    sum += 2.0 * alpha_u * alpha(v) * averaged * cos_x * BASIS[y][v];
                }
            }
            output[x * BLOCK_SIZE + y] = sum * BETA;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_block_transforms_to_zero_coefficients() {
        let input = [0.0f32; BLOCK_DIM];
        let mut coeffs = [1.0f32; BLOCK_DIM];
        fdct_8x8(&input, &mut coeffs);
        for value in coeffs {
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn test_constant_block_is_dc_only() {
        let input = [-2.5705f32; BLOCK_DIM];
        let mut coeffs = [0.0f32; BLOCK_DIM];
        fdct_8x8(&input, &mut coeffs);
        // DC = alpha^2 * beta * 64 * c = 8c for the 8x8 block.
        assert_relative_eq!(coeffs[0], 8.0 * -2.5705, max_relative = 1e-4);
        for value in coeffs.iter().skip(1) {
            assert!(value.abs() < 1e-3, "AC coefficient should vanish: {value}");
        }
    }

    #[test]
    fn test_fdct_idct_roundtrip() {
        let mut input = [0.0f32; BLOCK_DIM];
        for (index, value) in input.iter_mut().enumerate() {
            *value = ((index * 37) % 256) as f32 - 128.0;
        }
        let mut coeffs = [0.0f32; BLOCK_DIM];
        fdct_8x8(&input, &mut coeffs);
        let mut output = [0.0f32; BLOCK_DIM];
        idct_8x8(&coeffs, &mut output);
        for index in 0..BLOCK_DIM {
            assert!(
                (input[index] - output[index]).abs() < 0.1,
                "mismatch at {index}: {} vs {}",
                input[index],
                output[index]
            );
        }
    }

    #[test]
    fn test_subsampled_constant_block_matches_full_transform() {
        let input = [13.5f32; BLOCK_DIM];
        let mut full = [0.0f32; BLOCK_DIM];
        fdct_8x8(&input, &mut full);
        let mut subsampled = [0.0f32; BLOCK_DIM];
        fdct_8x8_subsampled_by2(&input, &mut subsampled);
        for index in 0..BLOCK_DIM {
            assert!(
                (full[index] - subsampled[index]).abs() < 1e-3,
                "mismatch at {index}: {} vs {}",
                full[index],
                subsampled[index]
            );
        }
    }

    #[test]
    fn test_subsampled_roundtrip_preserves_horizontal_detail() {
        // The halved path discards vertical detail only: a block that varies
        // along columns alone must survive the forward/inverse pair intact.
        let mut input = [0.0f32; BLOCK_DIM];
        for x in 0..BLOCK_SIZE {
            for y in 0..BLOCK_SIZE {
                input[x * BLOCK_SIZE + y] = (y * 13) as f32 - 40.0;
            }
        }
        let mut coeffs = [0.0f32; BLOCK_DIM];
        fdct_8x8_subsampled_by2(&input, &mut coeffs);
        let mut output = [0.0f32; BLOCK_DIM];
        idct_8x8_subsampled_by2(&coeffs, &mut output);
        for index in 0..BLOCK_DIM {
            assert!(
                (input[index] - output[index]).abs() < 0.1,
                "mismatch at {index}: {} vs {}",
                input[index],
                output[index]
            );
        }
    }
}
