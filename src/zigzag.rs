//! Zigzag reordering of 8x8 blocks.
//!
//! Maps the 64 block positions to the frequency-ascending linear order used
//! before entropy coding. The permutation is a compile-time constant.

use crate::dct::BLOCK_DIM;

/// `ZIGZAG_ORDER[i]` is the row-major block index emitted at linear
/// position `i`.
pub const ZIGZAG_ORDER: [usize; BLOCK_DIM] = [
    0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Reads a row-major block in zigzag order.
pub fn scan(block: &[u8; BLOCK_DIM]) -> [u8; BLOCK_DIM] {
    let mut output = [0u8; BLOCK_DIM];
    for (linear, &position) in ZIGZAG_ORDER.iter().enumerate() {
        output[linear] = block[position];
    }
    output
}

/// Restores the row-major block from a zigzag-ordered sequence. Exact
/// inverse of [`scan`].
pub fn unscan(data: &[u8; BLOCK_DIM]) -> [u8; BLOCK_DIM] {
    let mut block = [0u8; BLOCK_DIM];
    for (linear, &position) in ZIGZAG_ORDER.iter().enumerate() {
        block[position] = data[linear];
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dct::BLOCK_SIZE;

    #[test]
    fn test_order_is_a_permutation() {
        let mut seen = [false; BLOCK_DIM];
        for &position in &ZIGZAG_ORDER {
            assert!(!seen[position], "duplicate position {position}");
            seen[position] = true;
        }
    }

    #[test]
    fn test_low_frequencies_come_first() {
        assert_eq!(ZIGZAG_ORDER[0], 0);
        assert_eq!(ZIGZAG_ORDER[1], 1);
        assert_eq!(ZIGZAG_ORDER[2], BLOCK_SIZE);
        assert_eq!(ZIGZAG_ORDER[BLOCK_DIM - 1], BLOCK_DIM - 1);
    }

    #[test]
    fn test_scan_unscan_bijection() {
        let mut block = [0u8; BLOCK_DIM];
        for (index, value) in block.iter_mut().enumerate() {
            *value = (index as u8).wrapping_mul(41).wrapping_add(7);
        }
        assert_eq!(unscan(&scan(&block)), block);
        assert_eq!(scan(&unscan(&block)), block);
    }

    #[test]
    fn test_scan_places_first_column_run() {
        let mut block = [0u8; BLOCK_DIM];
        block[1] = 10; // (0,1)
        block[8] = 20; // (1,0)
        block[16] = 30; // (2,0)
        let scanned = scan(&block);
        assert_eq!(scanned[1], 10);
        assert_eq!(scanned[2], 20);
        assert_eq!(scanned[3], 30);
    }
}
