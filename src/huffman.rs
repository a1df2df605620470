//! Huffman entropy coding of the quantized block stream.
//!
//! Frequencies are counted in parallel over contiguous ranges and merged
//! with atomic adds; the tree is the classic greedy merge of the two
//! lowest-frequency nodes. The decode table (pattern + length -> byte) is
//! what the compressed container persists.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::error::CodecError;

pub const BYTE_VALUES: usize = 256;

/// A variable-length bit pattern; the accumulated bits with their count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HuffmanCode {
    pub bits: u32,
    pub length: u8,
}

/// Binary tree node: a leaf labeled with a byte value, or an internal node
/// owning two children and the sum of their frequencies.
pub struct HuffmanNode {
    pub frequency: u64,
    pub leaf_label: Option<u8>,
    pub left: Option<Box<HuffmanNode>>,
    pub right: Option<Box<HuffmanNode>>,
}

pub type EncodeTable = [Option<HuffmanCode>; BYTE_VALUES];
pub type DecodeTable = HashMap<HuffmanCode, u8>;

/// Parallel byte histogram. The buffer is split into one contiguous range
/// per worker (remainder appended to the last range); each worker counts
/// privately and merges with atomic adds. Addition commutes, so the result
/// matches a sequential tally for any worker count.
pub fn count_frequencies(data: &[u8]) -> [u64; BYTE_VALUES] {
    let shared: [AtomicU64; BYTE_VALUES] = [const { AtomicU64::new(0) }; BYTE_VALUES];
    let workers = rayon::current_num_threads().clamp(1, data.len().max(1));
    let per_worker = data.len() / workers;

    (0..workers).into_par_iter().for_each(|worker| {
        let start = worker * per_worker;
        let end = if worker == workers - 1 {
            data.len()
        } else {
            start + per_worker
        };
        let mut partial = [0u64; BYTE_VALUES];
        for &byte in &data[start..end] {
            partial[byte as usize] += 1;
        }
        for (count, slot) in partial.iter().zip(shared.iter()) {
            slot.fetch_add(*count, Ordering::Relaxed);
        }
    });

    let mut result = [0u64; BYTE_VALUES];
    for (value, slot) in result.iter_mut().zip(shared.iter()) {
        *value = slot.load(Ordering::Relaxed);
    }
    result
}

/// Greedy bottom-up tree construction. Leaves are created in ascending byte
/// order for every value with a nonzero frequency; each round removes the
/// two first-encountered minima and appends their merged parent. Returns
/// `None` when no byte occurred at all.
pub fn build_tree(frequencies: &[u64; BYTE_VALUES]) -> Option<HuffmanNode> {
    let mut nodes: Vec<HuffmanNode> = frequencies
        .iter()
        .enumerate()
        .filter(|&(_, &frequency)| frequency > 0)
        .map(|(value, &frequency)| HuffmanNode {
            frequency,
            leaf_label: Some(value as u8),
            left: None,
            right: None,
        })
        .collect();

    if nodes.is_empty() {
        return None;
    }

    while nodes.len() > 1 {
        let first_min = nodes.remove(min_frequency_index(&nodes));
        let second_min = nodes.remove(min_frequency_index(&nodes));
        nodes.push(HuffmanNode {
            frequency: first_min.frequency + second_min.frequency,
            leaf_label: None,
            left: Some(Box::new(second_min)),
            right: Some(Box::new(first_min)),
        });
    }

    nodes.pop()
}

fn min_frequency_index(nodes: &[HuffmanNode]) -> usize {
    let mut min_index = 0;
    for (index, node) in nodes.iter().enumerate() {
        if node.frequency < nodes[min_index].frequency {
            min_index = index;
        }
    }
    min_index
}

/// Walks the tree depth-first, recording the accumulated pattern at each
/// leaf. A left edge contributes a set bit, a right edge a clear bit. A
/// single-leaf tree gets the one-bit code `0`: a zero-length code could not
/// be recovered by table traversal on decode.
pub fn derive_encode_table(root: &HuffmanNode) -> EncodeTable {
    let mut table = [None; BYTE_VALUES];
    if let Some(value) = root.leaf_label {
        table[value as usize] = Some(HuffmanCode { bits: 0, length: 1 });
        return table;
    }
    fill_encode_table(root, &mut table, 0, 0);
    table
}

fn fill_encode_table(node: &HuffmanNode, table: &mut EncodeTable, bits: u32, depth: u8) {
    if let Some(value) = node.leaf_label {
        table[value as usize] = Some(HuffmanCode { bits, length: depth });
        return;
    }
    if let (Some(left), Some(right)) = (node.left.as_deref(), node.right.as_deref()) {
        fill_encode_table(left, table, (bits << 1) + 1, depth + 1);
        fill_encode_table(right, table, bits << 1, depth + 1);
    }
}

/// Inverts the encode table: exactly one entry per byte present in the
/// input, and a prefix code by construction.
pub fn build_decode_table(encode_table: &EncodeTable) -> DecodeTable {
    let mut table = DecodeTable::new();
    for (value, code) in encode_table.iter().enumerate() {
        if let Some(code) = code {
            table.insert(*code, value as u8);
        }
    }
    table
}

/// Writes codes MSB-first into a growing byte buffer, zero-padding the last
/// byte. Bits accumulate in a wide buffer and drain as whole bytes.
struct BitWriter {
    buffer: Vec<u8>,
    bit_buffer: u64,
    bits_in_buffer: u32,
    bits_written: u64,
}

impl BitWriter {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            bit_buffer: 0,
            bits_in_buffer: 0,
            bits_written: 0,
        }
    }

    fn write(&mut self, code: HuffmanCode) {
        let length = code.length as u32;
        let mask = (1u64 << length) - 1;
        self.bit_buffer = (self.bit_buffer << length) | (code.bits as u64 & mask);
        self.bits_in_buffer += length;
        self.bits_written += length as u64;

        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            self.buffer.push(((self.bit_buffer >> shift) & 0xFF) as u8);
            self.bits_in_buffer = shift;
            if shift > 0 {
                self.bit_buffer &= (1u64 << shift) - 1;
            } else {
                self.bit_buffer = 0;
            }
        }
    }

    fn finish(mut self) -> (Vec<u8>, u64) {
        if self.bits_in_buffer > 0 {
            let padding = 8 - self.bits_in_buffer;
            self.buffer
                .push(((self.bit_buffer << padding) & 0xFF) as u8);
        }
        (self.buffer, self.bits_written)
    }
}

/// Encodes `data` and returns the packed bytes, the decode table, and the
/// count of meaningful bits (the zero padding of the final byte is not
/// self-describing). Empty input yields an empty stream and an empty table.
pub fn encode(data: &[u8]) -> (Vec<u8>, DecodeTable, u64) {
    let frequencies = count_frequencies(data);
    let Some(root) = build_tree(&frequencies) else {
        return (Vec::new(), DecodeTable::new(), 0);
    };
    let encode_table = derive_encode_table(&root);
    let decode_table = build_decode_table(&encode_table);

    let mut writer = BitWriter::new(data.len() / 2);
    for &byte in data {
        // Every input byte has a code: the table was derived from these
        // exact frequencies.
        if let Some(code) = encode_table[byte as usize] {
            writer.write(code);
        }
    }
    let (packed, bits_count) = writer.finish();
    (packed, decode_table, bits_count)
}

/// Reads `bits_count` bits MSB-first, emitting a byte whenever the
/// accumulated pattern matches a decode-table entry. A stream that ends
/// mid-code, or an accumulator that outgrows every code in the table, is
/// corrupt.
pub fn decode(
    encoded: &[u8],
    decode_table: &DecodeTable,
    bits_count: u64,
) -> Result<Vec<u8>, CodecError> {
    if bits_count > encoded.len() as u64 * 8 {
        return Err(CodecError::CorruptStream);
    }
    let max_code_length = decode_table.keys().map(|code| code.length).max().unwrap_or(0);
    if bits_count > 0 && max_code_length == 0 {
        return Err(CodecError::CorruptStream);
    }

    let mut result = Vec::with_capacity(encoded.len() * 2);
    let mut sample = HuffmanCode::default();
    let mut bits_read = 0u64;

    'outer: for &byte in encoded {
        for bit_number in 0..8 {
            if bits_read == bits_count {
                break 'outer;
            }
            let bit = (byte >> (7 - bit_number)) & 1;
            sample.bits = (sample.bits << 1) | bit as u32;
            sample.length += 1;
            bits_read += 1;

            if let Some(&value) = decode_table.get(&sample) {
                result.push(value);
                sample = HuffmanCode::default();
            } else if sample.length >= max_code_length {
                return Err(CodecError::CorruptStream);
            }
        }
    }

    if sample.length != 0 {
        return Err(CodecError::CorruptStream);
    }
    Ok(result)
}
