//! Serialized compressed-image container.
//!
//! Little-endian framing: magic, quality, chroma mode, dimensions, the
//! meaningful bit count, the Huffman decode table (count, then bit pattern,
//! bit length and byte value per entry) and the packed bit stream. Every
//! field is validated on read; a malformed file surfaces `CorruptStream`,
//! never a panic.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::CodecError;
use crate::huffman::{DecodeTable, HuffmanCode};
use crate::processor::ChromaMode;

const MAGIC: [u8; 4] = *b"BJC1";

/// The persisted result of a compression run. Immutable once created.
pub struct CompressedImage {
    pub quality: u8,
    pub width: usize,
    pub height: usize,
    pub chroma: ChromaMode,
    pub bits_count: u64,
    pub decode_table: DecodeTable,
    pub compressed_bytes: Vec<u8>,
}

impl CompressedImage {
    /// Writes the container to any sink. Decode-table entries are written
    /// sorted by byte value so identical images serialize to identical
    /// bytes.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CodecError> {
        writer.write_all(&MAGIC)?;
        writer.write_u8(self.quality)?;
        writer.write_u8(self.chroma.into())?;
        writer.write_u32::<LittleEndian>(self.width as u32)?;
        writer.write_u32::<LittleEndian>(self.height as u32)?;
        writer.write_u64::<LittleEndian>(self.bits_count)?;

        let mut entries: Vec<(&HuffmanCode, &u8)> = self.decode_table.iter().collect();
        entries.sort_by_key(|entry| *entry.1);
        writer.write_u16::<LittleEndian>(entries.len() as u16)?;
        for (code, &value) in entries {
            writer.write_u32::<LittleEndian>(code.bits)?;
            writer.write_u8(code.length)?;
            writer.write_u8(value)?;
        }

        writer.write_u64::<LittleEndian>(self.compressed_bytes.len() as u64)?;
        writer.write_all(&self.compressed_bytes)?;
        Ok(())
    }

    /// Reads a container, validating every field.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, CodecError> {
        let mut magic = [0u8; 4];
        read_exact(reader, &mut magic)?;
        if magic != MAGIC {
            return Err(CodecError::CorruptStream);
        }

        let quality = read_u8(reader)?;
        let chroma = ChromaMode::try_from(read_u8(reader)?)
            .map_err(|_| CodecError::CorruptStream)?;
        let width = read_u32(reader)? as usize;
        let height = read_u32(reader)? as usize;
        let bits_count = read_u64(reader)?;

        let entry_count = read_u16(reader)? as usize;
        if entry_count > 256 {
            return Err(CodecError::CorruptStream);
        }
        let mut decode_table = DecodeTable::with_capacity(entry_count);
        for _ in 0..entry_count {
            let bits = read_u32(reader)?;
            let length = read_u8(reader)?;
            let value = read_u8(reader)?;
            decode_table.insert(HuffmanCode { bits, length }, value);
        }
        if decode_table.len() != entry_count {
            return Err(CodecError::CorruptStream);
        }

        let stream_length = read_u64(reader)? as usize;
        if bits_count > stream_length as u64 * 8 {
            return Err(CodecError::CorruptStream);
        }
        let mut compressed_bytes = vec![0u8; stream_length];
        read_exact(reader, &mut compressed_bytes)?;

        Ok(Self {
            quality,
            width,
            height,
            chroma,
            bits_count,
            decode_table,
            compressed_bytes,
        })
    }

    /// Saves the container to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CodecError> {
        debug!(path = %path.as_ref().display(), "saving compressed image");
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a container from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        debug!(path = %path.as_ref().display(), "loading compressed image");
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }
}

// Truncation means a corrupt container, not an i/o failure.
fn read_exact<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<(), CodecError> {
    reader.read_exact(buffer).map_err(map_eof)
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8, CodecError> {
    reader.read_u8().map_err(map_eof)
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16, CodecError> {
    reader.read_u16::<LittleEndian>().map_err(map_eof)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, CodecError> {
    reader.read_u32::<LittleEndian>().map_err(map_eof)
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, CodecError> {
    reader.read_u64::<LittleEndian>().map_err(map_eof)
}

fn map_eof(error: std::io::Error) -> CodecError {
    if error.kind() == std::io::ErrorKind::UnexpectedEof {
        CodecError::CorruptStream
    } else {
        CodecError::Io(error)
    }
}
