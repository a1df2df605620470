use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("quality must be in [1,99] interval")]
    InvalidQuality,
    #[error("image dimensions must be multiples of the block size")]
    InvalidDimensions,
    #[error("compressed stream is corrupt")]
    CorruptStream,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
