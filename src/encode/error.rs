use crate::raster::DecompressError;
use std::fmt;
use std::io;

pub type EncodeResult<T> = Result<T, EncodeError>;

#[derive(Debug)]
pub enum EncodeError {
    WriteError(io::Error),
    CompressionError(DecompressError),
    /// Pixel buffer does not match the declared dimensions.
    BufferSize { expected: usize, actual: usize },
    UnsupportedCompression(String),
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::WriteError(e)
    }
}

impl From<DecompressError> for EncodeError {
    fn from(e: DecompressError) -> Self {
        EncodeError::CompressionError(e)
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::WriteError(e) => write!(f, "GeoTIFF write failed: {e}"),
            EncodeError::CompressionError(e) => write!(f, "GeoTIFF compression failed: {e}"),
            EncodeError::BufferSize { expected, actual } => {
                write!(f, "expected {expected} samples, got {actual}")
            }
            EncodeError::UnsupportedCompression(c) => write!(f, "cannot encode {c}"),
        }
    }
}

impl std::error::Error for EncodeError {}
