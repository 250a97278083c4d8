use super::TagId;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum TiffError {
    BadMagicBytes,
    NoIfd0,
    ReadError(io::Error),
    MissingTag(TagId),
    BadTag(TagId),
    /// An IFD chain that revisits an offset or runs past the sanity limit.
    BadIfdChain(u64),
}

impl From<io::Error> for TiffError {
    fn from(e: io::Error) -> Self {
        TiffError::ReadError(e)
    }
}

impl fmt::Display for TiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiffError::BadMagicBytes => write!(f, "not a TIFF file (bad magic bytes)"),
            TiffError::NoIfd0 => write!(f, "TIFF has no image directory"),
            TiffError::ReadError(e) => write!(f, "TIFF read error: {e}"),
            TiffError::MissingTag(id) => write!(f, "missing TIFF tag {id:?}"),
            TiffError::BadTag(id) => write!(f, "malformed TIFF tag {id:?}"),
            TiffError::BadIfdChain(offset) => {
                write!(f, "corrupt image directory chain at offset {offset}")
            }
        }
    }
}

impl std::error::Error for TiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TiffError::ReadError(e) => Some(e),
            _ => None,
        }
    }
}
