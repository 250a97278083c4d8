// Stateless range reads
//   ReadRange is a superset of Read + Seek where self is immutable, so one
//   opened raster can be shared by every request without a cursor to reset.
//   Required methods
//     fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> { ... }
//   Provided methods
//     fn read_range_exact(&self, start: u64, buf: &mut [u8]) -> Result<()> { ... }
//     fn read_range_to_vec(&self, start: u64, end: u64) -> Result<Vec<u8>> { ... }

use std::io::{Error, ErrorKind, Read, Result, Seek, SeekFrom};
use std::sync::Mutex;

pub trait ReadRange {
    /// Read bytes from a specific offset, returning how many were read.
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize>;

    fn read_range_exact(&self, start: u64, buf: &mut [u8]) -> Result<()> {
        let n = buf.len();
        let mut filled = 0;
        while filled < n {
            match self.read_range(start + filled as u64, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(bytes_read) => filled += bytes_read,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        if filled == n {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("Failed to completely fill buffer: {filled} < {n}"),
            ))
        }
    }

    fn read_range_to_vec(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if end < start {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Inverted byte range {start}..{end}"),
            ));
        }
        let mut buf = vec![0; (end - start) as usize];
        self.read_range_exact(start, &mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + Seek> ReadRange for Mutex<R> {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let mut locked_self = self
            .lock()
            .map_err(|e| Error::other(format!("{e:?}")))?;
        locked_self.seek(SeekFrom::Start(start))?;
        locked_self.read(buf)
    }
}

#[cfg(unix)]
impl ReadRange for std::fs::File {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        self.read_at(buf, start)
    }
}

/// Adapts a `ReadRange` back into `Read + Seek` for the header parser.
pub struct RangeCursor<'a, R: ?Sized> {
    source: &'a R,
    position: u64,
}

impl<'a, R: ReadRange + ?Sized> RangeCursor<'a, R> {
    pub fn new(source: &'a R) -> Self {
        Self {
            source,
            position: 0,
        }
    }
}

impl<R: ReadRange + ?Sized> Read for RangeCursor<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.source.read_range(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: ReadRange + ?Sized> Seek for RangeCursor<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.position = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => self
                .position
                .checked_add_signed(delta)
                .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "seek before start"))?,
            SeekFrom::End(_) => {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    "range readers have no known end",
                ))
            }
        };
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn mutex_reader_reads_ranges() {
        let source = Mutex::new(Cursor::new((0u8..32).collect::<Vec<_>>()));
        assert_eq!(source.read_range_to_vec(4, 8).unwrap(), vec![4, 5, 6, 7]);
        assert_eq!(source.read_range_to_vec(0, 2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn short_read_is_eof() {
        let source = Mutex::new(Cursor::new(vec![1u8, 2, 3]));
        let err = source.read_range_to_vec(1, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn cursor_adapter_tracks_position() {
        let source = Mutex::new(Cursor::new((0u8..16).collect::<Vec<_>>()));
        let mut cursor = RangeCursor::new(&source);
        cursor.seek(SeekFrom::Start(10)).unwrap();
        let mut buf = [0u8; 2];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [10, 11]);
        assert_eq!(cursor.stream_position().unwrap(), 12);
    }
}
