// https://en.wikipedia.org/wiki/TIFF#TIFF_Compression_Tag
// https://exiftool.org/TagNames/EXIF.html#Compression

use crate::tiff::Endian;
use eio::{FromBytes, ToBytes};
use flate2::{read::ZlibDecoder, write::ZlibEncoder};
use num_enum::{FromPrimitive, IntoPrimitive};
use num_traits::WrappingAdd;
use salzweg::decoder::{DecodingError, TiffStyleDecoder};
use std::fmt;
use std::io::{self, Read, Write};

#[derive(Debug)]
pub enum DecompressError {
    LzwError(DecodingError),
    PackBitsTruncated,
    CompressionNotSupported(Compression),
    PredictorNotSupported(Predictor),
    /// Predictor set on samples it cannot apply to (bit depth, byte count).
    BadPredictorInput(String),
    IoError(io::Error),
}

impl From<io::Error> for DecompressError {
    fn from(e: io::Error) -> Self {
        DecompressError::IoError(e)
    }
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompressError::LzwError(e) => write!(f, "LZW decode failed: {e:?}"),
            DecompressError::PackBitsTruncated => write!(f, "PackBits stream is truncated"),
            DecompressError::CompressionNotSupported(c) => {
                write!(f, "compression {c:?} is not supported")
            }
            DecompressError::PredictorNotSupported(p) => {
                write!(f, "predictor {p:?} is not supported")
            }
            DecompressError::BadPredictorInput(msg) => write!(f, "predictor: {msg}"),
            DecompressError::IoError(e) => write!(f, "inflate failed: {e}"),
        }
    }
}

impl std::error::Error for DecompressError {}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Compression {
    Uncompressed = 1,
    CCITT1D = 2,
    T4Group3Fax = 3,
    T6Group4Fax = 4,
    Lzw = 5,
    JpegOld = 6,
    Jpeg = 7,
    DeflateAdobe = 8,
    PackBits = 32773,
    Deflate = 32946,
    JPEG2000 = 34712,
    ESRILerc = 34887,
    LZMA2 = 34925,
    Zstd = 34926,
    WebP = 34927,
    JPEGXL = 52546,

    #[num_enum(default)]
    Unknown = 0x0000,
}

impl Compression {
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, DecompressError> {
        match self {
            Self::Uncompressed => Ok(bytes.to_vec()),
            Self::Lzw => TiffStyleDecoder::decode_to_vec(bytes).map_err(DecompressError::LzwError),
            Self::DeflateAdobe | Self::Deflate => {
                let mut buf = vec![];
                ZlibDecoder::new(bytes).read_to_end(&mut buf)?;
                Ok(buf)
            }
            Self::PackBits => unpack_bits(bytes),
            other => Err(DecompressError::CompressionNotSupported(*other)),
        }
    }

    pub fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, DecompressError> {
        match self {
            Self::Uncompressed => Ok(bytes.to_vec()),
            Self::DeflateAdobe | Self::Deflate => {
                let mut encoder = ZlibEncoder::new(vec![], flate2::Compression::default());
                encoder.write_all(bytes)?;
                Ok(encoder.finish()?)
            }
            other => Err(DecompressError::CompressionNotSupported(*other)),
        }
    }
}

// https://www.fileformat.info/format/tiff/corion-packbits.htm
fn unpack_bits(bytes: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    let mut i = 0;
    while i < bytes.len() {
        let header = bytes[i] as i8;
        i += 1;
        match header {
            0..=127 => {
                let n = header as usize + 1;
                let literal = bytes
                    .get(i..i + n)
                    .ok_or(DecompressError::PackBitsTruncated)?;
                out.extend_from_slice(literal);
                i += n;
            }
            -127..=-1 => {
                let value = *bytes.get(i).ok_or(DecompressError::PackBitsTruncated)?;
                let n = 1 - header as isize;
                out.extend(std::iter::repeat(value).take(n as usize));
                i += 1;
            }
            -128 => {}
        }
    }
    Ok(out)
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Predictor {
    No = 1,
    Horizontal = 2,
    FloatingPoint = 3,

    #[num_enum(default)]
    Unknown = 0x0000,
}

impl Predictor {
    /// Undo the predictor in place. `width` is the block width in pixels and
    /// `samples_per_pixel` the interleave of one row (1 for planar data).
    pub fn predict(
        &self,
        buffer: &mut [u8],
        width: usize,
        bit_depth: usize,
        samples_per_pixel: usize,
        endian: Endian,
    ) -> Result<(), DecompressError> {
        if *self == Self::No {
            return Ok(());
        }
        if bit_depth % 8 != 0 {
            return Err(DecompressError::BadPredictorInput(format!(
                "bit depth {bit_depth} is not byte aligned"
            )));
        }
        let bytes_per_sample = bit_depth / 8;
        let row_bytes = width * samples_per_pixel * bytes_per_sample;
        if row_bytes == 0 {
            return Ok(());
        }

        match self {
            Self::Horizontal => {
                for row in buffer.chunks_exact_mut(row_bytes) {
                    match bytes_per_sample {
                        1 => accumulate::<1, u8>(row, samples_per_pixel, endian),
                        2 => accumulate::<2, u16>(row, samples_per_pixel, endian),
                        4 => accumulate::<4, u32>(row, samples_per_pixel, endian),
                        8 => accumulate::<8, u64>(row, samples_per_pixel, endian),
                        n => {
                            return Err(DecompressError::BadPredictorInput(format!(
                                "{n}-byte samples"
                            )))
                        }
                    }
                }
            }
            Self::FloatingPoint => {
                let mut scratch = vec![0u8; row_bytes];
                for row in buffer.chunks_exact_mut(row_bytes) {
                    unshuffle_float_row(row, &mut scratch, samples_per_pixel, bytes_per_sample, endian);
                }
            }
            other => return Err(DecompressError::PredictorNotSupported(*other)),
        }
        Ok(())
    }
}

fn accumulate<const N: usize, T>(row: &mut [u8], stride: usize, endian: Endian)
where
    T: FromBytes<N> + ToBytes<N> + WrappingAdd + Copy,
{
    let samples = row.len() / N;
    for i in stride..samples {
        let (head, tail) = row.split_at_mut(i * N);
        let prev_start = (i - stride) * N;
        let prev: [u8; N] = match head[prev_start..prev_start + N].try_into() {
            Ok(b) => b,
            Err(_) => return,
        };
        let cur: [u8; N] = match tail[..N].try_into() {
            Ok(b) => b,
            Err(_) => return,
        };
        let (Ok(prev), Ok(cur)) = (endian.decode::<N, T>(prev), endian.decode::<N, T>(cur)) else {
            return;
        };
        tail[..N].copy_from_slice(&endian.encode(cur.wrapping_add(&prev)));
    }
}

// Floating point predictor: bytes are differenced across the row, then stored
// as planes of most significant byte first.
fn unshuffle_float_row(
    row: &mut [u8],
    scratch: &mut [u8],
    stride: usize,
    bytes_per_sample: usize,
    endian: Endian,
) {
    for i in stride..row.len() {
        row[i] = row[i].wrapping_add(row[i - stride]);
    }
    scratch.copy_from_slice(row);
    let count = row.len() / bytes_per_sample;
    for sample in 0..count {
        for byte in 0..bytes_per_sample {
            let plane = match endian {
                Endian::Big => byte,
                Endian::Little => bytes_per_sample - byte - 1,
            };
            row[sample * bytes_per_sample + byte] = scratch[plane * count + sample];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packbits_handles_runs_and_literals() {
        // Example from the TIFF 6.0 specification, section 9
        let packed = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(Compression::PackBits.decode(&packed).unwrap(), expected);
    }

    #[test]
    fn packbits_truncated_literal_errors() {
        assert!(matches!(
            Compression::PackBits.decode(&[0x03, 0x01]),
            Err(DecompressError::PackBitsTruncated)
        ));
    }

    #[test]
    fn deflate_round_trips() {
        let data: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let packed = Compression::DeflateAdobe.encode(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(Compression::DeflateAdobe.decode(&packed).unwrap(), data);
    }

    #[test]
    fn horizontal_predictor_8bit() {
        let mut row = vec![10, 1, 1, 1, 5, 2, 2, 2];
        Predictor::Horizontal
            .predict(&mut row, 4, 8, 1, Endian::Little)
            .unwrap();
        assert_eq!(row, vec![10, 11, 12, 13, 5, 7, 9, 11]);
    }

    #[test]
    fn horizontal_predictor_16bit_respects_byte_order() {
        let endian = Endian::Big;
        let mut row = endian.encode_all(&[1000_u16, 24, 65535]);
        Predictor::Horizontal
            .predict(&mut row, 3, 16, 1, endian)
            .unwrap();
        let values = endian.decode_all::<2, u16>(&row).unwrap();
        assert_eq!(values, vec![1000, 1024, 1023]);
    }

    #[test]
    fn horizontal_predictor_chunky_stride() {
        // Two samples per pixel accumulate independently
        let mut row = vec![1, 100, 1, 1, 1, 1];
        Predictor::Horizontal
            .predict(&mut row, 3, 8, 2, Endian::Little)
            .unwrap();
        assert_eq!(row, vec![1, 100, 2, 101, 3, 102]);
    }

    #[test]
    fn floating_point_predictor_restores_values() {
        let values = [1.5_f32, -2.25, 1024.0];
        let endian = Endian::Little;

        // Forward transform: split into big-endian byte planes, then difference
        let count = values.len();
        let mut planes = vec![0u8; count * 4];
        for (i, v) in values.iter().enumerate() {
            for (b, byte) in v.to_be_bytes().iter().enumerate() {
                planes[b * count + i] = *byte;
            }
        }
        for i in (1..planes.len()).rev() {
            planes[i] = planes[i].wrapping_sub(planes[i - 1]);
        }

        Predictor::FloatingPoint
            .predict(&mut planes, count, 32, 1, endian)
            .unwrap();
        assert_eq!(endian.decode_all::<4, f32>(&planes).unwrap(), values);
    }
}
