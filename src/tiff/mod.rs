use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::io::{self, Read, Seek, Write};
use tracing::debug;

mod endian;
mod error;
mod ifd;
mod tag;

pub use endian::Endian;
pub use error::TiffError;
pub use ifd::Ifd;
pub use tag::{Tag, TagData, TagId, TagType};

/// Payload offset of each tag, by tag code, as written by [Tiff::encode].
pub type TiffOffsets = HashMap<u16, u64>;

const MAX_IFDS: usize = 4096;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum TiffVariant {
    Normal,
    Big,
}

impl TiffVariant {
    pub(crate) fn read_offset<R: Read>(&self, endian: Endian, stream: &mut R) -> io::Result<u64> {
        match self {
            TiffVariant::Normal => endian.read::<4, u32>(stream).map(|v| v as u64),
            TiffVariant::Big => endian.read(stream),
        }
    }

    pub(crate) fn write_offset<W: Write>(
        &self,
        endian: Endian,
        stream: &mut W,
        offset: u64,
    ) -> io::Result<()> {
        match self {
            TiffVariant::Normal => endian.write(stream, offset as u32),
            TiffVariant::Big => endian.write(stream, offset),
        }
    }

    pub const fn offset_bytesize(&self) -> usize {
        match self {
            TiffVariant::Normal => 4,
            TiffVariant::Big => 8,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tiff {
    pub endian: Endian,
    pub variant: TiffVariant,
    pub ifds: Vec<Ifd>,
}

impl Tiff {
    pub fn new(endian: Endian, variant: TiffVariant) -> Self {
        Self {
            endian,
            variant,
            ifds: vec![],
        }
    }

    pub fn open<R: Read + Seek>(stream: &mut R) -> Result<Self, TiffError> {
        // TIFF Header
        let mut buf = [0; 4];
        stream.read_exact(&mut buf)?;

        let endian = match &buf[..2] {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            _ => return Err(TiffError::BadMagicBytes),
        };

        let variant = match &buf[2..4] {
            b"\0*" | b"*\0" => TiffVariant::Normal,
            b"\0+" | b"+\0" => TiffVariant::Big,
            _ => return Err(TiffError::BadMagicBytes),
        };

        if TiffVariant::Big == variant {
            // BigTIFFs have 4 extra bytes in the header
            let _offset_bytesize: u16 = endian.read(stream)?; // 0x0008
            let _: u16 = endian.read(stream)?; // 0x0000
        }

        // IFDs
        let mut ifds = vec![];
        let mut seen = HashSet::new();
        let mut ifd_offset = variant.read_offset(endian, stream)?;
        while ifd_offset != 0 {
            if !seen.insert(ifd_offset) || ifds.len() >= MAX_IFDS {
                return Err(TiffError::BadIfdChain(ifd_offset));
            }
            let (ifd, next_offset) = Ifd::parse(stream, ifd_offset, endian, variant)?;
            debug!("IFD {} at {ifd_offset} with {} tags", ifds.len(), ifd.0.len());
            ifd_offset = next_offset;
            ifds.push(ifd);
        }

        Ok(Self {
            endian,
            variant,
            ifds,
        })
    }

    pub fn ifd0(&self) -> Result<&Ifd, TiffError> {
        self.ifds.first().ok_or(TiffError::NoIfd0)
    }

    pub fn add_ifd(&mut self) -> &mut Ifd {
        self.ifds.push(Ifd::new());
        let last = self.ifds.len() - 1;
        &mut self.ifds[last]
    }

    /// Write the header and every directory. Image data is the caller's
    /// business; the returned offsets locate each directory's tag payloads.
    pub fn encode<W: Write + Seek>(&self, stream: &mut W) -> io::Result<Vec<TiffOffsets>> {
        let endian = self.endian;
        match endian {
            Endian::Little => stream.write_all(b"II")?,
            Endian::Big => stream.write_all(b"MM")?,
        }
        match self.variant {
            TiffVariant::Normal => {
                endian.write(stream, 42_u16)?;
                endian.write(stream, 8_u32)?;
            }
            TiffVariant::Big => {
                endian.write(stream, 43_u16)?;
                endian.write(stream, 8_u16)?;
                endian.write(stream, 0_u16)?;
                endian.write(stream, 16_u64)?;
            }
        }

        let count = self.ifds.len();
        self.ifds
            .iter()
            .enumerate()
            .map(|(i, ifd)| ifd.encode(stream, endian, self.variant, i + 1 == count))
            .collect()
    }
}

impl Display for Tiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, ifd) in self.ifds.iter().enumerate() {
            writeln!(f, "IFD {i}:")?;
            for tag in ifd.0.iter() {
                writeln!(f, "\t{}", tag)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(endian: Endian, variant: TiffVariant) -> Tiff {
        let mut tiff = Tiff::new(endian, variant);
        let ifd = tiff.add_ifd();
        ifd.set_tag(TagId::ImageWidth, TagData::from_long(640), endian);
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(320), endian);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![8, 8, 8]), endian);
        ifd.set_tag(
            TagId::ModelPixelScale,
            TagData::Double(vec![0.5, 0.5, 0.0]),
            endian,
        );
        ifd.set_tag(TagId::GDALNoData, TagData::from_string("0"), endian);
        tiff
    }

    #[test]
    fn reopens_what_it_encodes() {
        for endian in [Endian::Little, Endian::Big] {
            for variant in [TiffVariant::Normal, TiffVariant::Big] {
                let mut buf = Cursor::new(vec![]);
                sample(endian, variant).encode(&mut buf).unwrap();
                buf.set_position(0);

                let tiff = Tiff::open(&mut buf).unwrap();
                assert_eq!(tiff.endian, endian);
                assert_eq!(tiff.variant, variant);
                let ifd = tiff.ifd0().unwrap();
                assert_eq!(ifd.get_tag_value::<u32>(TagId::ImageWidth).unwrap(), 640);
                assert_eq!(
                    ifd.get_tag_values::<u16>(TagId::BitsPerSample).unwrap(),
                    vec![8, 8, 8]
                );
                assert_eq!(
                    ifd.get_tag_values::<f64>(TagId::ModelPixelScale).unwrap(),
                    vec![0.5, 0.5, 0.0]
                );
                let datatypes: Vec<TagType> = [
                    TagId::ImageWidth,
                    TagId::BitsPerSample,
                    TagId::ModelPixelScale,
                    TagId::GDALNoData,
                ]
                .iter()
                .map(|id| ifd.get_tag(*id).unwrap().datatype)
                .collect();
                assert_eq!(
                    datatypes,
                    vec![TagType::Long, TagType::Short, TagType::Double, TagType::Ascii]
                );
                assert_eq!(
                    ifd.get_tag(TagId::GDALNoData).unwrap().try_to_string().as_deref(),
                    Some("0")
                );
            }
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = Cursor::new(b"PK\x03\x04rest".to_vec());
        assert!(matches!(Tiff::open(&mut buf), Err(TiffError::BadMagicBytes)));
    }

    #[test]
    fn rejects_looping_ifd_chain() {
        // Single empty IFD at offset 8 whose next pointer is itself
        let mut bytes = b"II*\0".to_vec();
        bytes.extend(8_u32.to_le_bytes());
        bytes.extend(0_u16.to_le_bytes());
        bytes.extend(8_u32.to_le_bytes());
        let mut buf = Cursor::new(bytes);
        assert!(matches!(
            Tiff::open(&mut buf),
            Err(TiffError::BadIfdChain(8))
        ));
    }

    #[test]
    fn missing_tag_is_reported() {
        let tiff = sample(Endian::Little, TiffVariant::Normal);
        let ifd = tiff.ifd0().unwrap();
        assert!(matches!(
            ifd.get_tag_value::<u16>(TagId::Compression),
            Err(TiffError::MissingTag(TagId::Compression))
        ));
        assert_eq!(
            ifd.get_tag_value_or::<u16>(TagId::Compression, 1).unwrap(),
            1
        );
    }
}
