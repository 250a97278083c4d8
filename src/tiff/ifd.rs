use super::{Endian, Tag, TagData, TagId, TagType, TiffError, TiffOffsets, TiffVariant};
use num_traits::NumCast;
use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Upper bound on the payload of a single tag. Guards against corrupt counts
/// turning into multi-gigabyte allocations.
const MAX_TAG_BYTES: usize = 256 * 1024 * 1024;

#[derive(Clone, Debug, Default)]
pub struct Ifd(pub Vec<Tag>);

impl Ifd {
    pub fn new() -> Self {
        Self(vec![])
    }

    pub fn parse<R: Read + Seek>(
        stream: &mut R,
        offset: u64,
        endian: Endian,
        variant: TiffVariant,
    ) -> io::Result<(Ifd, u64)> {
        stream.seek(SeekFrom::Start(offset))?;

        let tag_count = match variant {
            TiffVariant::Normal => endian.read::<2, u16>(stream)? as u64,
            TiffVariant::Big => endian.read(stream)?,
        };

        let mut tags = Vec::with_capacity(tag_count.min(1024) as usize);
        for _ in 0..tag_count {
            let code = endian.read(stream)?;
            let datatype: TagType = endian.read::<2, u16>(stream)?.into();
            let count = variant.read_offset(endian, stream)? as usize;

            let data_size = count.saturating_mul(datatype.size_in_bytes());
            if data_size > MAX_TAG_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("tag {code} claims {data_size} bytes"),
                ));
            }
            let offset_size = variant.offset_bytesize();
            let mut data: Vec<u8> = vec![0; data_size.max(offset_size)];

            if data_size > offset_size {
                // Payload lives elsewhere, the entry holds its offset
                let data_offset = variant.read_offset(endian, stream)?;
                let pos = stream.stream_position()?;
                stream.seek(SeekFrom::Start(data_offset))?;
                stream.read_exact(&mut data)?;
                stream.seek(SeekFrom::Start(pos))?;
            } else {
                stream.read_exact(&mut data)?;
                data.truncate(data_size);
            }

            tags.push(Tag {
                code,
                datatype,
                endian,
                count,
                data,
            });
        }

        let next_ifd_offset = variant.read_offset(endian, stream)?;
        Ok((Ifd(tags), next_ifd_offset))
    }

    pub fn get_tag_by_code(&self, code: u16) -> Option<&Tag> {
        self.0.iter().find(|tag| tag.code == code)
    }

    pub fn get_tag(&self, id: TagId) -> Result<&Tag, TiffError> {
        self.get_tag_by_code(id.into())
            .ok_or(TiffError::MissingTag(id))
    }

    pub fn has_tag(&self, id: TagId) -> bool {
        self.get_tag_by_code(id.into()).is_some()
    }

    pub fn get_tag_values<T: NumCast>(&self, id: TagId) -> Result<Vec<T>, TiffError> {
        self.get_tag(id)?.values().ok_or(TiffError::BadTag(id))
    }

    pub fn get_tag_value<T: NumCast + Copy>(&self, id: TagId) -> Result<T, TiffError> {
        self.get_tag(id)?.value().ok_or(TiffError::BadTag(id))
    }

    /// Optional tag with a baseline default. A present but malformed tag is
    /// still an error.
    pub fn get_tag_value_or<T: NumCast + Copy>(&self, id: TagId, default: T) -> Result<T, TiffError> {
        match self.get_tag(id) {
            Ok(tag) => tag.value().ok_or(TiffError::BadTag(id)),
            Err(TiffError::MissingTag(_)) => Ok(default),
            Err(e) => Err(e),
        }
    }

    pub fn set_tag<I: Into<u16>>(&mut self, id: I, data: TagData, endian: Endian) {
        let code: u16 = id.into();
        let tag = Tag::new(code, endian, data);
        let tags = &mut self.0;
        if let Some(index) = tags.iter().position(|tag| tag.code == code) {
            tags[index] = tag;
        } else {
            tags.push(tag);
        }
    }

    /// Write this directory at the stream's current position. Out-of-line tag
    /// payloads follow the directory; the returned map gives the file offset
    /// of every tag's payload.
    pub fn encode<W: Write + Seek>(
        &self,
        stream: &mut W,
        endian: Endian,
        variant: TiffVariant,
        last_ifd: bool,
    ) -> io::Result<TiffOffsets> {
        // Readers expect ascending tag codes
        let mut tags: Vec<&Tag> = self.0.iter().collect();
        tags.sort_by_key(|tag| tag.code);

        let tag_count = tags.len();
        match variant {
            TiffVariant::Normal => endian.write(stream, tag_count as u16)?,
            TiffVariant::Big => endian.write(stream, tag_count as u64)?,
        };

        let mut offsets = HashMap::new();
        let mut extra_data = vec![];
        let offset_size = variant.offset_bytesize();
        let entry_size = match variant {
            TiffVariant::Normal => 12,
            TiffVariant::Big => 20,
        };
        let extra_data_offset =
            stream.stream_position()? + entry_size * tag_count as u64 + offset_size as u64;

        for tag in tags {
            endian.write(stream, tag.code)?;
            let datatype: u16 = tag.datatype.into();
            endian.write(stream, datatype)?;
            variant.write_offset(endian, stream, tag.count as u64)?;

            let offset = if tag.data.len() > offset_size {
                let data_offset = extra_data_offset + extra_data.len() as u64;
                variant.write_offset(endian, stream, data_offset)?;
                extra_data.extend_from_slice(&tag.data);
                // Keep payloads word aligned
                if extra_data.len() % 2 == 1 {
                    extra_data.push(0);
                }
                data_offset
            } else {
                let mut bytes = tag.data.clone();
                bytes.resize(offset_size, 0);
                let data_offset = stream.stream_position()?;
                stream.write_all(&bytes)?;
                data_offset
            };

            offsets.insert(tag.code, offset);
        }

        if last_ifd {
            variant.write_offset(endian, stream, 0)?;
        } else {
            let next = stream.stream_position()? + offset_size as u64 + extra_data.len() as u64;
            variant.write_offset(endian, stream, next)?;
        }

        stream.write_all(&extra_data)?;

        Ok(offsets)
    }
}
