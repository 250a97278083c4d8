use super::compression::{Compression, Predictor};
use super::photometrics::{PlanarConfiguration, SampleFormat, SampleType};
use super::RasterError;
use crate::tiff::{Endian, Ifd, TagId, TiffError};
use std::fmt::Display;

/// Strip or tile organization of one image. Strips are treated as tiles
/// spanning the full image width; the last strip may be shorter.
#[derive(Clone, Debug)]
pub struct BlockLayout {
    pub dimensions: (u32, u32),
    pub block_width: u32,
    pub block_height: u32,
    pub tiled: bool,
    pub compression: Compression,
    pub predictor: Predictor,
    pub sample_type: SampleType,
    pub samples_per_pixel: u16,
    pub planar: PlanarConfiguration,
    pub endian: Endian,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
}

impl BlockLayout {
    pub fn from_ifd(ifd: &Ifd, endian: Endian) -> Result<Self, RasterError> {
        let width: u32 = ifd.get_tag_value(TagId::ImageWidth)?;
        let height: u32 = ifd.get_tag_value(TagId::ImageHeight)?;
        if width == 0 || height == 0 {
            return Err(RasterError::NotSupported(format!(
                "empty image {width}x{height}"
            )));
        }

        let tiled = ifd.has_tag(TagId::TileWidth);
        let (block_width, block_height, offsets, byte_counts) = if tiled {
            (
                ifd.get_tag_value::<u32>(TagId::TileWidth)?,
                ifd.get_tag_value::<u32>(TagId::TileLength)?,
                ifd.get_tag_values::<u64>(TagId::TileOffsets)?,
                ifd.get_tag_values::<u64>(TagId::TileByteCounts)?,
            )
        } else {
            let rows_per_strip = ifd.get_tag_value_or(TagId::RowsPerStrip, u32::MAX)?;
            (
                width,
                rows_per_strip.min(height),
                ifd.get_tag_values::<u64>(TagId::StripOffsets)?,
                ifd.get_tag_values::<u64>(TagId::StripByteCounts)?,
            )
        };
        if block_width == 0 || block_height == 0 {
            return Err(RasterError::NotSupported(format!(
                "zero sized blocks {block_width}x{block_height}"
            )));
        }

        let samples_per_pixel = ifd.get_tag_value_or::<u16>(TagId::SamplesPerPixel, 1)?.max(1);
        let bits_per_sample: Vec<u16> = match ifd.get_tag_values(TagId::BitsPerSample) {
            Ok(bits) => bits,
            Err(TiffError::MissingTag(_)) => vec![1],
            Err(e) => return Err(e.into()),
        };
        if bits_per_sample.windows(2).any(|w| w[0] != w[1]) {
            return Err(RasterError::NotSupported(format!(
                "mixed bit depths {bits_per_sample:?}"
            )));
        }
        let bits = bits_per_sample.first().copied().unwrap_or(1);

        let sample_format: SampleFormat = match ifd.get_tag_values::<u16>(TagId::SampleFormat) {
            Ok(formats) => formats.first().copied().unwrap_or(1).into(),
            Err(TiffError::MissingTag(_)) => SampleFormat::Unsigned,
            Err(e) => return Err(e.into()),
        };
        let sample_type = SampleType::resolve(sample_format, bits).ok_or_else(|| {
            RasterError::NotSupported(format!("{bits}-bit {sample_format:?} samples"))
        })?;

        let planar: PlanarConfiguration = ifd
            .get_tag_value_or::<u16>(TagId::PlanarConfiguration, 1)?
            .into();
        if planar == PlanarConfiguration::Unknown {
            return Err(RasterError::NotSupported("unknown planar configuration".into()));
        }

        let compression = ifd.get_tag_value_or::<u16>(TagId::Compression, 1)?.into();
        let predictor = ifd.get_tag_value_or::<u16>(TagId::Predictor, 1)?.into();

        let layout = Self {
            dimensions: (width, height),
            block_width,
            block_height,
            tiled,
            compression,
            predictor,
            sample_type,
            samples_per_pixel,
            planar,
            endian,
            offsets,
            byte_counts,
        };

        let offsets_id = if tiled {
            TagId::TileOffsets
        } else {
            TagId::StripOffsets
        };
        if layout.offsets.len() != layout.byte_counts.len()
            || layout.offsets.len() < layout.blocks_per_plane()
        {
            return Err(TiffError::BadTag(offsets_id).into());
        }

        Ok(layout)
    }

    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    pub fn blocks_across(&self) -> usize {
        self.width().div_ceil(self.block_width) as usize
    }

    pub fn blocks_down(&self) -> usize {
        self.height().div_ceil(self.block_height) as usize
    }

    pub fn blocks_per_plane(&self) -> usize {
        self.blocks_across() * self.blocks_down()
    }

    /// Block (col, row) pairs intersecting a pixel region given as
    /// `[col_min, col_max) x [row_min, row_max)`.
    pub fn blocks_within(&self, cols: (u32, u32), rows: (u32, u32)) -> Vec<(usize, usize)> {
        if cols.1 <= cols.0 || rows.1 <= rows.0 {
            return vec![];
        }
        let col_min = (cols.0 / self.block_width) as usize;
        let col_max = ((cols.1 - 1) / self.block_width) as usize;
        let row_min = (rows.0 / self.block_height) as usize;
        let row_max = ((rows.1 - 1) / self.block_height) as usize;

        let mut blocks = vec![];
        for row in row_min..=row_max.min(self.blocks_down() - 1) {
            for col in col_min..=col_max.min(self.blocks_across() - 1) {
                blocks.push((col, row));
            }
        }
        blocks
    }

    /// Index of the band-1 block. Planar images store band 1 as the first
    /// plane, so chunky and planar share the same indexing.
    pub fn block_index(&self, col: usize, row: usize) -> usize {
        row * self.blocks_across() + col
    }

    pub fn block_byte_range(&self, index: usize) -> Result<(u64, u64), RasterError> {
        let (Some(offset), Some(count)) = (self.offsets.get(index), self.byte_counts.get(index))
        else {
            return Err(RasterError::BlockIndex(index));
        };
        Ok((*offset, offset + count))
    }

    /// Pixel rows actually stored in block row `row`.
    pub fn block_rows(&self, row: usize) -> u32 {
        if self.tiled {
            self.block_height
        } else {
            let start = row as u32 * self.block_height;
            self.block_height.min(self.height().saturating_sub(start))
        }
    }

    /// Samples interleaved per pixel inside one block.
    pub fn block_stride(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Planar => 1,
            _ => self.samples_per_pixel as usize,
        }
    }

    pub fn block_size_bytes(&self, row: usize) -> usize {
        self.block_width as usize
            * self.block_rows(row) as usize
            * self.block_stride()
            * self.sample_type.bytes()
    }

    /// Decompress one block and undo its predictor.
    pub fn decode_block(&self, index: usize, row: usize, bytes: &[u8]) -> Result<Vec<u8>, RasterError> {
        let mut buffer = self.compression.decode(bytes)?;
        let expected = self.block_size_bytes(row);
        if buffer.len() < expected {
            return Err(RasterError::BlockSize {
                index,
                expected,
                actual: buffer.len(),
            });
        }
        buffer.truncate(expected);

        self.predictor.predict(
            buffer.as_mut_slice(),
            self.block_width as usize,
            self.sample_type.bytes() * 8,
            self.block_stride(),
            self.endian,
        )?;
        Ok(buffer)
    }

    /// Band-1 sample at block-local pixel `(x, y)` of a decoded block.
    pub fn sample(&self, block: &[u8], x: usize, y: usize) -> Option<f64> {
        let n = self.sample_type.bytes();
        let index = (y * self.block_width as usize + x) * self.block_stride();
        let bytes = block.get(index * n..(index + 1) * n)?;
        let e = self.endian;
        let value = match self.sample_type {
            SampleType::U8 => bytes[0] as f64,
            SampleType::I8 => bytes[0] as i8 as f64,
            SampleType::U16 => e.decode::<2, u16>(bytes.try_into().ok()?).ok()? as f64,
            SampleType::I16 => e.decode::<2, i16>(bytes.try_into().ok()?).ok()? as f64,
            SampleType::U32 => e.decode::<4, u32>(bytes.try_into().ok()?).ok()? as f64,
            SampleType::I32 => e.decode::<4, i32>(bytes.try_into().ok()?).ok()? as f64,
            SampleType::F32 => e.decode::<4, f32>(bytes.try_into().ok()?).ok()? as f64,
            SampleType::F64 => e.decode::<8, f64>(bytes.try_into().ok()?).ok()?,
        };
        Some(value)
    }
}

impl Display for BlockLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} in {} {}x{} {}, {:?} x{}, {:?} Compression, {:?} Predictor",
            self.dimensions.0,
            self.dimensions.1,
            self.offsets.len(),
            self.block_width,
            self.block_height,
            if self.tiled { "tiles" } else { "strips" },
            self.sample_type,
            self.samples_per_pixel,
            self.compression,
            self.predictor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiff::TagData;

    fn strip_ifd(width: u32, height: u32, rows_per_strip: u32) -> Ifd {
        let endian = Endian::Little;
        let strips = height.div_ceil(rows_per_strip) as usize;
        let mut ifd = Ifd::new();
        ifd.set_tag(TagId::ImageWidth, TagData::from_long(width), endian);
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(height), endian);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![8]), endian);
        ifd.set_tag(TagId::RowsPerStrip, TagData::from_long(rows_per_strip), endian);
        ifd.set_tag(TagId::StripOffsets, TagData::Long(vec![0; strips]), endian);
        ifd.set_tag(TagId::StripByteCounts, TagData::Long(vec![0; strips]), endian);
        ifd
    }

    #[test]
    fn strips_span_full_width() {
        let layout = BlockLayout::from_ifd(&strip_ifd(100, 25, 10), Endian::Little).unwrap();
        assert!(!layout.tiled);
        assert_eq!(layout.blocks_across(), 1);
        assert_eq!(layout.blocks_down(), 3);
        assert_eq!(layout.block_rows(0), 10);
        assert_eq!(layout.block_rows(2), 5);
        assert_eq!(layout.block_size_bytes(2), 500);
        assert_eq!(layout.sample_type, SampleType::U8);
    }

    #[test]
    fn window_selects_intersecting_blocks_only() {
        let endian = Endian::Little;
        let mut ifd = strip_ifd(100, 100, 100);
        ifd.set_tag(TagId::TileWidth, TagData::from_short(32), endian);
        ifd.set_tag(TagId::TileLength, TagData::from_short(32), endian);
        ifd.set_tag(TagId::TileOffsets, TagData::Long(vec![0; 16]), endian);
        ifd.set_tag(TagId::TileByteCounts, TagData::Long(vec![0; 16]), endian);
        let layout = BlockLayout::from_ifd(&ifd, endian).unwrap();

        assert!(layout.tiled);
        assert_eq!(layout.blocks_per_plane(), 16);
        assert_eq!(
            layout.blocks_within((30, 40), (0, 10)),
            vec![(0, 0), (1, 0)]
        );
        assert_eq!(layout.blocks_within((96, 100), (96, 100)), vec![(3, 3)]);
        assert_eq!(layout.block_index(3, 3), 15);
        assert!(layout.blocks_within((10, 10), (0, 5)).is_empty());
    }

    #[test]
    fn too_few_offsets_is_bad_tag() {
        let endian = Endian::Little;
        let mut ifd = strip_ifd(10, 30, 10);
        ifd.set_tag(TagId::StripOffsets, TagData::Long(vec![0; 2]), endian);
        ifd.set_tag(TagId::StripByteCounts, TagData::Long(vec![0; 2]), endian);
        assert!(matches!(
            BlockLayout::from_ifd(&ifd, endian),
            Err(RasterError::Tiff(TiffError::BadTag(TagId::StripOffsets)))
        ));
    }

    #[test]
    fn unsupported_bit_depth() {
        let mut ifd = strip_ifd(10, 10, 10);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![12]), Endian::Little);
        assert!(matches!(
            BlockLayout::from_ifd(&ifd, Endian::Little),
            Err(RasterError::NotSupported(_))
        ));
    }

    #[test]
    fn samples_decode_with_stride_and_sign() {
        let endian = Endian::Big;
        let mut ifd = strip_ifd(2, 1, 1);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![16, 16]), endian);
        ifd.set_tag(TagId::SamplesPerPixel, TagData::from_short(2), endian);
        ifd.set_tag(TagId::SampleFormat, TagData::Short(vec![2, 2]), endian);
        let layout = BlockLayout::from_ifd(&ifd, endian).unwrap();

        let block = endian.encode_all(&[-5_i16, 99, 300, 99]);
        assert_eq!(layout.sample(&block, 0, 0), Some(-5.0));
        assert_eq!(layout.sample(&block, 1, 0), Some(300.0));
        assert_eq!(layout.sample(&block, 2, 0), None);
    }
}
