use crate::geotags::{
    GeoKeyId, GeoKeyValue, GeoTags, ANGULAR_UNIT_DEGREE, MODEL_TYPE_GEOGRAPHIC,
    RASTER_PIXEL_IS_AREA,
};
use crate::raster::{
    Compression, Extent, PhotometricInterpretation, PlanarConfiguration, Predictor, SampleType,
};
use crate::tiff::{Endian, TagData, TagId, Tiff, TiffVariant};
use eio::{FromBytes, ToBytes};
use num_traits::WrappingSub;
use std::io::{Cursor, Write};
use tracing::debug;

pub mod error;

pub use error::{EncodeError, EncodeResult};

#[derive(Debug, Clone, Copy)]
enum Organization {
    Strips { rows_per_strip: u32 },
    Tiles { size: u32 },
}

/// Writes single-image GeoTIFFs in geographic coordinates.
#[derive(Debug)]
pub struct Encoder {
    dimensions: (u32, u32),
    bands: u16,
    values: Vec<f64>,
    sample_type: SampleType,
    extent: Extent,
    nodata: Option<f64>,
    endian: Endian,
    variant: TiffVariant,
    compression: Compression,
    predictor: Predictor,
    planar: bool,
    organization: Organization,
}

impl Encoder {
    /// `values` holds `bands` interleaved samples per pixel, row major.
    pub fn new<T: Into<f64> + Copy>(
        dimensions: (u32, u32),
        bands: u16,
        values: &[T],
        sample_type: SampleType,
    ) -> EncodeResult<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize * bands as usize;
        if values.len() != expected || bands == 0 {
            return Err(EncodeError::BufferSize {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            dimensions,
            bands,
            values: values.iter().map(|v| (*v).into()).collect(),
            sample_type,
            extent: Extent::new(-180.0, 180.0, -90.0, 90.0),
            nodata: None,
            endian: Endian::Little,
            variant: TiffVariant::Normal,
            compression: Compression::Uncompressed,
            predictor: Predictor::No,
            planar: false,
            organization: Organization::Strips { rows_per_strip: 16 },
        })
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_big_endian(mut self, big: bool) -> Self {
        self.endian = if big { Endian::Big } else { Endian::Little };
        self
    }

    pub fn with_big_tiff(mut self, big: bool) -> Self {
        self.variant = if big {
            TiffVariant::Big
        } else {
            TiffVariant::Normal
        };
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_predictor(mut self, predictor: Predictor) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_planar(mut self, planar: bool) -> Self {
        self.planar = planar;
        self
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.organization = Organization::Strips {
            rows_per_strip: rows.max(1),
        };
        self
    }

    pub fn with_tile_size(mut self, size: u32) -> Self {
        // Tile dimensions must be multiples of 16
        self.organization = Organization::Tiles {
            size: size.max(16).div_ceil(16) * 16,
        };
        self
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> EncodeResult<()> {
        let blocks = self.encode_blocks()?;
        let byte_counts: Vec<u64> = blocks.iter().map(|b| b.len() as u64).collect();

        // Directory size does not depend on offset values, so lay it out once
        // with placeholders to learn where the image data starts.
        let placeholder = vec![0; blocks.len()];
        let header_len = self.header_bytes(&placeholder, &byte_counts)?.len() as u64;

        let mut offsets = Vec::with_capacity(blocks.len());
        let mut next = header_len;
        for count in &byte_counts {
            offsets.push(next);
            next += count;
        }
        let header = self.header_bytes(&offsets, &byte_counts)?;
        debug_assert_eq!(header.len() as u64, header_len);

        writer.write_all(&header)?;
        for block in &blocks {
            writer.write_all(block)?;
        }
        debug!(
            "encoded {}x{} GeoTIFF, {} blocks, {} bytes",
            self.dimensions.0,
            self.dimensions.1,
            blocks.len(),
            next
        );
        Ok(())
    }

    fn header_bytes(&self, offsets: &[u64], byte_counts: &[u64]) -> EncodeResult<Vec<u8>> {
        let endian = self.endian;
        let (width, height) = self.dimensions;
        let mut tiff = Tiff::new(endian, self.variant);
        let ifd = tiff.add_ifd();

        let as_offsets = |values: &[u64]| match self.variant {
            TiffVariant::Normal => TagData::Long(values.iter().map(|v| *v as u32).collect()),
            TiffVariant::Big => TagData::Long8(values.to_vec()),
        };

        let bits = (self.sample_type.bytes() * 8) as u16;
        let bands = self.bands as usize;
        let format: u16 = self.sample_type.format().into();
        let planar = if self.planar {
            PlanarConfiguration::Planar
        } else {
            PlanarConfiguration::Chunky
        };

        ifd.set_tag(TagId::ImageWidth, TagData::from_long(width), endian);
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(height), endian);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![bits; bands]), endian);
        ifd.set_tag(
            TagId::Compression,
            TagData::from_short(self.compression.into()),
            endian,
        );
        ifd.set_tag(
            TagId::PhotometricInterpretation,
            TagData::from_short(PhotometricInterpretation::BlackIsZero.into()),
            endian,
        );
        ifd.set_tag(TagId::SamplesPerPixel, TagData::from_short(self.bands), endian);
        ifd.set_tag(
            TagId::PlanarConfiguration,
            TagData::from_short(planar.into()),
            endian,
        );
        ifd.set_tag(
            TagId::Predictor,
            TagData::from_short(self.predictor.into()),
            endian,
        );
        ifd.set_tag(TagId::SampleFormat, TagData::Short(vec![format; bands]), endian);
        if bands > 1 {
            ifd.set_tag(TagId::ExtraSamples, TagData::Short(vec![0; bands - 1]), endian);
        }

        match self.organization {
            Organization::Strips { rows_per_strip } => {
                ifd.set_tag(TagId::RowsPerStrip, TagData::from_long(rows_per_strip), endian);
                ifd.set_tag(TagId::StripOffsets, as_offsets(offsets), endian);
                ifd.set_tag(TagId::StripByteCounts, as_offsets(byte_counts), endian);
            }
            Organization::Tiles { size } => {
                ifd.set_tag(TagId::TileWidth, TagData::from_long(size), endian);
                ifd.set_tag(TagId::TileLength, TagData::from_long(size), endian);
                ifd.set_tag(TagId::TileOffsets, as_offsets(offsets), endian);
                ifd.set_tag(TagId::TileByteCounts, as_offsets(byte_counts), endian);
            }
        }

        self.geo_tags().add_to_ifd(ifd, endian);
        if let Some(nodata) = self.nodata {
            ifd.set_tag(TagId::GDALNoData, TagData::from_string(&nodata.to_string()), endian);
        }

        let mut buf = Cursor::new(vec![]);
        tiff.encode(&mut buf)?;
        Ok(buf.into_inner())
    }

    fn geo_tags(&self) -> GeoTags {
        let (width, height) = self.dimensions;
        let extent = &self.extent;
        let mut geo = GeoTags::from_tiepoint_and_scale(
            [0.0, 0.0, 0.0, extent.west, extent.north, 0.0],
            [
                extent.width() / width as f64,
                extent.height() / height as f64,
                0.0,
            ],
        );
        geo.set_key(
            GeoKeyId::GTModelTypeGeoKey,
            GeoKeyValue::Short(vec![MODEL_TYPE_GEOGRAPHIC]),
        );
        geo.set_key(
            GeoKeyId::GTRasterTypeGeoKey,
            GeoKeyValue::Short(vec![RASTER_PIXEL_IS_AREA]),
        );
        geo.set_key(
            GeoKeyId::GeographicTypeGeoKey,
            GeoKeyValue::Short(vec![4326]),
        );
        geo.set_key(
            GeoKeyId::GeogCitationGeoKey,
            GeoKeyValue::Ascii("WGS 84".into()),
        );
        geo.set_key(
            GeoKeyId::GeogAngularUnitsGeoKey,
            GeoKeyValue::Short(vec![ANGULAR_UNIT_DEGREE]),
        );
        geo.set_key(
            GeoKeyId::GeogSemiMajorAxisGeoKey,
            GeoKeyValue::Double(vec![6378137.0]),
        );
        geo.set_key(
            GeoKeyId::GeogInvFlatteningGeoKey,
            GeoKeyValue::Double(vec![298.257223563]),
        );
        geo
    }

    fn encode_blocks(&self) -> EncodeResult<Vec<Vec<u8>>> {
        let (width, height) = self.dimensions;
        let planes: Vec<Option<usize>> = if self.planar {
            (0..self.bands as usize).map(Some).collect()
        } else {
            vec![None]
        };

        let mut blocks = vec![];
        for plane in planes {
            match self.organization {
                Organization::Strips { rows_per_strip } => {
                    let mut y = 0;
                    while y < height {
                        let rows = rows_per_strip.min(height - y);
                        blocks.push(self.encode_block(0, y, width, rows, plane)?);
                        y += rows;
                    }
                }
                Organization::Tiles { size } => {
                    for row in 0..height.div_ceil(size) {
                        for col in 0..width.div_ceil(size) {
                            blocks.push(self.encode_block(col * size, row * size, size, size, plane)?);
                        }
                    }
                }
            }
        }
        Ok(blocks)
    }

    fn encode_block(
        &self,
        x0: u32,
        y0: u32,
        block_width: u32,
        block_height: u32,
        plane: Option<usize>,
    ) -> EncodeResult<Vec<u8>> {
        let (width, height) = self.dimensions;
        let bands = self.bands as usize;
        let samples: Vec<usize> = match plane {
            Some(p) => vec![p],
            None => (0..bands).collect(),
        };
        let n = self.sample_type.bytes();

        let mut raw = Vec::with_capacity(
            block_width as usize * block_height as usize * samples.len() * n,
        );
        for y in y0..y0 + block_height {
            for x in x0..x0 + block_width {
                for s in &samples {
                    if x < width && y < height {
                        let index = (y as usize * width as usize + x as usize) * bands + s;
                        raw.extend(self.sample_bytes(self.values[index]));
                    } else {
                        // Tile padding
                        raw.extend(std::iter::repeat(0).take(n));
                    }
                }
            }
        }

        self.apply_predictor(&mut raw, block_width as usize, samples.len())?;
        Ok(self.compression.encode(&raw)?)
    }

    fn sample_bytes(&self, v: f64) -> Vec<u8> {
        let e = self.endian;
        match self.sample_type {
            SampleType::U8 => vec![v as u8],
            SampleType::I8 => vec![v as i8 as u8],
            SampleType::U16 => e.encode(v as u16).to_vec(),
            SampleType::I16 => e.encode(v as i16).to_vec(),
            SampleType::U32 => e.encode(v as u32).to_vec(),
            SampleType::I32 => e.encode(v as i32).to_vec(),
            SampleType::F32 => e.encode(v as f32).to_vec(),
            SampleType::F64 => e.encode(v).to_vec(),
        }
    }

    fn apply_predictor(&self, raw: &mut [u8], block_width: usize, stride: usize) -> EncodeResult<()> {
        match self.predictor {
            Predictor::No => Ok(()),
            Predictor::Horizontal => {
                let n = self.sample_type.bytes();
                let row_bytes = block_width * stride * n;
                for row in raw.chunks_exact_mut(row_bytes) {
                    match n {
                        1 => difference::<1, u8>(row, stride, self.endian),
                        2 => difference::<2, u16>(row, stride, self.endian),
                        4 => difference::<4, u32>(row, stride, self.endian),
                        _ => difference::<8, u64>(row, stride, self.endian),
                    }
                }
                Ok(())
            }
            other => Err(EncodeError::UnsupportedCompression(format!(
                "{other:?} predictor"
            ))),
        }
    }
}

// Inverse of the reader's accumulation: walk backwards so each sample is
// differenced against its original left neighbour.
fn difference<const N: usize, T>(row: &mut [u8], stride: usize, endian: Endian)
where
    T: FromBytes<N> + ToBytes<N> + WrappingSub + Copy,
{
    let samples = row.len() / N;
    for i in (stride..samples).rev() {
        let read = |row: &[u8], at: usize| -> Option<T> {
            let bytes: [u8; N] = row[at * N..(at + 1) * N].try_into().ok()?;
            endian.decode::<N, T>(bytes).ok()
        };
        let (Some(cur), Some(prev)) = (read(row, i), read(row, i - stride)) else {
            return;
        };
        row[i * N..(i + 1) * N].copy_from_slice(&endian.encode(cur.wrapping_sub(&prev)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterResource;
    use std::sync::Mutex;

    fn gradient(width: u32, height: u32) -> Vec<u16> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| (y * 300 + x * 7) as u16))
            .collect()
    }

    fn reopen(encoder: &Encoder) -> RasterResource {
        let mut buf = vec![];
        encoder.encode(&mut buf).unwrap();
        RasterResource::from_reader(Mutex::new(Cursor::new(buf))).unwrap()
    }

    #[test]
    fn strips_tiles_and_options_read_back_identically() {
        let (width, height) = (37, 23);
        let values = gradient(width, height);
        let extent = Extent::new(130.0, 148.5, 30.0, 41.5);
        let base = || {
            Encoder::new((width, height), 1, &values, SampleType::U16)
                .unwrap()
                .with_extent(extent)
        };

        let variants = [
            base(),
            base().with_rows_per_strip(5),
            base().with_tile_size(16),
            base().with_compression(Compression::DeflateAdobe),
            base()
                .with_predictor(Predictor::Horizontal)
                .with_compression(Compression::Deflate)
                .with_big_endian(true),
            base().with_big_tiff(true).with_tile_size(32),
        ];

        for encoder in variants {
            let raster = reopen(&encoder);
            assert_eq!(raster.dimensions(), (width, height));
            let (pixels, covered) = raster.extract_window(&extent).unwrap();
            assert_eq!((pixels.width, pixels.height), (width, height));
            assert_eq!(covered, extent);
            let expected: Vec<f32> = values.iter().map(|v| *v as f32).collect();
            assert_eq!(pixels.data, expected, "{encoder:?}");
        }
    }

    #[test]
    fn first_band_is_extracted_from_chunky_and_planar() {
        let (width, height) = (4, 3);
        // band 1 = index, band 2 = 200 - index
        let values: Vec<u8> = (0..12u8).flat_map(|i| [i, 200 - i]).collect();
        for planar in [false, true] {
            let encoder = Encoder::new((width, height), 2, &values, SampleType::U8)
                .unwrap()
                .with_planar(planar)
                .with_rows_per_strip(2);
            let raster = reopen(&encoder);
            let (pixels, _) = raster.extract_window(&raster.extent()).unwrap();
            let expected: Vec<f32> = (0..12).map(|i| i as f32).collect();
            assert_eq!(pixels.data, expected);
        }
    }

    #[test]
    fn nodata_becomes_nan() {
        let values = [1.0_f32, -9999.0, 3.0, 4.0];
        let encoder = Encoder::new((2, 2), 1, &values, SampleType::F32)
            .unwrap()
            .with_nodata(-9999.0);
        let raster = reopen(&encoder);
        assert_eq!(raster.nodata, Some(-9999.0));
        let (pixels, _) = raster.extract_window(&raster.extent()).unwrap();
        assert!(pixels.data[1].is_nan());
        assert_eq!(pixels.min_max(), Some((1.0, 4.0)));
    }

    #[test]
    fn buffer_size_is_checked() {
        assert!(matches!(
            Encoder::new((3, 3), 1, &[0u8; 8], SampleType::U8),
            Err(EncodeError::BufferSize {
                expected: 9,
                actual: 8
            })
        ));
    }
}
