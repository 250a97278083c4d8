use crate::geotags::{GeoTags, GeoTiffError};
use crate::io::{RangeCursor, ReadRange};
use crate::tiff::{TagId, Tiff, TiffError};
use std::fmt::{self, Display};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod compression;
mod georef;
mod layout;
mod photometrics;
mod window;

pub use compression::{Compression, DecompressError, Predictor};
pub use georef::{check_geographic, AffineTransform};
pub use layout::BlockLayout;
pub use photometrics::{PhotometricInterpretation, PlanarConfiguration, SampleFormat, SampleType};
pub use window::{extract_window, Extent, PixelWindow, WindowPixels};

#[derive(Debug)]
pub enum RasterError {
    Io(io::Error),
    Tiff(TiffError),
    GeoTiff(GeoTiffError),
    Decompress(DecompressError),
    NotSupported(String),
    NotGeographic(String),
    BadTransform(AffineTransform),
    BlockIndex(usize),
    BlockSize {
        index: usize,
        expected: usize,
        actual: usize,
    },
    InvalidExtent(Extent),
    OutsideCoverage(Extent),
}

impl From<io::Error> for RasterError {
    fn from(e: io::Error) -> Self {
        RasterError::Io(e)
    }
}

impl From<TiffError> for RasterError {
    fn from(e: TiffError) -> Self {
        RasterError::Tiff(e)
    }
}

impl From<GeoTiffError> for RasterError {
    fn from(e: GeoTiffError) -> Self {
        RasterError::GeoTiff(e)
    }
}

impl From<DecompressError> for RasterError {
    fn from(e: DecompressError) -> Self {
        RasterError::Decompress(e)
    }
}

impl Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::Io(e) => write!(f, "raster read failed: {e}"),
            RasterError::Tiff(e) => write!(f, "{e}"),
            RasterError::GeoTiff(e) => write!(f, "{e}"),
            RasterError::Decompress(e) => write!(f, "{e}"),
            RasterError::NotSupported(what) => write!(f, "unsupported raster: {what}"),
            RasterError::NotGeographic(what) => {
                write!(f, "raster is not in geographic coordinates: {what}")
            }
            RasterError::BadTransform(t) => write!(f, "degenerate raster transform {t}"),
            RasterError::BlockIndex(i) => write!(f, "block {i} is out of range"),
            RasterError::BlockSize {
                index,
                expected,
                actual,
            } => write!(
                f,
                "block {index} decoded to {actual} bytes, expected {expected}"
            ),
            RasterError::InvalidExtent(e) => write!(f, "invalid extent {e}"),
            RasterError::OutsideCoverage(e) => {
                write!(f, "extent {e} lies entirely outside the raster")
            }
        }
    }
}

impl std::error::Error for RasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RasterError::Io(e) => Some(e),
            RasterError::Tiff(e) => Some(e),
            RasterError::GeoTiff(e) => Some(e),
            RasterError::Decompress(e) => Some(e),
            _ => None,
        }
    }
}

/// Read-only handle on a georeferenced raster. Only the first image
/// directory is used; overviews are ignored.
pub struct RasterResource {
    pub path: Option<PathBuf>,
    pub layout: BlockLayout,
    pub transform: AffineTransform,
    pub geo: GeoTags,
    pub nodata: Option<f64>,
    source: Box<dyn ReadRange + Send + Sync>,
}

impl RasterResource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        #[cfg(unix)]
        let source = file;
        #[cfg(not(unix))]
        let source = std::sync::Mutex::new(file);

        let mut raster = Self::from_reader(source)?;
        raster.path = Some(path.to_path_buf());
        info!("opened raster {}: {}", path.display(), raster);
        Ok(raster)
    }

    pub fn from_reader<R: ReadRange + Send + Sync + 'static>(source: R) -> Result<Self, RasterError> {
        let tiff = Tiff::open(&mut RangeCursor::new(&source))?;
        let ifd0 = tiff.ifd0()?;

        let geo = GeoTags::parse(ifd0)?;
        let transform = AffineTransform::from_geo_tags(&geo)?;
        let layout = BlockLayout::from_ifd(ifd0, tiff.endian)?;

        let nodata = ifd0
            .get_tag(TagId::GDALNoData)
            .ok()
            .and_then(|tag| tag.try_to_string())
            .and_then(|s| match s.trim().parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("ignoring unparsable GDAL_NODATA value {s:?}");
                    None
                }
            });

        Ok(Self {
            path: None,
            layout,
            transform,
            geo,
            nodata,
            source: Box::new(source),
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.layout.dimensions
    }

    /// Geographic extent of the whole raster.
    pub fn extent(&self) -> Extent {
        let (width, height) = self.dimensions();
        PixelWindow {
            col_off: 0,
            row_off: 0,
            width,
            height,
        }
        .extent(&self.transform)
    }

    pub fn extract_window(&self, extent: &Extent) -> Result<(WindowPixels, Extent), RasterError> {
        extract_window(self, extent)
    }

    fn to_pixel_value(&self, value: f64) -> f32 {
        match self.nodata {
            Some(nodata) if value == nodata || (nodata.is_nan() && value.is_nan()) => f32::NAN,
            _ => value as f32,
        }
    }
}

impl Display for RasterResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} covering {} (nodata {:?})",
            self.layout,
            self.extent(),
            self.nodata
        )
    }
}

impl fmt::Debug for RasterResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterResource")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .field("transform", &self.transform)
            .field("nodata", &self.nodata)
            .finish_non_exhaustive()
    }
}
