use crate::raster::{Extent, RasterError};
use std::fmt;
use std::io;
use std::path::PathBuf;

pub const USAGE: &str = "<latitude> <longitude> <magnitude> <event_id> <output_file_path>";

/// Malformed request line or event file.
#[derive(Debug)]
pub enum ParseError {
    UnclosedQuote(char),
    TrailingEscape,
    WrongTokenCount(usize),
    BadNumber { field: &'static str, token: String },
    EventFile { path: PathBuf, reason: String },
}

/// Request outside what the raster and the globe can serve.
#[derive(Debug)]
pub enum GeoRangeError {
    Latitude(f64),
    Longitude(f64),
    Raster(RasterError),
    /// The window around the epicenter overlaps the raster but misses the epicenter itself.
    EpicenterOutside {
        longitude: f64,
        latitude: f64,
        coverage: Extent,
    },
    RasterUnavailable(String),
}

#[derive(Debug)]
pub enum RenderError {
    UnsupportedFormat(PathBuf),
    Canvas(String),
    Encode(image::ImageError),
    Write(io::Error),
}

#[derive(Debug)]
pub enum QuakeMapError {
    Parse(ParseError),
    GeoRange(GeoRangeError),
    Render(RenderError),
    /// Raster could not be opened when the process started.
    Startup(RasterError),
}

pub type QuakeMapResult<T> = Result<T, QuakeMapError>;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnclosedQuote(q) => write!(f, "No closing quotation ({q})"),
            ParseError::TrailingEscape => write!(f, "No escaped character"),
            ParseError::WrongTokenCount(n) => {
                write!(f, "Invalid arguments ({n} given). Expected {USAGE}")
            }
            ParseError::BadNumber { field, token } => {
                write!(f, "could not convert {field} to float: '{token}'")
            }
            ParseError::EventFile { path, reason } => {
                write!(f, "invalid event file {}: {reason}", path.display())
            }
        }
    }
}

impl fmt::Display for GeoRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoRangeError::Latitude(v) => write!(f, "latitude {v} is outside [-90, 90]"),
            GeoRangeError::Longitude(v) => write!(f, "longitude {v} is outside [-180, 180]"),
            GeoRangeError::Raster(e) => write!(f, "{e}"),
            GeoRangeError::EpicenterOutside {
                longitude,
                latitude,
                coverage,
            } => write!(
                f,
                "epicenter ({longitude}, {latitude}) lies outside the raster coverage {coverage}"
            ),
            GeoRangeError::RasterUnavailable(msg) => write!(f, "raster unavailable: {msg}"),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnsupportedFormat(path) => {
                write!(f, "unsupported output format for {}", path.display())
            }
            RenderError::Canvas(msg) => write!(f, "drawing failed: {msg}"),
            RenderError::Encode(e) => write!(f, "image encoding failed: {e}"),
            RenderError::Write(e) => write!(f, "writing image failed: {e}"),
        }
    }
}

impl fmt::Display for QuakeMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuakeMapError::Parse(e) => write!(f, "{e}"),
            QuakeMapError::GeoRange(e) => write!(f, "{e}"),
            QuakeMapError::Render(e) => write!(f, "{e}"),
            QuakeMapError::Startup(e) => write!(f, "cannot open raster: {e}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl std::error::Error for GeoRangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeoRangeError::Raster(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Encode(e) => Some(e),
            RenderError::Write(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for QuakeMapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuakeMapError::Parse(e) => Some(e),
            QuakeMapError::GeoRange(e) => Some(e),
            QuakeMapError::Render(e) => Some(e),
            QuakeMapError::Startup(e) => Some(e),
        }
    }
}

impl From<ParseError> for QuakeMapError {
    fn from(e: ParseError) -> Self {
        QuakeMapError::Parse(e)
    }
}

impl From<GeoRangeError> for QuakeMapError {
    fn from(e: GeoRangeError) -> Self {
        QuakeMapError::GeoRange(e)
    }
}

impl From<RenderError> for QuakeMapError {
    fn from(e: RenderError) -> Self {
        QuakeMapError::Render(e)
    }
}

impl From<RasterError> for GeoRangeError {
    fn from(e: RasterError) -> Self {
        GeoRangeError::Raster(e)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(e: image::ImageError) -> Self {
        RenderError::Encode(e)
    }
}

impl From<io::Error> for RenderError {
    fn from(e: io::Error) -> Self {
        RenderError::Write(e)
    }
}
