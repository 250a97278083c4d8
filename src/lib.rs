//! Earthquake epicenter maps composited over a windowed GeoTIFF basemap.

pub mod config;
pub mod encode;
pub mod error;
pub mod event;
pub mod geotags;
pub mod io;
pub mod raster;
pub mod render;
pub mod request;
pub mod service;
pub mod style;
pub mod tiff;

pub use config::{FigureConfig, ServiceConfig};
pub use error::{GeoRangeError, ParseError, QuakeMapError, QuakeMapResult, RenderError};
pub use event::EarthquakeEvent;
pub use raster::{Extent, RasterResource, WindowPixels};
pub use request::RenderRequest;
pub use service::QuakeMapService;
pub use style::{select_style, MarkerStyle};
