#![allow(dead_code)]

use quakemap::encode::Encoder;
use quakemap::raster::{Compression, Predictor, SampleType};
use quakemap::{Extent, FigureConfig, ServiceConfig};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Coverage of the fixture basemap, 0.1 degree pixels.
pub const COVERAGE: Extent = Extent {
    west: 120.0,
    east: 160.0,
    south: 20.0,
    north: 50.0,
};
pub const WIDTH: u32 = 400;
pub const HEIGHT: u32 = 300;

/// Deflate compressed, tiled, 16-bit elevation-like ramp.
pub fn write_basemap(path: &Path) {
    let values: Vec<u16> = (0..HEIGHT)
        .flat_map(|row| (0..WIDTH).map(move |col| (row * 7 + col * 3) as u16))
        .collect();
    let encoder = Encoder::new((WIDTH, HEIGHT), 1, &values, SampleType::U16)
        .unwrap()
        .with_extent(COVERAGE)
        .with_compression(Compression::Deflate)
        .with_predictor(Predictor::Horizontal)
        .with_tile_size(64);
    let mut file = BufWriter::new(File::create(path).unwrap());
    encoder.encode(&mut file).unwrap();
    file.flush().unwrap();
}

pub struct Fixture {
    pub dir: TempDir,
    pub config: ServiceConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_figure(FigureConfig::default())
    }

    /// Smaller figures keep tests that do not check the default size fast.
    pub fn small() -> Self {
        Self::with_figure(FigureConfig {
            width_px: 300,
            height_px: 300,
            dpi: 30.0,
            half_extent: 5.0,
        })
    }

    fn with_figure(figure: FigureConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("basemap.tif");
        write_basemap(&raster);
        let config = ServiceConfig {
            raster,
            features_dir: None,
            font: None,
            figure,
        };
        Self { dir, config }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
