use std::path::PathBuf;

pub const DEFAULT_RASTER: &str = "resources/HYP_HR_SR_OB_DR/HYP_HR_SR_OB_DR.tif";

/// Figure geometry. Defaults give a 1000x1000 px image at 100 dpi.
#[derive(Clone, Debug, PartialEq)]
pub struct FigureConfig {
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: f32,
    /// Half width of the square map view in degrees.
    pub half_extent: f64,
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            width_px: 1000,
            height_px: 1000,
            dpi: 100.0,
            half_extent: 5.0,
        }
    }
}

impl FigureConfig {
    /// Points to pixels at this figure's resolution.
    pub fn pt(&self, points: f32) -> f32 {
        points * self.dpi / 72.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    pub raster: PathBuf,
    /// Directory holding the basemap GeoJSON layers, none drawn when unset.
    pub features_dir: Option<PathBuf>,
    /// TrueType font for text layers, searched for in common system
    /// locations when unset.
    pub font: Option<PathBuf>,
    pub figure: FigureConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            raster: PathBuf::from(DEFAULT_RASTER),
            features_dir: None,
            font: None,
            figure: FigureConfig::default(),
        }
    }
}
