use crate::config::FigureConfig;
use crate::raster::Extent;
use tiny_skia::{FillRule, Mask, PathBuilder, Rect, Transform};

// Subplot margins as fractions of the figure, top-left origin
const MARGIN_LEFT: f32 = 0.125;
const MARGIN_RIGHT: f32 = 0.9;
const MARGIN_TOP: f32 = 0.12;
const MARGIN_BOTTOM: f32 = 0.89;

/// Plate carrée map axes placed on the figure. Degrees map linearly to
/// pixels with equal scale on both axes.
#[derive(Clone, Debug, PartialEq)]
pub struct Axes {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub extent: Extent,
}

impl Axes {
    /// Fit the extent's aspect inside the subplot box, centered.
    pub fn layout(figure: &FigureConfig, extent: Extent) -> Self {
        let fig_w = figure.width_px as f32;
        let fig_h = figure.height_px as f32;
        let box_left = fig_w * MARGIN_LEFT;
        let box_top = fig_h * MARGIN_TOP;
        let box_w = fig_w * (MARGIN_RIGHT - MARGIN_LEFT);
        let box_h = fig_h * (MARGIN_BOTTOM - MARGIN_TOP);

        let aspect = (extent.height() / extent.width()) as f32;
        let (width, height) = if box_h / box_w > aspect {
            (box_w, box_w * aspect)
        } else {
            (box_h / aspect, box_h)
        };

        Self {
            left: box_left + (box_w - width) / 2.0,
            top: box_top + (box_h - height) / 2.0,
            width,
            height,
            extent,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn px_per_degree(&self) -> (f32, f32) {
        (
            self.width / self.extent.width() as f32,
            self.height / self.extent.height() as f32,
        )
    }

    /// Figure pixel of a longitude/latitude.
    pub fn to_px(&self, longitude: f64, latitude: f64) -> (f32, f32) {
        let (sx, sy) = self.px_per_degree();
        (
            self.left + (longitude - self.extent.west) as f32 * sx,
            self.top + (self.extent.north - latitude) as f32 * sy,
        )
    }

    /// Figure pixel of a point in axes fractions, (0, 0) bottom-left.
    pub fn fraction_to_px(&self, fx: f32, fy: f32) -> (f32, f32) {
        (self.left + fx * self.width, self.bottom() - fy * self.height)
    }

    /// Maps degrees to figure pixels for path drawing.
    pub fn transform(&self) -> Transform {
        let (sx, sy) = self.px_per_degree();
        Transform::from_row(
            sx,
            0.0,
            0.0,
            -sy,
            self.left - self.extent.west as f32 * sx,
            self.top + self.extent.north as f32 * sy,
        )
    }

    pub fn rect(&self) -> Option<Rect> {
        Rect::from_xywh(self.left, self.top, self.width, self.height)
    }

    pub fn clip_mask(&self, figure: &FigureConfig) -> Option<Mask> {
        let mut mask = Mask::new(figure.width_px, figure.height_px)?;
        let path = PathBuilder::from_rect(self.rect()?);
        mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
        Some(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_extent_gets_square_axes() {
        let figure = FigureConfig::default();
        let axes = Axes::layout(&figure, Extent::around(139.5, 35.5, 5.0));
        assert!((axes.width - axes.height).abs() < 1e-3);
        assert!((axes.width - 770.0).abs() < 1e-3);
        assert!((axes.left - 127.5).abs() < 1e-3);
        assert!((axes.top - 120.0).abs() < 1e-3);
    }

    #[test]
    fn corners_map_to_axes_edges() {
        let axes = Axes::layout(&FigureConfig::default(), Extent::new(0.0, 10.0, 0.0, 10.0));
        assert_eq!(axes.to_px(0.0, 10.0), (axes.left, axes.top));
        let (x, y) = axes.to_px(10.0, 0.0);
        assert!((x - axes.right()).abs() < 1e-3 && (y - axes.bottom()).abs() < 1e-3);

        let mut point = tiny_skia::Point::from_xy(5.0, 5.0);
        axes.transform().map_points(std::slice::from_mut(&mut point));
        let (cx, cy) = axes.to_px(5.0, 5.0);
        assert!((point.x - cx).abs() < 1e-3 && (point.y - cy).abs() < 1e-3);
    }

    #[test]
    fn wide_extent_is_letterboxed() {
        let axes = Axes::layout(&FigureConfig::default(), Extent::new(0.0, 20.0, 0.0, 5.0));
        assert!((axes.width - 775.0).abs() < 1e-3);
        assert!((axes.height - 775.0 / 4.0).abs() < 1e-3);
    }
}
