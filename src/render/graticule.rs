use crate::config::FigureConfig;
use crate::raster::Extent;
use crate::render::canvas::Axes;
use crate::render::text::{HAlign, TextRenderer, VAlign};
use crate::style::Rgb;
use tiny_skia::{Mask, Paint, PathBuilder, Pixmap, Stroke, Transform};

const LINE_COLOR: Rgb = Rgb::hex(0xB0B0B0);
const LABEL_COLOR: Rgb = Rgb(0, 0, 0);
const LINE_WIDTH_PT: f32 = 0.8;
const LABEL_SIZE_PT: f32 = 10.0;
const LABEL_PAD_PT: f32 = 3.5;
const TARGET_LINES: f64 = 5.0;

/// Step from the 1, 2, 2.5, 5 series giving about five lines over `span`.
pub fn nice_step(span: f64) -> f64 {
    if !(span.is_finite() && span > 0.0) {
        return 1.0;
    }
    let raw = span / TARGET_LINES;
    let magnitude = 10f64.powf(raw.log10().floor());
    [1.0, 2.0, 2.5, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|step| *step >= raw * (1.0 - 1e-9))
        .unwrap_or(10.0 * magnitude)
}

fn ticks(min: f64, max: f64, step: f64) -> Vec<f64> {
    let eps = step * 1e-9;
    let mut value = (min / step).ceil() * step;
    let mut ticks = vec![];
    while value <= max + eps {
        // Snap accumulated error so labels read 35 rather than 34.999999
        ticks.push((value / step).round() * step);
        value += step;
    }
    ticks
}

fn degrees(value: f64) -> String {
    let text = format!("{:.2}", value.abs());
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}°")
}

pub fn longitude_label(longitude: f64) -> String {
    let mut lon = longitude % 360.0;
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon <= -180.0 {
        lon += 360.0;
    }
    if lon.abs() < 1e-9 || (lon.abs() - 180.0).abs() < 1e-9 {
        degrees(lon)
    } else if lon > 0.0 {
        format!("{}E", degrees(lon))
    } else {
        format!("{}W", degrees(lon))
    }
}

pub fn latitude_label(latitude: f64) -> String {
    if latitude.abs() < 1e-9 {
        degrees(0.0)
    } else if latitude > 0.0 {
        format!("{}N", degrees(latitude))
    } else {
        format!("{}S", degrees(latitude))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Graticule {
    pub meridians: Vec<f64>,
    pub parallels: Vec<f64>,
}

impl Graticule {
    pub fn for_extent(extent: &Extent) -> Self {
        let step = nice_step(extent.width().max(extent.height()));
        Self {
            meridians: ticks(extent.west, extent.east, step),
            parallels: ticks(extent.south, extent.north, step),
        }
    }

    pub fn draw_lines(&self, pixmap: &mut Pixmap, axes: &Axes, figure: &FigureConfig, clip: Option<&Mask>) {
        let mut pb = PathBuilder::new();
        for &lon in &self.meridians {
            let (x, top) = axes.to_px(lon, axes.extent.north);
            let (_, bottom) = axes.to_px(lon, axes.extent.south);
            pb.move_to(x, top);
            pb.line_to(x, bottom);
        }
        for &lat in &self.parallels {
            let (left, y) = axes.to_px(axes.extent.west, lat);
            let (right, _) = axes.to_px(axes.extent.east, lat);
            pb.move_to(left, y);
            pb.line_to(right, y);
        }
        let Some(path) = pb.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(LINE_COLOR.to_color(1.0));
        paint.anti_alias = true;
        let stroke = Stroke {
            width: figure.pt(LINE_WIDTH_PT),
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), clip);
    }

    /// Latitude labels left of the axes, longitude labels below.
    pub fn draw_labels(&self, pixmap: &mut Pixmap, axes: &Axes, figure: &FigureConfig, text: &TextRenderer) {
        let size = figure.pt(LABEL_SIZE_PT);
        let pad = figure.pt(LABEL_PAD_PT);
        for &lat in &self.parallels {
            let (_, y) = axes.to_px(axes.extent.west, lat);
            text.draw(
                pixmap,
                &latitude_label(lat),
                (axes.left - pad, y),
                size,
                LABEL_COLOR,
                (HAlign::Right, VAlign::Middle),
            );
        }
        for &lon in &self.meridians {
            let (x, _) = axes.to_px(lon, axes.extent.south);
            text.draw(
                pixmap,
                &longitude_label(lon),
                (x, axes.bottom() + pad),
                size,
                LABEL_COLOR,
                (HAlign::Center, VAlign::Top),
            );
        }
    }
}
