//! Map compositor: draws the figure for one event and writes it out.

use crate::config::FigureConfig;
use crate::error::RenderError;
use crate::event::EarthquakeEvent;
use crate::raster::{Extent, WindowPixels};
use crate::style::{select_style, MarkerStyle, Rgb};
use std::path::Path;
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};
use tracing::debug;

pub mod basemap;
pub mod canvas;
pub mod graticule;
pub mod output;
pub mod text;

use basemap::Basemap;
use canvas::Axes;
use graticule::Graticule;
use text::{HAlign, TextRenderer, VAlign};

const RASTER_OPACITY: f32 = 0.5;
const MARKER_OPACITY: f32 = 0.8;
const MARKER_EDGE: Rgb = Rgb::hex(0x747474);
const MARKER_EDGE_PT: f32 = 1.0;
const FRAME_PT: f32 = 0.8;

const LEGEND_FONT_PT: f32 = 10.0;
const LEGEND_EDGE: Rgb = Rgb::hex(0xCCCCCC);
const LEGEND_OPACITY: f32 = 0.8;
// Legend spacing in units of the legend font size
const LEGEND_BORDER_PAD: f32 = 0.4;
const LEGEND_AXES_PAD: f32 = 0.5;
const LEGEND_HANDLE_LENGTH: f32 = 2.0;
const LEGEND_HANDLE_PAD: f32 = 0.8;

const TITLE_PT: f32 = 14.4;
const TITLE_PAD_PT: f32 = 6.0;
const CAPTION_PT: f32 = 8.0;
const CAPTION_COLOR: Rgb = Rgb::hex(0x808080);

/// Float formatting that always shows a decimal, `3.0` rather than `3`.
pub fn format_magnitude(magnitude: f64) -> String {
    if magnitude.is_nan() {
        "nan".to_string()
    } else if magnitude == f64::INFINITY {
        "inf".to_string()
    } else if magnitude == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if magnitude.fract() == 0.0 && magnitude.abs() < 1e16 {
        format!("{magnitude:.1}")
    } else {
        format!("{magnitude}")
    }
}

/// Everything needed to draw a figure that does not change between requests.
#[derive(Debug)]
pub struct MapRenderer {
    figure: FigureConfig,
    basemap: Basemap,
    text: Option<TextRenderer>,
}

impl MapRenderer {
    pub fn new(figure: FigureConfig, basemap: Basemap, text: Option<TextRenderer>) -> Self {
        Self {
            figure,
            basemap,
            text,
        }
    }

    pub fn figure(&self) -> &FigureConfig {
        &self.figure
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// Draw and write the figure for `event` to `target`.
    pub fn render(
        &self,
        event: &EarthquakeEvent,
        pixels: &WindowPixels,
        window_extent: &Extent,
        target: &Path,
    ) -> Result<(), RenderError> {
        // Reject unknown extensions before drawing anything
        let format = output::format_for(target)?;
        let pixmap = self.compose(event, pixels, window_extent)?;
        let bytes = output::encode(&pixmap, format, target)?;
        output::write_atomically(target, &bytes)
    }

    pub fn compose(
        &self,
        event: &EarthquakeEvent,
        pixels: &WindowPixels,
        window_extent: &Extent,
    ) -> Result<Pixmap, RenderError> {
        let figure = &self.figure;
        let mut pixmap = Pixmap::new(figure.width_px, figure.height_px).ok_or_else(|| {
            RenderError::Canvas(format!(
                "invalid figure size {}x{}",
                figure.width_px, figure.height_px
            ))
        })?;
        pixmap.fill(Color::WHITE);

        let axes = Axes::layout(figure, event.extent(figure.half_extent));
        let clip = axes
            .clip_mask(figure)
            .ok_or_else(|| RenderError::Canvas(format!("degenerate map axes {}", axes.extent)))?;
        debug!("Composing {event} on axes {axes:?}");

        self.basemap.draw(&mut pixmap, &axes, figure, Some(&clip));

        let graticule = Graticule::for_extent(&axes.extent);
        graticule.draw_lines(&mut pixmap, &axes, figure, Some(&clip));
        if let Some(text) = &self.text {
            graticule.draw_labels(&mut pixmap, &axes, figure, text);
        }

        draw_raster(&mut pixmap, &axes, pixels, window_extent, &clip);

        let style = select_style(event.magnitude);
        let (x, y) = axes.to_px(event.longitude, event.latitude);
        draw_marker(&mut pixmap, (x, y), &style, figure, Some(&clip));

        draw_frame(&mut pixmap, &axes, figure);

        if let Some(text) = &self.text {
            self.draw_legend(&mut pixmap, &axes, &style, event.magnitude, text);
            text.draw(
                &mut pixmap,
                &event.title(),
                (axes.left + axes.width / 2.0, axes.top - figure.pt(TITLE_PAD_PT)),
                figure.pt(TITLE_PT),
                Rgb(0, 0, 0),
                (HAlign::Center, VAlign::Bottom),
            );
            let caption = format!(
                "Rendered at {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            text.draw(
                &mut pixmap,
                &caption,
                axes.fraction_to_px(0.5, 0.01),
                figure.pt(CAPTION_PT),
                CAPTION_COLOR,
                (HAlign::Center, VAlign::Bottom),
            );
        }

        Ok(pixmap)
    }

    /// Single entry in the upper right: a line handle with the marker, then the label.
    fn draw_legend(
        &self,
        pixmap: &mut Pixmap,
        axes: &Axes,
        style: &MarkerStyle,
        magnitude: f64,
        text: &TextRenderer,
    ) {
        let figure = &self.figure;
        let em = figure.pt(LEGEND_FONT_PT);
        let label = format!("Magnitude: {}", format_magnitude(magnitude));
        let (label_w, label_h) = text.measure(&label, em);
        let marker_d = figure.pt(style.size.abs() as f32);

        let pad = LEGEND_BORDER_PAD * em;
        let handle_w = LEGEND_HANDLE_LENGTH * em;
        let row_h = label_h.max(marker_d);
        let box_w = pad + handle_w + LEGEND_HANDLE_PAD * em + label_w + pad;
        let box_h = pad + row_h + pad;
        let right = axes.right() - LEGEND_AXES_PAD * em;
        let top = axes.top + LEGEND_AXES_PAD * em;
        let left = right - box_w;

        if let Some(rect) = Rect::from_xywh(left, top, box_w, box_h) {
            let path = PathBuilder::from_rect(rect);
            let mut fill = Paint::default();
            fill.set_color(Rgb(255, 255, 255).to_color(LEGEND_OPACITY));
            pixmap.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);
            let mut edge = Paint::default();
            edge.set_color(LEGEND_EDGE.to_color(LEGEND_OPACITY));
            edge.anti_alias = true;
            let stroke = Stroke {
                width: figure.pt(FRAME_PT),
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &edge, &stroke, Transform::identity(), None);
        }

        let middle = top + box_h / 2.0;
        let handle_left = left + pad;
        let mut pb = PathBuilder::new();
        pb.move_to(handle_left, middle);
        pb.line_to(handle_left + handle_w, middle);
        if let Some(line) = pb.finish() {
            let mut paint = Paint::default();
            paint.set_color(style.color.to_color(MARKER_OPACITY));
            paint.anti_alias = true;
            let stroke = Stroke {
                width: figure.pt(1.5),
                ..Stroke::default()
            };
            pixmap.stroke_path(&line, &paint, &stroke, Transform::identity(), None);
        }
        draw_marker(pixmap, (handle_left + handle_w / 2.0, middle), style, figure, None);

        text.draw(
            pixmap,
            &label,
            (handle_left + handle_w + LEGEND_HANDLE_PAD * em, middle),
            em,
            Rgb(0, 0, 0),
            (HAlign::Left, VAlign::Middle),
        );
    }
}

/// Min/max stretched grayscale, no-data transparent.
pub fn grayscale(pixels: &WindowPixels) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(pixels.width, pixels.height)?;
    let (lo, hi) = pixels.min_max().unwrap_or((0.0, 0.0));
    let range = hi - lo;
    for (dst, &value) in pixmap.pixels_mut().iter_mut().zip(&pixels.data) {
        if !value.is_finite() {
            continue;
        }
        let level = if range > 0.0 {
            ((value - lo) / range * 255.0).round().clamp(0.0, 255.0) as u8
        } else {
            0
        };
        *dst = ColorU8::from_rgba(level, level, level, 255).premultiply();
    }
    Some(pixmap)
}

fn draw_raster(
    pixmap: &mut Pixmap,
    axes: &Axes,
    pixels: &WindowPixels,
    window_extent: &Extent,
    clip: &Mask,
) {
    let Some(gray) = grayscale(pixels) else {
        return;
    };
    let (px_x, px_y) = axes.px_per_degree();
    let scale_x = px_x * (window_extent.width() / pixels.width as f64) as f32;
    let scale_y = px_y * (window_extent.height() / pixels.height as f64) as f32;
    let (tx, ty) = axes.to_px(window_extent.west, window_extent.north);
    let paint = PixmapPaint {
        opacity: RASTER_OPACITY,
        quality: FilterQuality::Nearest,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(
        0,
        0,
        gray.as_ref(),
        &paint,
        Transform::from_row(scale_x, 0.0, 0.0, scale_y, tx, ty),
        Some(clip),
    );
}

fn draw_marker(
    pixmap: &mut Pixmap,
    (x, y): (f32, f32),
    style: &MarkerStyle,
    figure: &FigureConfig,
    clip: Option<&Mask>,
) {
    let radius = figure.pt(style.size as f32) / 2.0;
    if !(radius > 0.0 && radius.is_finite()) {
        return;
    }
    let Some(circle) = PathBuilder::from_circle(x, y, radius) else {
        return;
    };
    let mut fill = Paint::default();
    fill.set_color(style.color.to_color(MARKER_OPACITY));
    fill.anti_alias = true;
    pixmap.fill_path(&circle, &fill, FillRule::Winding, Transform::identity(), clip);

    let mut edge = Paint::default();
    edge.set_color(MARKER_EDGE.to_color(MARKER_OPACITY));
    edge.anti_alias = true;
    let stroke = Stroke {
        width: figure.pt(MARKER_EDGE_PT),
        ..Stroke::default()
    };
    pixmap.stroke_path(&circle, &edge, &stroke, Transform::identity(), clip);
}

fn draw_frame(pixmap: &mut Pixmap, axes: &Axes, figure: &FigureConfig) {
    let Some(rect) = axes.rect() else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(Color::BLACK);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: figure.pt(FRAME_PT),
        ..Stroke::default()
    };
    pixmap.stroke_path(&PathBuilder::from_rect(rect), &paint, &stroke, Transform::identity(), None);
}
