use crate::style::Rgb;
use rusttype::{point, Font, Scale};
use std::fs;
use std::path::{Path, PathBuf};
use tiny_skia::{ColorU8, Pixmap, PixmapPaint, Transform};
use tracing::{debug, warn};

const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/local/share/fonts/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    /// Baseline-independent: the bottom of the line box.
    Bottom,
}

pub struct TextRenderer {
    font: Font<'static>,
    source: PathBuf,
}

impl TextRenderer {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Font {} unreadable: {e}", path.display());
                return None;
            }
        };
        match Font::try_from_vec(bytes) {
            Some(font) => Some(Self {
                font,
                source: path.to_path_buf(),
            }),
            None => {
                warn!("Failed to parse font {}", path.display());
                None
            }
        }
    }

    /// Configured font first, then well-known system locations.
    pub fn load(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            if let Some(text) = Self::from_file(path) {
                return Some(text);
            }
            warn!("Configured font {} could not be loaded", path.display());
        }
        let found = FONT_SEARCH_PATHS.iter().find_map(|path| Self::from_file(path));
        if found.is_none() {
            warn!("No TrueType font found, text layers will be skipped");
        }
        found
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Width and line height in pixels.
    pub fn measure(&self, text: &str, size_px: f32) -> (f32, f32) {
        let scale = Scale::uniform(size_px);
        let v_metrics = self.font.v_metrics(scale);
        let width = self
            .font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        (width, v_metrics.ascent - v_metrics.descent)
    }

    /// Draw `text` anchored at figure pixel (x, y).
    pub fn draw(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        (x, y): (f32, f32),
        size_px: f32,
        color: Rgb,
        align: (HAlign, VAlign),
    ) {
        let (width, height) = self.measure(text, size_px);
        let left = match align.0 {
            HAlign::Left => x,
            HAlign::Center => x - width / 2.0,
            HAlign::Right => x - width,
        };
        let top = match align.1 {
            VAlign::Top => y,
            VAlign::Middle => y - height / 2.0,
            VAlign::Bottom => y - height,
        };

        if let Some(label) = self.rasterize(text, size_px, color) {
            pixmap.draw_pixmap(
                left.round() as i32,
                top.round() as i32,
                label.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
    }

    /// Glyph coverage as a tightly sized pixmap, origin at the line box top-left.
    fn rasterize(&self, text: &str, size_px: f32, color: Rgb) -> Option<Pixmap> {
        let scale = Scale::uniform(size_px);
        let ascent = self.font.v_metrics(scale).ascent;
        let (width, height) = self.measure(text, size_px);
        let (w, h) = (width.ceil() as u32 + 2, height.ceil() as u32 + 2);
        let mut label = Pixmap::new(w, h)?;
        let pixels = label.pixels_mut();

        for glyph in self.font.layout(text, scale, point(0.0, ascent)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px < 0 || py < 0 || px >= w as i32 || py >= h as i32 {
                    return;
                }
                let index = py as usize * w as usize + px as usize;
                let alpha = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                if alpha > pixels[index].alpha() {
                    pixels[index] = ColorU8::from_rgba(color.0, color.1, color.2, alpha).premultiply();
                }
            });
        }
        Some(label)
    }
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_is_none() {
        assert!(TextRenderer::from_file("/nonexistent/font.ttf").is_none());
        let not_a_font = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(not_a_font.path(), b"not a font").unwrap();
        assert!(TextRenderer::from_file(not_a_font.path()).is_none());
    }

    #[test]
    fn draws_when_a_system_font_exists() {
        // Font availability depends on the host
        let Some(text) = TextRenderer::load(None) else {
            return;
        };
        let (w, h) = text.measure("Magnitude: 3.2", 14.0);
        assert!(w > 0.0 && h > 0.0);

        let mut pixmap = Pixmap::new(200, 50).unwrap();
        text.draw(
            &mut pixmap,
            "Magnitude: 3.2",
            (10.0, 10.0),
            14.0,
            Rgb(0, 0, 0),
            (HAlign::Left, VAlign::Top),
        );
        assert!(pixmap.pixels().iter().any(|p| p.alpha() > 0));
    }
}
