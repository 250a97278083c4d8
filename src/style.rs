//! Magnitude dependent marker styling.

use std::fmt::Display;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(value: u32) -> Self {
        Self((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    pub fn to_color(self, alpha: f32) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.0, self.1, self.2, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MarkerShape {
    Circle,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct MarkerStyle {
    pub shape: MarkerShape,
    pub color: Rgb,
    /// Marker diameter in points.
    pub size: f64,
}

struct Band {
    lower: Option<f64>,
    upper: Option<f64>,
    color: Rgb,
    factor: f64,
}

impl Band {
    fn matches(&self, magnitude: f64) -> bool {
        self.lower.map_or(true, |lower| magnitude >= lower)
            && self.upper.map_or(true, |upper| magnitude < upper)
    }
}

// Half-open bands, first match wins. NaN matches none of them.
static BANDS: [Band; 6] = [
    Band {
        lower: None,
        upper: Some(3.0),
        color: Rgb::hex(0x2BFF00),
        factor: 2.5,
    },
    Band {
        lower: Some(3.0),
        upper: Some(4.0),
        color: Rgb::hex(0xFFFF00),
        factor: 3.0,
    },
    Band {
        lower: Some(4.0),
        upper: Some(5.0),
        color: Rgb::hex(0xFFA500),
        factor: 3.2,
    },
    Band {
        lower: Some(5.0),
        upper: Some(6.0),
        color: Rgb::hex(0xFF4500),
        factor: 3.4,
    },
    Band {
        lower: Some(6.0),
        upper: Some(7.0),
        color: Rgb::hex(0xC50000),
        factor: 3.4,
    },
    Band {
        lower: Some(7.0),
        upper: None,
        color: Rgb::hex(0x7000BB),
        factor: 3.4,
    },
];

pub const DEFAULT_STYLE: MarkerStyle = MarkerStyle {
    shape: MarkerShape::Circle,
    color: Rgb::hex(0xFF0000),
    size: 12.0,
};

pub fn select_style(magnitude: f64) -> MarkerStyle {
    BANDS
        .iter()
        .find(|band| band.matches(magnitude))
        .map(|band| MarkerStyle {
            shape: MarkerShape::Circle,
            color: band.color,
            size: magnitude * band.factor,
        })
        .unwrap_or(DEFAULT_STYLE)
}
