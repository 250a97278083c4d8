//! Reference vector layers read from GeoJSON once at startup.

use crate::config::FigureConfig;
use crate::raster::Extent;
use crate::render::canvas::Axes;
use crate::style::Rgb;
use geojson::{GeoJson, Position, Value};
use std::fs;
use std::path::Path;
use tiny_skia::{
    FillRule, Mask, Paint, Path as SkPath, PathBuilder, Pixmap, Stroke, StrokeDash, Transform,
};
use tracing::{debug, info, warn};

const WATER: Rgb = Rgb(152, 183, 226);
const LAND: Rgb = Rgb(240, 240, 220);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Land,
    Ocean,
    Coastline,
    Borders,
    Lakes,
    Rivers,
}

impl LayerKind {
    /// Draw order, bottom first.
    pub const ALL: [LayerKind; 6] = [
        LayerKind::Land,
        LayerKind::Ocean,
        LayerKind::Coastline,
        LayerKind::Borders,
        LayerKind::Lakes,
        LayerKind::Rivers,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            LayerKind::Land => "land.geojson",
            LayerKind::Ocean => "ocean.geojson",
            LayerKind::Coastline => "coastline.geojson",
            LayerKind::Borders => "borders.geojson",
            LayerKind::Lakes => "lakes.geojson",
            LayerKind::Rivers => "rivers.geojson",
        }
    }

    fn fill(self) -> Option<(Rgb, f32)> {
        match self {
            LayerKind::Land => Some((LAND, 1.0)),
            LayerKind::Ocean => Some((WATER, 1.0)),
            LayerKind::Lakes => Some((WATER, 0.5)),
            _ => None,
        }
    }

    /// Edge color, opacity and width in points.
    fn edge(self) -> Option<(Rgb, f32, f32)> {
        match self {
            LayerKind::Coastline | LayerKind::Borders => Some((Rgb(0, 0, 0), 1.0, 1.0)),
            LayerKind::Lakes => Some((WATER, 0.5, 1.0)),
            LayerKind::Rivers => Some((WATER, 1.0, 1.0)),
            _ => None,
        }
    }

    fn dotted(self) -> bool {
        self == LayerKind::Borders
    }
}

/// One geometry flattened to rings or polylines in lon/lat degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub parts: Vec<Vec<(f64, f64)>>,
    pub closed: bool,
    pub bounds: Extent,
}

impl Shape {
    fn new(parts: Vec<Vec<(f64, f64)>>, closed: bool) -> Option<Self> {
        let mut bounds = Extent::new(f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for &(lon, lat) in parts.iter().flatten() {
            bounds.west = bounds.west.min(lon);
            bounds.east = bounds.east.max(lon);
            bounds.south = bounds.south.min(lat);
            bounds.north = bounds.north.max(lat);
        }
        if bounds.west > bounds.east {
            return None;
        }
        Some(Self {
            parts,
            closed,
            bounds,
        })
    }

    fn overlaps(&self, extent: &Extent) -> bool {
        self.bounds.west <= extent.east
            && self.bounds.east >= extent.west
            && self.bounds.south <= extent.north
            && self.bounds.north >= extent.south
    }

    /// Path in degree coordinates.
    fn to_path(&self) -> Option<SkPath> {
        let mut pb = PathBuilder::new();
        for part in &self.parts {
            let mut points = part.iter();
            let Some(&(x, y)) = points.next() else {
                continue;
            };
            pb.move_to(x as f32, y as f32);
            for &(x, y) in points {
                pb.line_to(x as f32, y as f32);
            }
            if self.closed {
                pb.close();
            }
        }
        pb.finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub shapes: Vec<Shape>,
}

impl Layer {
    pub fn from_geojson(kind: LayerKind, text: &str) -> Result<Self, geojson::Error> {
        let mut shapes = vec![];
        match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => {
                for geometry in collection.features.into_iter().filter_map(|f| f.geometry) {
                    collect_shapes(geometry.value, &mut shapes);
                }
            }
            GeoJson::Feature(feature) => {
                if let Some(geometry) = feature.geometry {
                    collect_shapes(geometry.value, &mut shapes);
                }
            }
            GeoJson::Geometry(geometry) => collect_shapes(geometry.value, &mut shapes),
        }
        Ok(Self { kind, shapes })
    }

    fn draw(&self, pixmap: &mut Pixmap, axes: &Axes, figure: &FigureConfig, clip: Option<&Mask>) {
        let transform = axes.transform();
        let fill = self.kind.fill().map(|(color, alpha)| paint(color, alpha));
        let edge = self.kind.edge().map(|(color, alpha, width)| {
            let mut stroke = Stroke {
                width: figure.pt(width),
                ..Stroke::default()
            };
            if self.kind.dotted() {
                // Dots scaled by line width
                let on = stroke.width;
                stroke.dash = StrokeDash::new(vec![on, on * 1.65], 0.0);
            }
            (paint(color, alpha), stroke)
        });

        for shape in self.shapes.iter().filter(|s| s.overlaps(&axes.extent)) {
            let Some(path) = shape.to_path() else {
                continue;
            };
            if let (Some(fill), true) = (&fill, shape.closed) {
                pixmap.fill_path(&path, fill, FillRule::EvenOdd, transform, clip);
            }
            if let Some((edge_paint, stroke)) = &edge {
                // Stroke in pixel space so widths are not scaled by the map transform
                if let Some(path) = path.transform(transform) {
                    pixmap.stroke_path(&path, edge_paint, stroke, Transform::identity(), clip);
                }
            }
        }
    }
}

fn paint(color: Rgb, alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_color(alpha));
    paint.anti_alias = true;
    paint
}

/// Feature layers present in the configured directory, in draw order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Basemap {
    layers: Vec<Layer>,
}

impl Basemap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Missing files are skipped, unparsable files are skipped with a warning.
    pub fn load<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let mut layers = vec![];
        for kind in LayerKind::ALL {
            let path = dir.join(kind.file_name());
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping layer {}: {e}", path.display());
                    continue;
                }
            };
            match Layer::from_geojson(kind, &text) {
                Ok(layer) => {
                    info!("Loaded {} shapes from {}", layer.shapes.len(), path.display());
                    layers.push(layer);
                }
                Err(e) => warn!("Failed to parse {}: {e}", path.display()),
            }
        }
        Self { layers }
    }

    /// Layers from the configured directory, if any. Warns once when nothing was loaded.
    pub fn load_configured(dir: Option<&Path>) -> Self {
        let basemap = dir.map(Self::load).unwrap_or_default();
        if basemap.is_empty() {
            match dir {
                Some(dir) => warn!(
                    "No feature layers found in {}, maps will lack land and coastlines",
                    dir.display()
                ),
                None => warn!("No features directory configured, maps will lack land and coastlines"),
            }
        }
        basemap
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn draw(&self, pixmap: &mut Pixmap, axes: &Axes, figure: &FigureConfig, clip: Option<&Mask>) {
        for layer in &self.layers {
            layer.draw(pixmap, axes, figure, clip);
        }
    }
}

fn to_points(line: Vec<Position>) -> Vec<(f64, f64)> {
    line.into_iter()
        .filter_map(|p| match p.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        })
        .collect()
}

fn push_shape(shapes: &mut Vec<Shape>, parts: Vec<Vec<Position>>, closed: bool) {
    let parts = parts.into_iter().map(to_points).collect();
    if let Some(shape) = Shape::new(parts, closed) {
        shapes.push(shape);
    }
}

fn collect_shapes(value: Value, shapes: &mut Vec<Shape>) {
    match value {
        // Points carry no area or outline
        Value::Point(_) | Value::MultiPoint(_) => {}
        Value::LineString(line) => push_shape(shapes, vec![line], false),
        Value::MultiLineString(lines) => push_shape(shapes, lines, false),
        Value::Polygon(rings) => push_shape(shapes, rings, true),
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                push_shape(shapes, rings, true);
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_shapes(geometry.value, shapes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COASTLINE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "a"},
             "geometry": {"type": "LineString", "coordinates": [[135.0, 31.0], [140.0, 36.0, 12.0]]}},
            {"type": "Feature", "properties": {}, "geometry": null},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                [[[2, 2], [3, 2], [3, 3], [2, 2]], [[2.2, 2.2], [2.8, 2.2], [2.8, 2.8], [2.2, 2.2]]]
             ]}}
        ]
    }"#;

    #[test]
    fn reads_feature_collection() {
        let layer = Layer::from_geojson(LayerKind::Coastline, COASTLINE).unwrap();
        assert_eq!(layer.shapes.len(), 3);
        assert!(!layer.shapes[0].closed);
        assert_eq!(layer.shapes[0].parts[0], vec![(135.0, 31.0), (140.0, 36.0)]);
        assert_eq!(layer.shapes[0].bounds, Extent::new(135.0, 140.0, 31.0, 36.0));
        assert!(layer.shapes[2].closed);
        assert_eq!(layer.shapes[2].parts.len(), 2);
    }

    #[test]
    fn reads_bare_geometry() {
        let layer = Layer::from_geojson(
            LayerKind::Land,
            r#"{"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 0]]]}"#,
        )
        .unwrap();
        assert_eq!(layer.shapes.len(), 1);
        assert!(Layer::from_geojson(LayerKind::Land, r#"{"type": "Circle"}"#).is_err());
    }

    #[test]
    fn points_are_dropped_and_collections_flattened() {
        let layer = Layer::from_geojson(
            LayerKind::Rivers,
            r#"{"type": "GeometryCollection", "geometries": [
                {"type": "Point", "coordinates": [139.0, 35.0]},
                {"type": "MultiPoint", "coordinates": [[139.0, 35.0], [140.0, 36.0]]},
                {"type": "MultiLineString", "coordinates": [[[139, 35], [140, 36]], [[141, 37], [142, 38]]]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(layer.shapes.len(), 1);
        assert_eq!(layer.shapes[0].parts.len(), 2);
        assert_eq!(layer.shapes[0].bounds, Extent::new(139.0, 142.0, 35.0, 38.0));
    }

    #[test]
    fn culls_shapes_outside_view() {
        let layer = Layer::from_geojson(LayerKind::Coastline, COASTLINE).unwrap();
        let view = Extent::around(139.5, 35.5, 5.0);
        let visible: Vec<_> = layer.shapes.iter().filter(|s| s.overlaps(&view)).collect();
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn loads_present_layers_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coastline.geojson"), COASTLINE).unwrap();
        std::fs::write(dir.path().join("rivers.geojson"), "not json").unwrap();
        let basemap = Basemap::load(dir.path());
        assert_eq!(basemap.layers().len(), 1);
        assert_eq!(basemap.layers()[0].kind, LayerKind::Coastline);
    }

    #[test]
    fn configured_directory_is_optional() {
        assert!(Basemap::load_configured(None).is_empty());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("land.geojson"), "{}").unwrap();
        assert!(Basemap::load_configured(Some(dir.path())).is_empty());

        std::fs::write(dir.path().join("coastline.geojson"), COASTLINE).unwrap();
        let basemap = Basemap::load_configured(Some(dir.path()));
        assert_eq!(basemap.layers().len(), 1);
    }

    #[test]
    fn land_fill_is_drawn_inside_axes() {
        let figure = FigureConfig {
            width_px: 200,
            height_px: 200,
            ..FigureConfig::default()
        };
        let extent = Extent::new(0.0, 10.0, 0.0, 10.0);
        let axes = Axes::layout(&figure, extent);
        let layer = Layer::from_geojson(
            LayerKind::Land,
            r#"{"type": "Polygon", "coordinates": [[[-20, -20], [20, -20], [20, 20], [-20, 20], [-20, -20]]]}"#,
        )
        .unwrap();
        let basemap = Basemap { layers: vec![layer] };
        let mut pixmap = Pixmap::new(200, 200).unwrap();
        let clip = axes.clip_mask(&figure);
        basemap.draw(&mut pixmap, &axes, &figure, clip.as_ref());

        let (cx, cy) = axes.to_px(5.0, 5.0);
        let center = pixmap.pixel(cx as u32, cy as u32).unwrap();
        assert_eq!((center.red(), center.green(), center.blue()), (LAND.0, LAND.1, LAND.2));
        // Clipped outside the axes
        assert_eq!(pixmap.pixel(1, 1).unwrap().alpha(), 0);
    }
}
