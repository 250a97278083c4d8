use super::{AffineTransform, RasterError, RasterResource};
use std::fmt::Display;
use tracing::debug;

/// Geographic bounding box in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Extent {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            west,
            east,
            south,
            north,
        }
    }

    /// Square box of `half_width` degrees on each side of a point.
    pub fn around(longitude: f64, latitude: f64, half_width: f64) -> Self {
        Self::new(
            longitude - half_width,
            longitude + half_width,
            latitude - half_width,
            latitude + half_width,
        )
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn is_valid(&self) -> bool {
        [self.west, self.east, self.south, self.north]
            .iter()
            .all(|v| v.is_finite())
            && self.east > self.west
            && self.north > self.south
    }

    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }

    pub fn contains_extent(&self, other: &Extent) -> bool {
        self.west <= other.west
            && self.east >= other.east
            && self.south <= other.south
            && self.north >= other.north
    }

    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let extent = Extent::new(
            self.west.max(other.west),
            self.east.min(other.east),
            self.south.max(other.south),
            self.north.min(other.north),
        );
        extent.is_valid().then_some(extent)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.west, self.east, self.south, self.north]
    }
}

impl Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[W {:.4}, E {:.4}, S {:.4}, N {:.4}]",
            self.west, self.east, self.south, self.north
        )
    }
}

/// Integer pixel rectangle, never empty, always inside the raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: u32,
    pub row_off: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelWindow {
    /// Smallest window covering `extent`, snapped outward to whole pixels and
    /// clamped to a `dimensions` sized raster.
    pub fn covering(
        transform: &AffineTransform,
        dimensions: (u32, u32),
        extent: &Extent,
    ) -> Result<Self, RasterError> {
        if !extent.is_valid() {
            return Err(RasterError::InvalidExtent(*extent));
        }

        let (c0, r0) = transform.invert(extent.west, extent.north);
        let (c1, r1) = transform.invert(extent.east, extent.south);

        let col_min = c0.min(c1).floor().max(0.0);
        let col_max = c0.max(c1).ceil().min(dimensions.0 as f64);
        let row_min = r0.min(r1).floor().max(0.0);
        let row_max = r0.max(r1).ceil().min(dimensions.1 as f64);

        if !(col_max > col_min && row_max > row_min) {
            return Err(RasterError::OutsideCoverage(*extent));
        }

        Ok(Self {
            col_off: col_min as u32,
            row_off: row_min as u32,
            width: (col_max - col_min) as u32,
            height: (row_max - row_min) as u32,
        })
    }

    pub fn col_end(&self) -> u32 {
        self.col_off + self.width
    }

    pub fn row_end(&self) -> u32 {
        self.row_off + self.height
    }

    /// Geographic extent covered by this window's own pixels.
    pub fn extent(&self, transform: &AffineTransform) -> Extent {
        let window_transform = transform.offset(self.col_off, self.row_off);
        let (x0, y0) = window_transform.apply(0.0, 0.0);
        let (x1, y1) = window_transform.apply(self.width as f64, self.height as f64);
        Extent::new(x0.min(x1), x0.max(x1), y0.min(y1), y0.max(y1))
    }
}

/// Band-1 samples of a window as `f32`, row major, no-data as NaN.
#[derive(Clone, Debug)]
pub struct WindowPixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl WindowPixels {
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    /// Minimum and maximum of the finite samples, `None` if there are none.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Read the band-1 pixels covering `extent`, touching only the blocks that
/// intersect it. Returns the pixels and the exact extent they cover.
pub fn extract_window(
    raster: &RasterResource,
    extent: &Extent,
) -> Result<(WindowPixels, Extent), RasterError> {
    let layout = &raster.layout;
    let window = PixelWindow::covering(&raster.transform, layout.dimensions, extent)?;
    let window_extent = window.extent(&raster.transform);
    debug!("window {window:?} covers {window_extent} for requested {extent}");

    let fill = if raster.nodata.is_some() { f32::NAN } else { 0.0 };
    let mut data = vec![fill; window.width as usize * window.height as usize];

    let blocks = layout.blocks_within(
        (window.col_off, window.col_end()),
        (window.row_off, window.row_end()),
    );
    for (block_col, block_row) in blocks {
        let index = layout.block_index(block_col, block_row);
        let (start, end) = layout.block_byte_range(index)?;
        if start == end {
            // Sparse block, nothing stored
            continue;
        }
        let bytes = raster.source.read_range_to_vec(start, end)?;
        let block = layout.decode_block(index, block_row, &bytes)?;

        let block_x0 = block_col as u32 * layout.block_width;
        let block_y0 = block_row as u32 * layout.block_height;
        let block_rows = layout.block_rows(block_row);

        let x_start = window.col_off.max(block_x0);
        let x_end = window.col_end().min(block_x0 + layout.block_width);
        let y_start = window.row_off.max(block_y0);
        let y_end = window.row_end().min(block_y0 + block_rows);

        for y in y_start..y_end {
            let out_row = (y - window.row_off) as usize * window.width as usize;
            for x in x_start..x_end {
                let Some(value) =
                    layout.sample(&block, (x - block_x0) as usize, (y - block_y0) as usize)
                else {
                    continue;
                };
                data[out_row + (x - window.col_off) as usize] = raster.to_pixel_value(value);
            }
        }
    }

    Ok((
        WindowPixels {
            width: window.width,
            height: window.height,
            data,
        },
        window_extent,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_half_degree() -> AffineTransform {
        AffineTransform::north_up(-180.0, 90.0, 0.5, 0.5)
    }

    #[test]
    fn window_snaps_outward() {
        let t = global_half_degree();
        let extent = Extent::new(134.3, 144.7, 30.6, 40.4);
        let window = PixelWindow::covering(&t, (720, 360), &extent).unwrap();
        assert_eq!(window.col_off, 628);
        assert_eq!(window.col_end(), 650);
        assert_eq!(window.row_off, 99);
        assert_eq!(window.row_end(), 119);

        let covered = window.extent(&t);
        assert!(covered.contains_extent(&extent));
        assert_eq!(covered, Extent::new(134.0, 145.0, 30.5, 40.5));
    }

    #[test]
    fn window_clamps_to_raster() {
        let t = global_half_degree();
        let extent = Extent::around(178.0, 88.0, 5.0);
        let window = PixelWindow::covering(&t, (720, 360), &extent).unwrap();
        assert_eq!(window.col_end(), 720);
        assert_eq!(window.row_off, 0);
        let covered = window.extent(&t);
        assert_eq!(covered.east, 180.0);
        assert_eq!(covered.north, 90.0);
        assert!(covered.contains(178.0, 88.0));
    }

    #[test]
    fn extent_outside_raster_is_rejected() {
        let t = AffineTransform::north_up(0.0, 10.0, 1.0, 1.0);
        let extent = Extent::around(50.0, 50.0, 5.0);
        assert!(matches!(
            PixelWindow::covering(&t, (10, 10), &extent),
            Err(RasterError::OutsideCoverage(_))
        ));
    }

    #[test]
    fn degenerate_extent_is_rejected() {
        let t = global_half_degree();
        let extent = Extent::new(f64::NAN, 1.0, 0.0, 1.0);
        assert!(matches!(
            PixelWindow::covering(&t, (720, 360), &extent),
            Err(RasterError::InvalidExtent(_))
        ));
    }

    #[test]
    fn min_max_skips_nan() {
        let pixels = WindowPixels {
            width: 2,
            height: 2,
            data: vec![f32::NAN, 3.0, -1.0, 7.5],
        };
        assert_eq!(pixels.min_max(), Some((-1.0, 7.5)));
        assert_eq!(pixels.get(1, 1), Some(7.5));
        assert_eq!(pixels.get(2, 0), None);
    }
}
