// https://docs.ogc.org/is/19-008r4/19-008r4.html#_raster_to_model_coordinate_transformation_requirements

use super::RasterError;
use crate::geotags::{
    GeoKeyId, GeoModel, GeoTags, ANGULAR_UNIT_DEGREE, ANGULAR_UNIT_RADIAN, MODEL_TYPE_GEOCENTRIC,
    MODEL_TYPE_GEOGRAPHIC, MODEL_TYPE_PROJECTED, RASTER_PIXEL_IS_POINT, USER_DEFINED,
};
use proj4rs::proj::Proj;
use std::fmt::Display;
use tracing::{debug, warn};

/// Pixel to model mapping for north-up rasters:
///
/// ```text
/// x = c + a * col + b * row
/// y = f + d * col + e * row
/// ```
///
/// with `(col, row)` addressing pixel corners. Only `b == d == 0` is supported.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            a: pixel_width,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -pixel_height,
            f: origin_y,
        }
    }

    /// Build the transform from the GeoTIFF model tags, refusing anything that
    /// is not an axis-aligned geographic grid. Coordinates come out in degrees.
    pub fn from_geo_tags(geo: &GeoTags) -> Result<Self, RasterError> {
        let unit_gain = check_geographic(geo)?;

        let mut transform = match &geo.model {
            GeoModel::Scaled {
                tiepoint,
                pixel_scale,
            } => {
                let [i, j, _, x, y, _] = *tiepoint;
                let [sx, sy, _] = *pixel_scale;
                Self {
                    a: sx,
                    b: 0.0,
                    c: x - i * sx,
                    d: 0.0,
                    e: -sy,
                    f: y + j * sy,
                }
            }
            GeoModel::Transformed { transformation: t } => Self {
                a: t[0],
                b: t[1],
                c: t[3],
                d: t[4],
                e: t[5],
                f: t[7],
            },
        };

        if transform.b != 0.0 || transform.d != 0.0 {
            return Err(RasterError::NotSupported(format!(
                "rotated or sheared raster transform (b={}, d={})",
                transform.b, transform.d
            )));
        }
        let values = [transform.a, transform.c, transform.e, transform.f];
        if values.iter().any(|v| !v.is_finite()) || !transform.a.is_normal() || !transform.e.is_normal() {
            return Err(RasterError::BadTransform(transform));
        }

        if geo.key_short(GeoKeyId::GTRasterTypeGeoKey) == Some(RASTER_PIXEL_IS_POINT) {
            // Tiepoints refer to pixel centers
            debug!("PixelIsPoint raster, shifting origin by half a pixel");
            transform.c -= 0.5 * transform.a;
            transform.f -= 0.5 * transform.e;
        }

        if unit_gain != 1.0 {
            transform.a *= unit_gain;
            transform.c *= unit_gain;
            transform.e *= unit_gain;
            transform.f *= unit_gain;
        }

        Ok(transform)
    }

    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.c + self.a * col + self.b * row,
            self.f + self.d * col + self.e * row,
        )
    }

    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.c) / self.a, (y - self.f) / self.e)
    }

    /// Transform of a sub-window starting at `(col_off, row_off)`.
    pub fn offset(&self, col_off: u32, row_off: u32) -> Self {
        let (c, f) = self.apply(col_off as f64, row_off as f64);
        Self { c, f, ..*self }
    }
}

impl Display for AffineTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}, {}, {}]",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// Verify the GeoKeys describe longitude/latitude coordinates. Returns the
/// factor that converts model units into degrees.
pub fn check_geographic(geo: &GeoTags) -> Result<f64, RasterError> {
    let Some(directory) = &geo.directory else {
        warn!("raster has no GeoKeyDirectory, assuming geographic coordinates");
        return Ok(1.0);
    };

    match directory.get_short(GeoKeyId::GTModelTypeGeoKey) {
        Some(MODEL_TYPE_GEOGRAPHIC) => {}
        Some(MODEL_TYPE_PROJECTED) => {
            return Err(RasterError::NotGeographic("projected model type".into()))
        }
        Some(MODEL_TYPE_GEOCENTRIC) => {
            return Err(RasterError::NotGeographic("geocentric model type".into()))
        }
        Some(other) => warn!("unknown GTModelTypeGeoKey {other}, assuming geographic"),
        None => debug!("no GTModelTypeGeoKey"),
    }

    if let Some(code) = directory.get_short(GeoKeyId::ProjectedCSTypeGeoKey) {
        if code != USER_DEFINED {
            return Err(RasterError::NotGeographic(format!(
                "projected coordinate system EPSG:{code}"
            )));
        }
    }

    match directory.get_short(GeoKeyId::GeographicTypeGeoKey) {
        Some(USER_DEFINED) | None => {}
        Some(code) => match Proj::from_epsg_code(code) {
            Ok(proj) if proj.is_latlong() => debug!("geographic CRS EPSG:{code}"),
            Ok(_) => {
                return Err(RasterError::NotGeographic(format!(
                    "EPSG:{code} is not a longitude/latitude system"
                )))
            }
            Err(e) => warn!("EPSG:{code} unknown to proj4rs ({e:?}), trusting model type"),
        },
    }

    let gain = match directory.get_short(GeoKeyId::GeogAngularUnitsGeoKey) {
        None | Some(ANGULAR_UNIT_DEGREE) => 1.0,
        Some(ANGULAR_UNIT_RADIAN) => 1_f64.to_degrees(),
        Some(unit) => match directory
            .get(GeoKeyId::GeogAngularUnitSizeGeoKey)
            .and_then(|v| v.as_number::<f64>())
        {
            // Unit size is expressed in radians
            Some(radians) if radians.is_normal() => radians.to_degrees(),
            _ => {
                warn!("unrecognized angular unit {unit}, assuming degrees");
                1.0
            }
        },
    };

    Ok(gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotags::GeoKeyValue;

    fn wgs84(tags: &mut GeoTags) {
        tags.set_key(GeoKeyId::GTModelTypeGeoKey, GeoKeyValue::Short(vec![2]));
        tags.set_key(GeoKeyId::GeographicTypeGeoKey, GeoKeyValue::Short(vec![4326]));
    }

    #[test]
    fn tiepoint_and_scale_give_north_up_transform() {
        let mut tags =
            GeoTags::from_tiepoint_and_scale([0.0, 0.0, 0.0, -180.0, 90.0, 0.0], [0.5, 0.25, 0.0]);
        wgs84(&mut tags);
        let t = AffineTransform::from_geo_tags(&tags).unwrap();
        assert_eq!(t, AffineTransform::north_up(-180.0, 90.0, 0.5, 0.25));
        assert_eq!(t.apply(2.0, 4.0), (-179.0, 89.0));
        assert_eq!(t.invert(-179.0, 89.0), (2.0, 4.0));
    }

    #[test]
    fn tiepoint_at_non_zero_pixel() {
        let tags =
            GeoTags::from_tiepoint_and_scale([10.0, 20.0, 0.0, 100.0, 40.0, 0.0], [1.0, 1.0, 0.0]);
        let t = AffineTransform::from_geo_tags(&tags).unwrap();
        assert_eq!((t.c, t.f), (90.0, 60.0));
    }

    #[test]
    fn pixel_is_point_shifts_half_pixel() {
        let mut tags =
            GeoTags::from_tiepoint_and_scale([0.0, 0.0, 0.0, -180.0, 90.0, 0.0], [1.0, 1.0, 0.0]);
        wgs84(&mut tags);
        tags.set_key(GeoKeyId::GTRasterTypeGeoKey, GeoKeyValue::Short(vec![2]));
        let t = AffineTransform::from_geo_tags(&tags).unwrap();
        assert_eq!((t.c, t.f), (-180.5, 90.5));
    }

    #[test]
    fn rotated_transformation_is_rejected() {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[1] = 0.1;
        m[5] = -1.0;
        let tags = GeoTags::from_transformation(m);
        assert!(matches!(
            AffineTransform::from_geo_tags(&tags),
            Err(RasterError::NotSupported(_))
        ));
    }

    #[test]
    fn projected_model_is_rejected() {
        let mut tags =
            GeoTags::from_tiepoint_and_scale([0.0, 0.0, 0.0, 500000.0, 0.0, 0.0], [30.0, 30.0, 0.0]);
        tags.set_key(GeoKeyId::GTModelTypeGeoKey, GeoKeyValue::Short(vec![1]));
        tags.set_key(GeoKeyId::ProjectedCSTypeGeoKey, GeoKeyValue::Short(vec![32654]));
        assert!(matches!(
            AffineTransform::from_geo_tags(&tags),
            Err(RasterError::NotGeographic(_))
        ));
    }

    #[test]
    fn radians_are_converted_to_degrees() {
        let mut tags = GeoTags::from_tiepoint_and_scale(
            [0.0, 0.0, 0.0, -std::f64::consts::PI, std::f64::consts::FRAC_PI_2, 0.0],
            [0.01, 0.01, 0.0],
        );
        wgs84(&mut tags);
        tags.set_key(GeoKeyId::GeogAngularUnitsGeoKey, GeoKeyValue::Short(vec![9101]));
        let t = AffineTransform::from_geo_tags(&tags).unwrap();
        assert!((t.c + 180.0).abs() < 1e-9);
        assert!((t.f - 90.0).abs() < 1e-9);
    }

    #[test]
    fn window_offset_moves_origin() {
        let t = AffineTransform::north_up(-180.0, 90.0, 0.5, 0.5);
        let w = t.offset(10, 20);
        assert_eq!((w.c, w.f), (-175.0, 80.0));
        assert_eq!(w.a, t.a);
    }
}
