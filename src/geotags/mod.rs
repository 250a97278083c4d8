// https://docs.ogc.org/is/19-008r4/19-008r4.html#_geotiff_tags_for_coordinate_transformations

use crate::tiff::{Endian, Ifd, TagData, TagId};
use std::fmt::Display;

mod error;
mod id;
mod keys;
mod value;

pub use error::GeoTiffError;
pub use id::*;
pub use keys::{GeoKey, GeoKeyDirectory};
pub use value::GeoKeyValue;

#[derive(Clone, Debug)]
pub struct GeoTags {
    pub model: GeoModel,
    /// `None` when the file carries no GeoKeyDirectory at all.
    pub directory: Option<GeoKeyDirectory>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeoModel {
    Transformed {
        transformation: [f64; 16],
    },
    Scaled {
        tiepoint: [f64; 6],
        pixel_scale: [f64; 3],
    },
}

impl Display for GeoTags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "GeoTIFF Tags:")?;
        match &self.model {
            GeoModel::Transformed { transformation } => {
                writeln!(f, "  Transformation: {transformation:?}")?;
            }
            GeoModel::Scaled {
                tiepoint,
                pixel_scale,
            } => {
                writeln!(f, "  Tiepoint: {tiepoint:?}")?;
                writeln!(f, "  Pixel Scale: {pixel_scale:?}")?;
            }
        }
        match &self.directory {
            None => write!(f, "  Directory: none"),
            Some(directory) => {
                write!(
                    f,
                    "  Directory: {{version: {}, revision: {}.{}}}",
                    directory.version, directory.revision.0, directory.revision.1,
                )?;
                for key in directory.keys.iter() {
                    write!(f, "\n    {key}")?;
                }
                Ok(())
            }
        }
    }
}

impl GeoTags {
    pub fn from_tiepoint_and_scale(tiepoint: [f64; 6], pixel_scale: [f64; 3]) -> Self {
        Self {
            model: GeoModel::Scaled {
                tiepoint,
                pixel_scale,
            },
            directory: None,
        }
    }

    pub fn from_transformation(transformation: [f64; 16]) -> Self {
        Self {
            model: GeoModel::Transformed { transformation },
            directory: None,
        }
    }

    pub fn parse(ifd: &Ifd) -> Result<Self, GeoTiffError> {
        let tiepoint = get_tag_as_array(ifd, TagId::ModelTiepoint);
        let pixel_scale = get_tag_as_array(ifd, TagId::ModelPixelScale);
        let transformation = get_tag_as_array(ifd, TagId::ModelTransformation);

        let model = match (tiepoint, pixel_scale, transformation) {
            (Ok(tiepoint), Ok(pixel_scale), _) => GeoModel::Scaled {
                tiepoint,
                pixel_scale,
            },
            (_, _, Ok(transformation)) => GeoModel::Transformed { transformation },
            (Err(e), _, _) | (Ok(_), Err(e), _) => return Err(e),
        };

        let directory = if ifd.has_tag(TagId::GeoKeyDirectory) {
            Some(GeoKeyDirectory::parse(ifd)?)
        } else {
            None
        };

        Ok(Self { model, directory })
    }

    pub fn add_to_ifd(&self, ifd: &mut Ifd, endian: Endian) {
        match &self.model {
            GeoModel::Transformed { transformation } => {
                ifd.set_tag(
                    TagId::ModelTransformation,
                    TagData::Double(transformation.to_vec()),
                    endian,
                );
            }
            GeoModel::Scaled {
                tiepoint,
                pixel_scale,
            } => {
                ifd.set_tag(
                    TagId::ModelTiepoint,
                    TagData::Double(tiepoint.to_vec()),
                    endian,
                );
                ifd.set_tag(
                    TagId::ModelPixelScale,
                    TagData::Double(pixel_scale.to_vec()),
                    endian,
                );
            }
        }
        if let Some(directory) = &self.directory {
            directory.add_to_ifd(ifd, endian);
        }
    }

    pub fn set_key<I: Into<u16>>(&mut self, id: I, value: GeoKeyValue) {
        self.directory
            .get_or_insert_with(GeoKeyDirectory::new)
            .set(id, value);
    }

    pub fn key(&self, id: GeoKeyId) -> Option<&GeoKeyValue> {
        self.directory.as_ref().and_then(|d| d.get(id))
    }

    pub fn key_short(&self, id: GeoKeyId) -> Option<u16> {
        self.directory.as_ref().and_then(|d| d.get_short(id))
    }
}

fn get_tag_as_array<const N: usize>(ifd: &Ifd, id: TagId) -> Result<[f64; N], GeoTiffError> {
    let values: Vec<f64> = ifd.get_tag_values(id).map_err(|_| {
        if ifd.has_tag(id) {
            GeoTiffError::BadTag(id)
        } else {
            GeoTiffError::MissingTag(id)
        }
    })?;
    // Tiepoint tags may list several points, the first one anchors the raster
    values
        .get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or(GeoTiffError::BadTag(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_model_round_trips() {
        let mut tags = GeoTags::from_tiepoint_and_scale(
            [0.0, 0.0, 0.0, -180.0, 90.0, 0.0],
            [0.1, 0.1, 0.0],
        );
        tags.set_key(GeoKeyId::GTModelTypeGeoKey, GeoKeyValue::Short(vec![2]));

        let mut ifd = Ifd::new();
        tags.add_to_ifd(&mut ifd, Endian::Big);
        let parsed = GeoTags::parse(&ifd).unwrap();

        assert_eq!(parsed.model, tags.model);
        assert_eq!(parsed.key_short(GeoKeyId::GTModelTypeGeoKey), Some(2));
    }

    #[test]
    fn missing_directory_is_none() {
        let mut ifd = Ifd::new();
        GeoTags::from_transformation([0.0; 16]).add_to_ifd(&mut ifd, Endian::Little);
        let parsed = GeoTags::parse(&ifd).unwrap();
        assert!(parsed.directory.is_none());
        assert!(matches!(parsed.model, GeoModel::Transformed { .. }));
    }

    #[test]
    fn no_georeferencing_is_missing_tag() {
        let ifd = Ifd::new();
        assert!(matches!(
            GeoTags::parse(&ifd),
            Err(GeoTiffError::MissingTag(TagId::ModelTiepoint))
        ));
    }
}
