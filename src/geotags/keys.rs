// https://docs.ogc.org/is/19-008r4/19-008r4.html#_requirements_class_geokeydirectorytag

use super::{GeoKeyId, GeoKeyValue, GeoTiffError};
use crate::tiff::{Endian, Ifd, TagData, TagId, TagType};
use std::fmt::Display;

#[derive(Clone, Debug)]
pub struct GeoKeyDirectory {
    pub version: u16,
    pub revision: (u16, u16),
    pub keys: Vec<GeoKey>,
}

#[derive(Clone, Debug)]
pub struct GeoKey {
    pub code: u16,
    pub value: GeoKeyValue,
}

impl GeoKey {
    pub fn id(&self) -> Option<GeoKeyId> {
        GeoKeyId::try_from(self.code).ok()
    }
}

impl Default for GeoKeyDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoKeyDirectory {
    pub fn new() -> Self {
        Self {
            version: 1,
            revision: (1, 0),
            keys: vec![],
        }
    }

    pub fn parse(ifd: &Ifd) -> Result<Self, GeoTiffError> {
        let directory_values: Vec<u16> = ifd
            .get_tag_values(TagId::GeoKeyDirectory)
            .map_err(|_| GeoTiffError::BadTag(TagId::GeoKeyDirectory))?;

        if directory_values.len() < 4 {
            return Err(GeoTiffError::BadTag(TagId::GeoKeyDirectory));
        }

        let version = directory_values[0];
        let revision = directory_values[1];
        let minor_revision = directory_values[2];
        let key_count = directory_values[3] as usize;

        if directory_values.len() < 4 + key_count * 4 {
            return Err(GeoTiffError::BadTag(TagId::GeoKeyDirectory));
        }

        let keys = (0..key_count)
            .map(|i| {
                let entry = &directory_values[(i + 1) * 4..(i + 2) * 4];
                let (code, location, count, offset) = (entry[0], entry[1], entry[2], entry[3]);
                let value = if location == 0 {
                    GeoKeyValue::Short(vec![offset])
                } else {
                    resolve_value(ifd, location, offset as usize, count as usize)
                };
                GeoKey { code, value }
            })
            .collect();

        Ok(Self {
            version,
            revision: (revision, minor_revision),
            keys,
        })
    }

    pub fn get(&self, id: GeoKeyId) -> Option<&GeoKeyValue> {
        let code: u16 = id.into();
        self.keys.iter().find(|key| key.code == code).map(|key| &key.value)
    }

    pub fn get_short(&self, id: GeoKeyId) -> Option<u16> {
        self.get(id).and_then(|v| v.as_number())
    }

    pub fn set<I: Into<u16>>(&mut self, id: I, value: GeoKeyValue) {
        let code: u16 = id.into();
        let key = GeoKey { code, value };
        if let Some(index) = self.keys.iter().position(|key| key.code == code) {
            self.keys[index] = key;
        } else {
            self.keys.push(key);
        }
    }

    pub fn add_to_ifd(&self, ifd: &mut Ifd, endian: Endian) {
        let (key_directory, ascii_params, double_params) = self.unparse();
        ifd.set_tag(
            TagId::GeoKeyDirectory,
            TagData::Short(key_directory),
            endian,
        );
        if !ascii_params.is_empty() {
            ifd.set_tag(TagId::GeoAsciiParams, TagData::Ascii(ascii_params), endian);
        }
        if !double_params.is_empty() {
            ifd.set_tag(
                TagId::GeoDoubleParams,
                TagData::Double(double_params),
                endian,
            );
        }
    }

    /// Flatten into the GeoKeyDirectory, GeoAsciiParams and GeoDoubleParams
    /// payloads. Keys are written in ascending code order.
    pub fn unparse(&self) -> (Vec<u16>, Vec<u8>, Vec<f64>) {
        let mut keys: Vec<&GeoKey> = self.keys.iter().collect();
        keys.sort_by_key(|key| key.code);

        let mut directory = vec![
            self.version,
            self.revision.0,
            self.revision.1,
            keys.len() as u16,
        ];
        let mut shorts: Vec<u16> = vec![];
        let mut asciis: Vec<u8> = vec![];
        let mut doubles: Vec<f64> = vec![];
        let dir_size = 4 * (keys.len() + 1) as u16;

        for key in keys {
            directory.push(key.code);
            match &key.value {
                GeoKeyValue::Short(vec) => match vec.len() {
                    0 => directory.extend([0, 0, 0]),
                    1 => directory.extend([0, 1, vec[0]]),
                    n => {
                        directory.extend([
                            TagId::GeoKeyDirectory.into(),
                            n as u16,
                            dir_size + shorts.len() as u16,
                        ]);
                        shorts.extend(vec);
                    }
                },
                GeoKeyValue::Ascii(s) => {
                    // Each string is '|' terminated, counted in its length
                    directory.extend([
                        TagId::GeoAsciiParams.into(),
                        s.len() as u16 + 1,
                        asciis.len() as u16,
                    ]);
                    asciis.extend(s.bytes());
                    asciis.push(b'|');
                }
                GeoKeyValue::Double(vec) => {
                    directory.extend([
                        TagId::GeoDoubleParams.into(),
                        vec.len() as u16,
                        doubles.len() as u16,
                    ]);
                    doubles.extend(vec);
                }
                GeoKeyValue::Undefined => directory.extend([0, 0, 0]),
            }
        }
        if !asciis.is_empty() {
            asciis.push(0);
        }

        ([directory, shorts].concat(), asciis, doubles)
    }
}

fn resolve_value(ifd: &Ifd, location: u16, start: usize, count: usize) -> GeoKeyValue {
    let end = start + count;
    ifd.get_tag_by_code(location)
        .and_then(|tag| match tag.datatype {
            TagType::Ascii => tag.data.get(start..end).map(|bytes| {
                GeoKeyValue::Ascii(
                    String::from_utf8_lossy(bytes)
                        .trim_end_matches(|c| c == '|' || c == '\0')
                        .to_string(),
                )
            }),
            TagType::Short => tag
                .values::<u16>()
                .and_then(|v| v.get(start..end).map(|s| GeoKeyValue::Short(s.to_vec()))),
            TagType::Double => tag
                .values::<f64>()
                .and_then(|v| v.get(start..end).map(|s| GeoKeyValue::Double(s.to_vec()))),
            _ => None,
        })
        .unwrap_or(GeoKeyValue::Undefined)
}

impl Display for GeoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_string = match self.id() {
            Some(id) => format!("{id:?}"),
            None => format!("0x{:04X}", self.code),
        };
        write!(f, "{}: {}", id_string, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_survives_ifd_round_trip() {
        let mut directory = GeoKeyDirectory::new();
        directory.set(GeoKeyId::GTModelTypeGeoKey, GeoKeyValue::Short(vec![2]));
        directory.set(GeoKeyId::GeographicTypeGeoKey, GeoKeyValue::Short(vec![4326]));
        directory.set(
            GeoKeyId::GeogCitationGeoKey,
            GeoKeyValue::Ascii("WGS 84".into()),
        );
        directory.set(
            GeoKeyId::GeogSemiMajorAxisGeoKey,
            GeoKeyValue::Double(vec![6378137.0]),
        );

        let mut ifd = Ifd::new();
        directory.add_to_ifd(&mut ifd, Endian::Little);
        let parsed = GeoKeyDirectory::parse(&ifd).unwrap();

        assert_eq!(parsed.get_short(GeoKeyId::GTModelTypeGeoKey), Some(2));
        assert_eq!(parsed.get_short(GeoKeyId::GeographicTypeGeoKey), Some(4326));
        assert_eq!(
            parsed
                .get(GeoKeyId::GeogCitationGeoKey)
                .and_then(|v| v.as_string()),
            Some("WGS 84")
        );
        assert_eq!(
            parsed.get(GeoKeyId::GeogSemiMajorAxisGeoKey),
            Some(&GeoKeyValue::Double(vec![6378137.0]))
        );
    }

    #[test]
    fn short_directory_is_rejected() {
        let mut ifd = Ifd::new();
        ifd.set_tag(
            TagId::GeoKeyDirectory,
            TagData::Short(vec![1, 1, 0, 3, 1024, 0, 1]),
            Endian::Little,
        );
        assert!(matches!(
            GeoKeyDirectory::parse(&ifd),
            Err(GeoTiffError::BadTag(TagId::GeoKeyDirectory))
        ));
    }

    #[test]
    fn dangling_location_is_undefined() {
        let mut ifd = Ifd::new();
        ifd.set_tag(
            TagId::GeoKeyDirectory,
            TagData::Short(vec![1, 1, 0, 1, 2049, 34737, 6, 0]),
            Endian::Little,
        );
        let parsed = GeoKeyDirectory::parse(&ifd).unwrap();
        assert_eq!(
            parsed.get(GeoKeyId::GeogCitationGeoKey),
            Some(&GeoKeyValue::Undefined)
        );
    }
}
