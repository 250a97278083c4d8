use super::Endian;
use eio::FromBytes;
use num_enum::{FromPrimitive, IntoPrimitive};
use num_traits::{cast::NumCast, ToPrimitive};
use std::fmt::Display;

mod data;
mod id;

pub use data::TagData;
pub use id::TagId;

#[derive(Clone, Debug)]
pub struct Tag {
    pub code: u16,
    pub datatype: TagType,
    pub count: usize,
    pub data: Vec<u8>,
    pub endian: Endian,
}

impl Tag {
    pub fn new(code: u16, endian: Endian, data: TagData) -> Self {
        Self {
            code,
            datatype: data.tag_type(),
            count: data.len(),
            data: data.bytes(endian),
            endian,
        }
    }

    pub fn id(&self) -> Option<TagId> {
        TagId::try_from(self.code).ok()
    }

    /// Single value of the tag, `None` unless it holds exactly one.
    pub fn value<T: NumCast + Copy>(&self) -> Option<T> {
        match self.values() {
            Some(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    pub fn values<T: NumCast>(&self) -> Option<Vec<T>> {
        match self.datatype {
            TagType::Byte | TagType::Ascii | TagType::Undefined => self.decode::<1, u8, T>(),
            TagType::Short => self.decode::<2, u16, T>(),
            TagType::Long | TagType::Ifd => self.decode::<4, u32, T>(),
            TagType::SByte => self.decode::<1, i8, T>(),
            TagType::SShort => self.decode::<2, i16, T>(),
            TagType::SLong => self.decode::<4, i32, T>(),
            TagType::Float => self.decode::<4, f32, T>(),
            TagType::Double => self.decode::<8, f64, T>(),
            TagType::Long8 | TagType::Ifd8 => self.decode::<8, u64, T>(),
            TagType::SLong8 => self.decode::<8, i64, T>(),
            TagType::Rational => self.decode_rational::<4, u32, T>(),
            TagType::SRational => self.decode_rational::<4, i32, T>(),
            TagType::Unknown => None,
        }
    }

    /// ASCII payload with the trailing NUL stripped.
    pub fn try_to_string(&self) -> Option<String> {
        match self.datatype {
            TagType::Ascii | TagType::Byte => String::from_utf8(self.data.clone())
                .ok()
                .map(|s| s.trim_end_matches('\0').to_string()),
            _ => None,
        }
    }

    fn decode<const N: usize, A: FromBytes<N> + ToPrimitive, T: NumCast>(&self) -> Option<Vec<T>> {
        self.endian.decode_all_to_primitive::<N, A, T>(&self.data)
    }

    fn decode_rational<const N: usize, A: FromBytes<N> + ToPrimitive, T: NumCast>(
        &self,
    ) -> Option<Vec<T>> {
        self.data
            .chunks_exact(2 * N)
            .map(|chunk| {
                let numerator = chunk[..N]
                    .try_into()
                    .ok()
                    .and_then(|arr| self.endian.decode::<N, A>(arr).ok())
                    .and_then(|v| v.to_f64())?;
                let denominator = chunk[N..]
                    .try_into()
                    .ok()
                    .and_then(|arr| self.endian.decode::<N, A>(arr).ok())
                    .and_then(|v| v.to_f64())?;
                T::from(numerator / denominator)
            })
            .collect()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut value_string = match (self.try_to_string(), self.values::<f64>()) {
            (Some(s), _) if self.datatype == TagType::Ascii => s.replace('\n', "\\n"),
            (_, Some(v)) if v.len() == 1 => format!("{}", v[0]),
            (_, Some(v)) => format!("{v:?}"),
            _ => "Undefined".to_string(),
        };
        if value_string.len() > 100 {
            value_string = format!("{}...", &value_string[..98]);
        }
        let id_string = match self.id() {
            Some(id) => format!("{id:?}"),
            None => format!("Unknown({})", self.code),
        };
        write!(
            f,
            "{} {:?}[{}]: {}",
            id_string, self.datatype, self.count, value_string
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum TagType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    Ifd = 13,
    Long8 = 16,
    SLong8 = 17,
    Ifd8 = 18,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

impl TagType {
    pub const fn size_in_bytes(&self) -> usize {
        match self {
            TagType::Byte | TagType::Ascii | TagType::SByte | TagType::Undefined => 1,
            TagType::Short | TagType::SShort => 2,
            TagType::Long | TagType::SLong | TagType::Float | TagType::Ifd => 4,
            TagType::Rational | TagType::SRational | TagType::Double => 8,
            TagType::Long8 | TagType::SLong8 | TagType::Ifd8 => 8,
            TagType::Unknown => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_tag_casts_to_wider_types() {
        let tag = Tag::new(
            TagId::BitsPerSample.into(),
            Endian::Big,
            TagData::Short(vec![8, 8, 8]),
        );
        assert_eq!(tag.values::<u32>(), Some(vec![8, 8, 8]));
        assert_eq!(tag.value::<u16>(), None);
    }

    #[test]
    fn rational_values_divide() {
        let endian = Endian::Little;
        let mut data = endian.encode_all(&[3_u32, 2_u32]);
        data.extend(endian.encode_all(&[1_u32, 4_u32]));
        let tag = Tag {
            code: 0x011A,
            datatype: TagType::Rational,
            count: 2,
            data,
            endian,
        };
        assert_eq!(tag.values::<f64>(), Some(vec![1.5, 0.25]));
    }

    #[test]
    fn ascii_strips_terminator() {
        let tag = Tag::new(
            TagId::GDALNoData.into(),
            Endian::Little,
            TagData::from_string("-9999"),
        );
        assert_eq!(tag.try_to_string().as_deref(), Some("-9999"));
    }
}
