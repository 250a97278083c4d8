use num_enum::{FromPrimitive, IntoPrimitive};

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum PhotometricInterpretation {
    WhiteIsZero = 0,
    BlackIsZero = 1,
    RGB = 2,
    RGBPalette = 3,
    TransparencyMask = 4,
    CMYK = 5,
    YCbCr = 6,
    CIELab = 8,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum SampleFormat {
    Unsigned = 1,
    Signed = 2,
    Float = 3,
    Undefined = 4,
    ComplexInt = 5,
    ComplexFloat = 6,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum PlanarConfiguration {
    Chunky = 1,
    Planar = 2,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

/// Numeric type of one sample, resolved from SampleFormat and BitsPerSample.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SampleType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl SampleType {
    pub fn resolve(format: SampleFormat, bits: u16) -> Option<Self> {
        use SampleFormat::*;
        match (format, bits) {
            (Unsigned | Undefined, 8) => Some(Self::U8),
            (Unsigned | Undefined, 16) => Some(Self::U16),
            (Unsigned | Undefined, 32) => Some(Self::U32),
            (Signed, 8) => Some(Self::I8),
            (Signed, 16) => Some(Self::I16),
            (Signed, 32) => Some(Self::I32),
            (Float, 32) => Some(Self::F32),
            (Float, 64) => Some(Self::F64),
            _ => None,
        }
    }

    pub const fn bytes(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub const fn format(&self) -> SampleFormat {
        match self {
            Self::U8 | Self::U16 | Self::U32 => SampleFormat::Unsigned,
            Self::I8 | Self::I16 | Self::I32 => SampleFormat::Signed,
            Self::F32 | Self::F64 => SampleFormat::Float,
        }
    }
}
