use eio::{FromBytes, ReadExt, ToBytes};
use num_traits::{cast::NumCast, ToPrimitive};
use std::io::{Read, Result, Write};
use std::mem;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn read<const N: usize, T: FromBytes<N>>(&self, stream: &mut impl Read) -> Result<T> {
        let mut buf = [0u8; N];
        stream.read_exact(&mut buf)?;
        self.decode(buf)
    }

    pub fn decode<const N: usize, T: FromBytes<N>>(&self, bytes: [u8; N]) -> Result<T> {
        match self {
            Endian::Big => bytes.as_slice().read_be(),
            Endian::Little => bytes.as_slice().read_le(),
        }
    }

    /// Decode a packed run of values, `None` if any chunk fails.
    pub fn decode_all<const N: usize, T: FromBytes<N>>(&self, bytes: &[u8]) -> Option<Vec<T>> {
        bytes
            .chunks_exact(mem::size_of::<T>())
            .map(|chunk| {
                chunk
                    .try_into()
                    .ok()
                    .and_then(|arr| self.decode::<N, T>(arr).ok())
            })
            .collect()
    }

    pub fn decode_all_to_primitive<const N: usize, A: FromBytes<N> + ToPrimitive, T: NumCast>(
        &self,
        bytes: &[u8],
    ) -> Option<Vec<T>> {
        self.decode_all::<N, A>(bytes)?
            .into_iter()
            .map(|v| T::from(v))
            .collect()
    }

    pub fn encode<const N: usize, T: ToBytes<N>>(&self, value: T) -> [u8; N] {
        match self {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        }
    }

    pub fn encode_all<const N: usize, T: ToBytes<N> + Copy>(&self, values: &[T]) -> Vec<u8> {
        values.iter().flat_map(|v| self.encode(*v)).collect()
    }

    pub fn write<const N: usize, T: ToBytes<N>>(
        &self,
        stream: &mut impl Write,
        value: T,
    ) -> Result<()> {
        stream.write_all(&self.encode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_both_byte_orders() {
        let bytes = [0x12, 0x34];
        assert_eq!(Endian::Big.decode::<2, u16>(bytes).unwrap(), 0x1234);
        assert_eq!(Endian::Little.decode::<2, u16>(bytes).unwrap(), 0x3412);
    }

    #[test]
    fn encode_matches_decode() {
        for endian in [Endian::Big, Endian::Little] {
            let bytes = endian.encode(-2.5_f64);
            assert_eq!(endian.decode::<8, f64>(bytes).unwrap(), -2.5);
        }
    }

    #[test]
    fn decode_all_converts_each_chunk() {
        let values = Endian::Little
            .decode_all_to_primitive::<2, u16, f64>(&[1, 0, 2, 0, 3, 0])
            .unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }
}
