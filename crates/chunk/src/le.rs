//! Little-endian field access for fixed persisted layouts.

use crate::error::{ChunkError, Result};

pub(crate) fn array_at<const N: usize>(buf: &[u8], at: usize) -> Result<[u8; N]> {
    buf.get(at..at + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| ChunkError::CorruptHeader(format!("field at byte {} out of bounds", at)))
}

pub(crate) fn u16_at(buf: &[u8], at: usize) -> Result<u16> {
    array_at(buf, at).map(u16::from_le_bytes)
}

pub(crate) fn u32_at(buf: &[u8], at: usize) -> Result<u32> {
    array_at(buf, at).map(u32::from_le_bytes)
}

pub(crate) fn u64_at(buf: &[u8], at: usize) -> Result<u64> {
    array_at(buf, at).map(u64::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(u16_at(&buf, 0).unwrap(), 0x0201);
        assert_eq!(u32_at(&buf, 4).unwrap(), 0x0807_0605);
        assert_eq!(u64_at(&buf, 0).unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn test_out_of_bounds() {
        let buf = [0u8; 6];
        assert!(matches!(u32_at(&buf, 4), Err(ChunkError::CorruptHeader(_))));
        assert!(u64_at(&buf, 0).is_err());
    }
}
