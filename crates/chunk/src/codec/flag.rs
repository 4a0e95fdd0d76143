//! LEB128 encoding for flags.
//!
//! Seven payload bits per byte, low-order group first, high bit set on every
//! byte except the last. A `u32` takes one to five bytes.

use super::bits::BitCursor;
use crate::error::{ChunkError, Result};
use crate::meas::Flag;

const MAX_VARINT_BYTES: usize = 5;

/// Number of bytes the varint form of `flag` occupies.
pub fn varint_len(flag: Flag) -> usize {
    let bit_length = 32 - flag.leading_zeros() as usize;
    bit_length.div_ceil(7).max(1)
}

/// Encoder for flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagEncoder;

impl FlagEncoder {
    /// Creates a new flag encoder.
    pub fn new() -> Self {
        Self
    }

    /// Appends `flag` as a varint.
    ///
    /// All bytes are checked for room before the first one is written.
    pub fn append<B>(&mut self, flag: Flag, cursor: &mut BitCursor<B>) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        cursor.ensure(varint_len(flag) as u32 * 8)?;

        let mut rest = flag;
        loop {
            let mut byte = (rest & 0x7F) as u8;
            rest >>= 7;
            if rest != 0 {
                byte |= 0x80;
            }
            cursor.write_byte(byte)?;
            if rest == 0 {
                return Ok(());
            }
        }
    }
}

/// Decoder for flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagDecoder;

impl FlagDecoder {
    /// Creates a new flag decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decodes the next flag.
    pub fn read<B: AsRef<[u8]>>(&mut self, cursor: &mut BitCursor<B>) -> Result<Flag> {
        let start = cursor.position();
        let mut result = 0u64;

        for index in 0..MAX_VARINT_BYTES {
            let byte = cursor.read_byte()?;
            result |= ((byte & 0x7F) as u64) << (7 * index);
            if byte & 0x80 == 0 {
                return Flag::try_from(result)
                    .map_err(|_| ChunkError::MalformedVarint { position: start });
            }
        }

        Err(ChunkError::MalformedVarint { position: start })
    }
}
